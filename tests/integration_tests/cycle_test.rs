//! Full crawl and sweep cycles over a SQLite store

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use immowatch::config::{Config, SourceConfig};
use immowatch::cycle::{run_availability_sweep, run_crawl_cycle, CycleContext};
use immowatch::models::SourceKind;
use immowatch::notifications::NtfyNotifier;
use immowatch::storage::{ListingStore, SqliteListingStore};

use crate::common::{
    immowelt_card, page, wgg_card, MockFetcher, RecordingNotifier, LIVE_PAGE, WGG_REMOVED_PAGE,
};

const IMMOWELT_START: &str = "https://www.immowelt.de/liste/konstanz/wohnungen/mieten";
const WGG_START: &str = "https://www.wg-gesucht.de/wohnungen-in-Muenchen.90.2.1.0.html";

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.sqlite_path = dir.path().join("listings.db");
    config.notifications.topic = "flats-muc".to_string();
    config.sources = vec![
        SourceConfig::new(SourceKind::Immowelt, vec![IMMOWELT_START.to_string()]),
        SourceConfig::new(SourceKind::WgGesucht, vec![WGG_START.to_string()]),
    ];
    for source in &mut config.sources {
        source.request_delay_ms = 0;
    }
    config
}

fn start_pages() -> MockFetcher {
    MockFetcher::new()
        .page(
            IMMOWELT_START,
            &page(&[
                immowelt_card("/expose/k1", "Seenah", "780 €"),
                immowelt_card("/expose/k2", "Altstadt", "690 €"),
            ]),
        )
        .page(
            WGG_START,
            &page(&[wgg_card("/wohnungen-in-Muenchen.11.html", "720 €")]),
        )
}

#[tokio::test]
async fn test_repeated_cycles_notify_each_listing_once() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(SqliteListingStore::new(&config.storage.sqlite_path).unwrap());
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = CycleContext::new(config, store.clone(), Arc::new(start_pages()), notifier.clone());

    for _ in 0..3 {
        run_crawl_cycle(&ctx, CancellationToken::new()).await.unwrap();
    }

    assert_eq!(store.count().unwrap(), 3);
    assert_eq!(notifier.count(), 3);

    let mut urls: Vec<String> = notifier
        .published
        .lock()
        .unwrap()
        .iter()
        .filter_map(|m| m.action_url.clone())
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://www.immowelt.de/expose/k1",
            "https://www.immowelt.de/expose/k2",
            "https://www.wg-gesucht.de/wohnungen-in-Muenchen.11.html",
        ]
    );
}

#[tokio::test]
async fn test_sweep_removes_only_confirmed_listings() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(SqliteListingStore::new(&config.storage.sqlite_path).unwrap());

    let fetcher = start_pages()
        .page("https://www.immowelt.de/expose/k1", LIVE_PAGE)
        .timeout("https://www.immowelt.de/expose/k2")
        .page(
            "https://www.wg-gesucht.de/wohnungen-in-Muenchen.11.html",
            WGG_REMOVED_PAGE,
        );
    let ctx = CycleContext::new(
        config,
        store.clone(),
        Arc::new(fetcher),
        Arc::new(RecordingNotifier::new()),
    );

    let crawled = run_crawl_cycle(&ctx, CancellationToken::new()).await.unwrap();
    assert_eq!(crawled.ingest.inserted, 3);

    let report = run_availability_sweep(&ctx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.checked, 3);
    assert_eq!(report.live, 1);
    assert_eq!(report.unverified, 1);
    assert_eq!(report.removed, 1);
    assert!(store
        .find("https://www.wg-gesucht.de/wohnungen-in-Muenchen.11.html")
        .unwrap()
        .is_none());
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_failed_source_still_ingests_the_rest() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(SqliteListingStore::new(&config.storage.sqlite_path).unwrap());
    let fetcher = MockFetcher::new()
        .status(IMMOWELT_START, 403)
        .page(
            WGG_START,
            &page(&[wgg_card("/wohnungen-in-Muenchen.11.html", "720 €")]),
        );
    let ctx = CycleContext::new(
        config,
        store.clone(),
        Arc::new(fetcher),
        Arc::new(RecordingNotifier::new()),
    );

    let report = run_crawl_cycle(&ctx, CancellationToken::new()).await.unwrap();

    assert_eq!(report.crawl.pages_failed, 1);
    assert_eq!(report.crawl.pages_fetched, 1);
    assert_eq!(report.ingest.inserted, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_cycle_publishes_to_ntfy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/flats-muc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(SqliteListingStore::new(&config.storage.sqlite_path).unwrap());
    let notifier = Arc::new(NtfyNotifier::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let ctx = CycleContext::new(config, store, Arc::new(start_pages()), notifier);

    let report = run_crawl_cycle(&ctx, CancellationToken::new()).await.unwrap();

    assert_eq!(report.notifications.sent, 3);
    assert_eq!(report.notifications.failed, 0);
}
