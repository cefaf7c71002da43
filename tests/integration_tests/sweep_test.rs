//! Availability sweep against the SQLite store

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use immowatch::error::Error;
use immowatch::storage::{ListingStore, SqliteListingStore};
use immowatch::sweeper::{AvailabilitySweeper, SweepReport};

use crate::common::{listing, MockFetcher, IMMOWELT_REMOVED_PAGE, LIVE_PAGE, WGG_REMOVED_PAGE};

fn store_with(dir: &TempDir, urls: &[&str]) -> Arc<SqliteListingStore> {
    let store = Arc::new(SqliteListingStore::new(dir.path().join("listings.db")).unwrap());
    for url in urls {
        store.insert_if_absent(&listing(url)).unwrap();
    }
    store
}

#[tokio::test]
async fn test_wg_gesucht_removed_banner_deletes_listing() {
    let dir = TempDir::new().unwrap();
    let url = "https://wg-gesucht.de/item/42";
    let store = store_with(&dir, &[url]);
    let fetcher = MockFetcher::new().page(url, WGG_REMOVED_PAGE);

    let sweeper = AvailabilitySweeper::new(store.clone(), Arc::new(fetcher), 4);
    let removed = sweeper.sweep(CancellationToken::new()).await.unwrap();

    assert_eq!(removed, 1);
    assert!(store.find(url).unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_errors_and_timeouts_never_delete() {
    let dir = TempDir::new().unwrap();
    let timeout = "https://www.immowelt.de/expose/timeout";
    let server_error = "https://www.immowelt.de/expose/500";
    let not_found = "https://www.wg-gesucht.de/wohnungen-in-Muenchen.404.html";
    let store = store_with(&dir, &[timeout, server_error, not_found]);

    let fetcher = MockFetcher::new()
        .timeout(timeout)
        .status(server_error, 500)
        .status(not_found, 404);

    let sweeper = AvailabilitySweeper::new(store.clone(), Arc::new(fetcher), 4);
    let report = sweeper
        .sweep_with_report(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.removed, 0);
    assert_eq!(report.unverified, 3);
    assert_eq!(store.count().unwrap(), 3);
}

#[tokio::test]
async fn test_unrecognised_url_is_kept_without_fetch() {
    let dir = TempDir::new().unwrap();
    let url = "https://www.immoscout24.de/expose/1";
    let store = store_with(&dir, &[url]);
    let fetcher = Arc::new(MockFetcher::new());

    let sweeper = AvailabilitySweeper::new(store.clone(), fetcher.clone(), 4);
    let report = sweeper
        .sweep_with_report(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.unsupported, 1);
    assert!(fetcher.calls().is_empty());
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_every_listing_checked_once() {
    let dir = TempDir::new().unwrap();
    let urls: Vec<String> = (0..20)
        .map(|i| format!("https://www.immowelt.de/expose/{i}"))
        .collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let store = store_with(&dir, &url_refs);

    let mut fetcher = MockFetcher::new();
    for (i, url) in urls.iter().enumerate() {
        let body = if i % 4 == 0 { IMMOWELT_REMOVED_PAGE } else { LIVE_PAGE };
        fetcher = fetcher.page(url, body);
    }
    let fetcher = Arc::new(fetcher);

    let sweeper = AvailabilitySweeper::new(store.clone(), fetcher.clone(), 3);
    let report = sweeper
        .sweep_with_report(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report,
        SweepReport {
            checked: 20,
            live: 15,
            removed: 5,
            unsupported: 0,
            unverified: 0,
        }
    );
    assert_eq!(fetcher.calls().len(), 20);
    assert_eq!(store.count().unwrap(), 15);
}

#[tokio::test]
async fn test_cancel_during_sweep_commits_no_further_deletes() {
    let dir = TempDir::new().unwrap();
    let slow = "https://wg-gesucht.de/item/slow";
    let store = store_with(&dir, &[slow]);
    let fetcher = MockFetcher::new().slow(slow, Duration::from_secs(30), WGG_REMOVED_PAGE);

    let sweeper = AvailabilitySweeper::new(store.clone(), Arc::new(fetcher), 4);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(5), sweeper.sweep(cancel))
        .await
        .expect("sweep stops promptly after cancel");
    canceller.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(store.find(slow).unwrap().is_some());
}
