//! Ingestion against the SQLite store: idempotence and uniqueness

use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use immowatch::ingest::{IngestOutcome, IngestionPipeline};
use immowatch::models::ListingCandidate;
use immowatch::notifications::NotificationDispatcher;
use immowatch::storage::{ListingStore, SqliteListingStore};

use crate::common::RecordingNotifier;

fn sqlite_store(dir: &TempDir) -> Arc<SqliteListingStore> {
    Arc::new(SqliteListingStore::new(dir.path().join("listings.db")).unwrap())
}

fn flat_a() -> ListingCandidate {
    ListingCandidate {
        url: Some("https://x/1".to_string()),
        title: Some("Flat A".to_string()),
        price: Some("500".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_same_url_across_two_cycles_is_stored_and_notified_once() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let notifier = Arc::new(RecordingNotifier::new());

    for _cycle in 0..2 {
        let dispatcher = NotificationDispatcher::spawn(notifier.clone(), 16);
        {
            let pipeline =
                IngestionPipeline::new(store.clone(), dispatcher.handle(), "flats-muc");
            let (tx, rx) = mpsc::channel(4);
            tx.send(flat_a()).await.unwrap();
            drop(tx);
            pipeline.consume(rx, CancellationToken::new()).await.unwrap();
        }
        dispatcher.close().await;
    }

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(notifier.count(), 1);

    let published = notifier.published.lock().unwrap();
    assert_eq!(published[0].topic, "flats-muc");
    assert_eq!(published[0].action_url.as_deref(), Some("https://x/1"));
}

#[tokio::test]
async fn test_two_concurrent_ingests_yield_one_insert() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = NotificationDispatcher::spawn(notifier.clone(), 16);

    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        dispatcher.handle(),
        "flats",
    ));

    let a = {
        let pipeline = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || pipeline.ingest(flat_a()).unwrap())
    };
    let b = {
        let pipeline = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || pipeline.ingest(flat_a()).unwrap())
    };

    let mut outcomes = vec![a.await.unwrap(), b.await.unwrap()];
    outcomes.sort_by_key(|o| o.as_str());

    assert_eq!(
        outcomes,
        vec![IngestOutcome::AlreadyExists, IngestOutcome::Inserted]
    );
    assert_eq!(store.count().unwrap(), 1);

    drop(pipeline);
    let stats = dispatcher.close().await;
    assert_eq!(stats.sent, 1);
}

#[tokio::test]
async fn test_many_concurrent_ingests_keep_one_row() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let dispatcher = NotificationDispatcher::spawn(Arc::new(RecordingNotifier::new()), 64);
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        dispatcher.handle(),
        "flats",
    ));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || pipeline.ingest(flat_a()).unwrap())
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() == IngestOutcome::Inserted {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_notification_keeps_listing() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let notifier = Arc::new(RecordingNotifier::failing());
    let dispatcher = NotificationDispatcher::spawn(notifier.clone(), 16);

    {
        let pipeline = IngestionPipeline::new(store.clone(), dispatcher.handle(), "flats");
        assert_eq!(pipeline.ingest(flat_a()).unwrap(), IngestOutcome::Inserted);
    }
    let stats = dispatcher.close().await;

    assert_eq!(stats.failed, 1);
    assert_eq!(notifier.failures(), 1);
    assert!(store.find("https://x/1").unwrap().is_some());
}

#[tokio::test]
async fn test_stored_fields_match_candidate() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir);
    let dispatcher = NotificationDispatcher::spawn(Arc::new(RecordingNotifier::new()), 16);
    let pipeline = IngestionPipeline::new(store.clone(), dispatcher.handle(), "flats");

    let candidate = ListingCandidate {
        url: Some("https://www.wg-gesucht.de/wohnungen-in-Muenchen.77.html".to_string()),
        title: None,
        price: Some("640 €".to_string()),
        area: Some("28 m²".to_string()),
        rooms: Some("1-Zimmer-Wohnung".to_string()),
    };
    pipeline.ingest(candidate.clone()).unwrap();

    let stored = store
        .find("https://www.wg-gesucht.de/wohnungen-in-Muenchen.77.html")
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, None);
    assert_eq!(stored.price, candidate.price);
    assert_eq!(stored.area, candidate.area);
    assert_eq!(stored.rooms, candidate.rooms);
    assert_eq!(stored.source, Some(immowatch::SourceKind::WgGesucht));
}
