//! Non-blocking notification dispatch
//!
//! Producers enqueue with `try_send` on a bounded channel and never wait;
//! a single worker task drains the queue and publishes through the
//! configured [`Notifier`]. Delivery outcomes are only logged and counted.

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{Notification, Notifier};
use crate::metrics;
use crate::utils::error::NotifyError;

/// Delivery counters reported when the dispatcher shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

/// Cloneable enqueue side of a [`NotificationDispatcher`]
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Notification>,
}

impl DispatchHandle {
    /// Enqueue a notification without waiting
    ///
    /// Fails with `NotifyError::QueueUnavailable` when the queue is full or
    /// the worker has stopped; the notification is dropped in that case.
    pub fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => NotifyError::QueueUnavailable("queue full".to_string()),
            TrySendError::Closed(_) => {
                NotifyError::QueueUnavailable("dispatcher stopped".to_string())
            }
        })
    }
}

/// Bounded queue plus the worker task delivering from it
pub struct NotificationDispatcher {
    handle: DispatchHandle,
    worker: JoinHandle<DispatchStats>,
}

impl NotificationDispatcher {
    /// Start the worker with room for `capacity` pending notifications
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(deliver_all(notifier, rx));

        Self {
            handle: DispatchHandle { tx },
            worker,
        }
    }

    /// Enqueue side to hand to producers
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Enqueue a notification without waiting
    pub fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        self.handle.dispatch(notification)
    }

    /// Stop accepting work and wait for the queue to drain
    ///
    /// Every [`DispatchHandle`] obtained from [`Self::handle`] must be dropped
    /// first, otherwise the worker keeps waiting for more notifications.
    pub async fn close(self) -> DispatchStats {
        drop(self.handle);
        match self.worker.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Notification worker panicked");
                DispatchStats::default()
            }
        }
    }
}

async fn deliver_all(
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::Receiver<Notification>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    while let Some(notification) = rx.recv().await {
        let result = notifier
            .publish(
                &notification.topic,
                &notification.message,
                notification.action_url.as_deref(),
            )
            .await;

        metrics::record_notification(result.is_ok());
        match result {
            Ok(()) => {
                stats.sent += 1;
                tracing::debug!(
                    notifier = notifier.name(),
                    topic = %notification.topic,
                    url = ?notification.action_url,
                    "Notification sent"
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    notifier = notifier.name(),
                    topic = %notification.topic,
                    url = ?notification.action_url,
                    error = %e,
                    "Notification delivery failed"
                );
            }
        }
    }

    stats
}
