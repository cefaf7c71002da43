//! New-listing notifications
//!
//! A [`Notifier`] publishes one message to a topic. Ingestion never calls a
//! notifier directly: it enqueues on a [`NotificationDispatcher`] whose worker
//! task does the delivery, so a slow or failing endpoint never holds up
//! inserts and a failed delivery never rolls one back.

pub mod dispatcher;
pub mod ntfy;
pub mod webhook;

pub use dispatcher::{DispatchHandle, DispatchStats, NotificationDispatcher};
pub use ntfy::NtfyNotifier;
pub use webhook::{WebhookConfig, WebhookNotifier};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::models::Listing;
use crate::utils::error::NotifyError;

/// Result type for notifier operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// A message queued for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub message: String,
    pub action_url: Option<String>,
}

impl Notification {
    /// "New offer" notification for a freshly inserted listing
    pub fn new_listing(topic: impl Into<String>, listing: &Listing) -> Self {
        Self {
            topic: topic.into(),
            message: listing.notification_message(),
            action_url: Some(listing.url.clone()),
        }
    }
}

/// Push-notification capability
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Publish `message` to `topic`, optionally with a link action
    async fn publish(&self, topic: &str, message: &str, action_url: Option<&str>)
        -> NotifyResult<()>;
}

/// Publishes every message through each wrapped notifier
///
/// All notifiers are attempted; the first failure is returned afterwards.
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    fn name(&self) -> &str {
        "set"
    }

    async fn publish(
        &self,
        topic: &str,
        message: &str,
        action_url: Option<&str>,
    ) -> NotifyResult<()> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.publish(topic, message, action_url).await {
                tracing::warn!(notifier = notifier.name(), error = %e, "Notifier failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Build the notifier described by the configuration
///
/// ntfy is always enabled; the webhook, with its token and headers, is added
/// when `webhook_url` is set.
pub fn notifier_from_config(config: &NotificationConfig) -> NotifyResult<Arc<dyn Notifier>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let ntfy: Arc<dyn Notifier> = Arc::new(NtfyNotifier::new(&config.ntfy_server, timeout)?);

    match &config.webhook_url {
        Some(url) => {
            let mut webhook_config =
                WebhookConfig::new(url.clone()).with_timeout(config.timeout_secs);
            if let Some(token) = &config.webhook_auth_token {
                webhook_config = webhook_config.with_auth_token(token.clone());
            }
            for (name, value) in &config.webhook_headers {
                webhook_config = webhook_config.with_header(name.clone(), value.clone());
            }

            let webhook = WebhookNotifier::new(webhook_config)?;
            Ok(Arc::new(NotifierSet::new(vec![ntfy, Arc::new(webhook)])))
        }
        None => Ok(ntfy),
    }
}
