//! ntfy push notifier
//!
//! Messages are POSTed as plain text to `{server}/{topic}`. A link to the
//! listing is attached through ntfy's `Actions` header so the push shows an
//! "Open link" button.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Notifier, NotifyResult};
use crate::utils::error::NotifyError;
use crate::utils::truncate_text;

/// ntfy notifier
pub struct NtfyNotifier {
    server: String,
    client: Client,
}

impl NtfyNotifier {
    /// Create a notifier for the ntfy server at `server` (e.g. `https://ntfy.sh`)
    pub fn new(server: &str, timeout: Duration) -> NotifyResult<Self> {
        let server = server.trim_end_matches('/').to_string();
        if !server.starts_with("http://") && !server.starts_with("https://") {
            return Err(NotifyError::InvalidConfig(format!(
                "ntfy server must start with http:// or https://: {server}"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { server, client })
    }

    /// Endpoint messages for `topic` are posted to
    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.server, topic)
    }

    /// Value of the `Actions` header for a link to `url`
    fn view_action(url: &str) -> String {
        format!("view, Open link, {url}")
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    async fn publish(
        &self,
        topic: &str,
        message: &str,
        action_url: Option<&str>,
    ) -> NotifyResult<()> {
        let endpoint = self.topic_url(topic);
        let mut request = self.client.post(&endpoint).body(message.to_string());
        if let Some(url) = action_url {
            request = request.header("Actions", Self::view_action(url));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: truncate_text(&body, 200),
            });
        }

        tracing::debug!(endpoint = %endpoint, "ntfy notification delivered");
        Ok(())
    }
}
