//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use immowatch::crawler::{Fetch, FetchRequest, FetchResponse};
use immowatch::models::{Listing, ListingCandidate};
use immowatch::notifications::{Notifier, NotifyResult};
use immowatch::utils::error::FetchError;

/// Canned reply for one URL
#[derive(Clone)]
pub enum MockReply {
    Page { status: u16, body: String },
    Timeout,
    Slow { delay: Duration, body: String },
}

/// In-process fetcher serving canned replies by URL
///
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    replies: HashMap<String, MockReply>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            MockReply::Page {
                status: 200,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.replies.insert(
            url.to_string(),
            MockReply::Page {
                status,
                body: String::new(),
            },
        );
        self
    }

    pub fn timeout(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), MockReply::Timeout);
        self
    }

    pub fn slow(mut self, url: &str, delay: Duration, body: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            MockReply::Slow {
                delay,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.calls.lock().unwrap().push(request.url.clone());

        match self.replies.get(&request.url) {
            Some(MockReply::Page { status, body }) => Ok(FetchResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(MockReply::Timeout) => Err(FetchError::Timeout),
            Some(MockReply::Slow { delay, body }) => {
                tokio::time::sleep(*delay).await;
                Ok(FetchResponse {
                    status: 200,
                    body: body.clone(),
                })
            }
            None => Ok(FetchResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

/// Notifier recording every published message
#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<PublishedMessage>>,
    failures: AtomicUsize,
    fail_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: String,
    pub action_url: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose every delivery fails
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(
        &self,
        topic: &str,
        message: &str,
        action_url: Option<&str>,
    ) -> NotifyResult<()> {
        if self.fail_all {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(immowatch::utils::error::NotifyError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            action_url: action_url.map(str::to_string),
        });
        Ok(())
    }
}

/// Stored listing for `url` with typical field values
pub fn listing(url: &str) -> Listing {
    ListingCandidate {
        url: Some(url.to_string()),
        title: Some("Helle 1-Zimmer-Wohnung".to_string()),
        price: Some("650 €".to_string()),
        area: Some("32 m²".to_string()),
        rooms: Some("1".to_string()),
    }
    .into_listing()
    .expect("listing with url")
}

// ============================================================================
// Page fixtures
// ============================================================================

/// One immowelt result card
pub fn immowelt_card(href: &str, title: &str, price: &str) -> String {
    format!(
        r#"<div class="EstateItem-1c115">
             <a href="{href}">
               <h2>{title}</h2>
               <div data-test="price">{price}</div>
               <div data-test="area">32 m²</div>
               <div data-test="rooms">1 Zi.</div>
             </a>
           </div>"#
    )
}

/// One wg-gesucht result card
pub fn wgg_card(href: &str, price: &str) -> String {
    format!(
        r#"<div class="wgg_card offer_list_item">
             <div class="col-xs-11"><span>1-Zimmer-Wohnung | München Schwabing</span></div>
             <a class="detailansicht" href="{href}">Details</a>
             <div class="row noprint middle">
               <div class="col-xs-3"><b>{price}</b></div>
               <div class="col-xs-3 text-right"><b>28 m²</b></div>
             </div>
           </div>"#
    )
}

/// One kleinanzeigen result card
pub fn kleinanzeigen_card(href: &str, title: &str, price: &str) -> String {
    format!(
        r#"<article class="aditem">
             <div class="aditem-main--middle">
               <div class="text-module-begin"><a href="{href}">{title}</a></div>
               <p class="aditem-main--middle--price-shipping--price">
                 {price}
               </p>
             </div>
             <div class="aditem-main--bottom">
               <span class="simpletag">35 m²</span><span class="simpletag">1 Zi.</span>
             </div>
           </article>"#
    )
}

/// Wrap cards into a result page
pub fn page(cards: &[String]) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Ergebnisse</title></head><body><main>{}</main></body></html>",
        cards.join("\n")
    )
}

/// wg-gesucht listing page showing the "deactivated" banner
pub const WGG_REMOVED_PAGE: &str = r#"<html><body>
    <div class="alert alert-with-icon alert-danger">
        Diese Anzeige ist nicht mehr verfügbar.
    </div>
</body></html>"#;

/// immowelt listing page showing the "not found" alert box
pub const IMMOWELT_REMOVED_PAGE: &str = r#"<html><body>
    <sd-alertbox class="alertbox alertbox--is-shown">Das Exposé ist nicht mehr verfügbar</sd-alertbox>
</body></html>"#;

/// Listing page without any removal marker
pub const LIVE_PAGE: &str = r#"<html><body>
    <h1>Helle 1-Zimmer-Wohnung</h1>
    <div class="alert alert-info">Kontakt aufnehmen</div>
</body></html>"#;
