// Core data structures for the immowatch pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::extract_host;

/// Supported listing sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Immowelt,
    WgGesucht,
    Kleinanzeigen,
}

impl SourceKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immowelt => "immowelt",
            Self::WgGesucht => "wg-gesucht",
            Self::Kleinanzeigen => "kleinanzeigen",
        }
    }

    /// Base origin used to resolve relative listing links
    pub fn base_origin(&self) -> &'static str {
        match self {
            Self::Immowelt => "https://www.immowelt.de",
            Self::WgGesucht => "https://www.wg-gesucht.de",
            Self::Kleinanzeigen => "https://www.kleinanzeigen.de",
        }
    }

    /// Host fragment identifying this source
    fn host_marker(&self) -> &'static str {
        self.as_str()
    }

    /// Whether `url` belongs to this source
    pub fn matches_url(&self, url: &str) -> bool {
        extract_host(url).is_some_and(|host| host.contains(self.host_marker()))
    }

    /// Recognise the source a stored listing URL belongs to
    pub fn from_url(url: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.matches_url(url))
    }

    /// Create from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "immowelt" | "iw" => Some(Self::Immowelt),
            "wg-gesucht" | "wggesucht" | "wgg" => Some(Self::WgGesucht),
            "kleinanzeigen" | "ka" => Some(Self::Kleinanzeigen),
            _ => None,
        }
    }

    /// Get all sources
    pub fn all() -> Vec<Self> {
        vec![Self::Immowelt, Self::WgGesucht, Self::Kleinanzeigen]
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unvalidated listing produced by an extractor
///
/// Every field is optional: sources expose different subsets and a missing
/// field is left unset rather than defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub url: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub rooms: Option<String>,
}

impl ListingCandidate {
    /// Candidate with only the dedup key set
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Dedup key, if present and non-blank
    pub fn dedup_key(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Convert into a listing, `None` when the dedup key is missing
    pub fn into_listing(self) -> Option<Listing> {
        let url = self.dedup_key()?.to_string();
        Some(Listing {
            source: SourceKind::from_url(&url),
            url,
            title: self.title,
            price: self.price,
            area: self.area,
            rooms: self.rooms,
            first_seen_at: Utc::now(),
        })
    }
}

/// A persisted rental listing, keyed by its source URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub url: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub rooms: Option<String>,
    pub source: Option<SourceKind>,
    pub first_seen_at: DateTime<Utc>,
}

impl Listing {
    /// Push message body for a newly seen listing
    pub fn notification_message(&self) -> String {
        fn field(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("-")
        }

        format!(
            "New offer: {}\nPrice: {}\nArea: {}\nRooms: {}",
            field(&self.title),
            field(&self.price),
            field(&self.area),
            field(&self.rooms),
        )
    }
}
