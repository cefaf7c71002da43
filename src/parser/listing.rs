//! Listing extraction from result pages
//!
//! Every source variant runs the same algorithm with its own selectors:
//! select the listing cards, read each field from the card, resolve the link
//! to an absolute URL. A card without a usable link is skipped; the rest of
//! the page still yields candidates.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{ListingCandidate, SourceKind};
use crate::parser::selectors::ListingSelectors;
use crate::utils::error::ParseError;
use crate::utils::normalize_whitespace;

impl SourceKind {
    /// Extract every well-formed listing candidate from a result page
    ///
    /// Malformed cards are logged and skipped. A page without any matching
    /// card yields an empty vector.
    pub fn parse_listings(&self, html: &str) -> Vec<ListingCandidate> {
        self.extract_items(html)
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::debug!(source = %self, index, error = %e, "Skipping malformed listing");
                    None
                }
            })
            .collect()
    }

    /// Extract every listing card on the page, keeping per-card failures
    pub fn extract_items(&self, html: &str) -> Vec<Result<ListingCandidate, ParseError>> {
        let document = Html::parse_document(html);
        let selectors = ListingSelectors::for_source(*self);

        document
            .select(selectors.item)
            .map(|card| self.extract_card(card, &selectors))
            .collect()
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        selectors: &ListingSelectors,
    ) -> Result<ListingCandidate, ParseError> {
        let href = card
            .select(selectors.link)
            .find_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(ParseError::MissingLink)?;

        let url = self.resolve_url(href)?;

        let rooms = match selectors.rooms_pattern {
            Some(pattern) => card
                .select(selectors.rooms)
                .flat_map(|el| el.text())
                .find_map(|text| pattern.captures(text).map(|c| c[1].to_string())),
            None => first_text(card, selectors.rooms),
        };

        Ok(ListingCandidate {
            url: Some(url),
            title: selectors.title.and_then(|sel| first_text(card, sel)),
            price: first_text(card, selectors.price),
            area: first_text(card, selectors.area),
            rooms,
        })
    }

    /// Resolve a listing link against this source's origin
    ///
    /// Absolute links pass through unchanged; relative ones are joined to
    /// the source origin. Only http(s) results are accepted.
    pub fn resolve_url(&self, href: &str) -> Result<String, ParseError> {
        let base = Url::parse(self.base_origin())
            .map_err(|e| ParseError::InvalidUrl(format!("{}: {e}", self.base_origin())))?;

        let resolved = base
            .join(href.trim())
            .map_err(|e| ParseError::InvalidUrl(format!("{href}: {e}")))?;

        match resolved.scheme() {
            "http" | "https" => Ok(resolved.to_string()),
            other => Err(ParseError::InvalidUrl(format!(
                "{href}: unsupported scheme {other}"
            ))),
        }
    }
}

/// First non-blank direct text node of the first matching element
///
/// Falls back to the element's whole text when the value sits in a nested
/// tag. Whitespace is collapsed; blank results become `None`.
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = scope.select(selector).next()?;

    let direct = element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| normalize_whitespace(text))
        .find(|text| !text.is_empty());

    direct
        .or_else(|| Some(normalize_whitespace(&element.text().collect::<String>())))
        .filter(|text| !text.is_empty())
}
