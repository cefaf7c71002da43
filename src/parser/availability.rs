//! Detection of listings that are no longer available

use scraper::Html;

use crate::models::SourceKind;
use crate::parser::selectors::removed_marker;

impl SourceKind {
    /// Whether a fetched listing page shows this source's "no longer available" marker
    pub fn detect_removed(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        document.select(removed_marker(*self)).next().is_some()
    }
}
