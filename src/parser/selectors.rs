//! CSS selectors for the supported listing sources
//!
//! Each source exposes a different card layout on its result pages and a
//! different banner on expired listing pages. The selectors are compiled once
//! and shared by every extractor call.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;

use crate::models::SourceKind;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    // immowelt.de
    static ref IMMOWELT_ITEM: Selector = parse_selector!(r#"[class^="EstateItem-"]"#);
    static ref IMMOWELT_TITLE: Selector = parse_selector!("h2");
    static ref IMMOWELT_PRICE: Selector = parse_selector!(r#"[data-test="price"]"#);
    static ref IMMOWELT_AREA: Selector = parse_selector!(r#"[data-test="area"]"#);
    static ref IMMOWELT_ROOMS: Selector = parse_selector!(r#"[data-test="rooms"]"#);
    static ref IMMOWELT_LINK: Selector = parse_selector!("a[href]");
    static ref IMMOWELT_REMOVED: Selector = parse_selector!("sd-alertbox.alertbox--is-shown");

    // wg-gesucht.de
    static ref WGG_ITEM: Selector = parse_selector!("div.wgg_card.offer_list_item");
    static ref WGG_PRICE: Selector = parse_selector!("div.row.noprint.middle div.col-xs-3 b");
    static ref WGG_AREA: Selector =
        parse_selector!("div.row.noprint.middle div.col-xs-3.text-right b");
    static ref WGG_ROOMS: Selector = parse_selector!("div.col-xs-11 span");
    static ref WGG_LINK: Selector = parse_selector!("a.detailansicht[href]");
    static ref WGG_REMOVED: Selector = parse_selector!("div.alert.alert-with-icon.alert-danger");

    // kleinanzeigen.de
    static ref KA_ITEM: Selector = parse_selector!(r#"[class="aditem"]"#);
    static ref KA_TITLE: Selector = parse_selector!(".text-module-begin a");
    static ref KA_PRICE: Selector = parse_selector!(".aditem-main--middle--price-shipping--price");
    static ref KA_AREA: Selector = parse_selector!(".simpletag:nth-child(1)");
    static ref KA_ROOMS: Selector = parse_selector!(".simpletag:nth-child(2)");
    static ref KA_LINK: Selector = parse_selector!(".aditem-main--middle a[href]");
    static ref KA_REMOVED: Selector = parse_selector!("#viewad-adexpired, .outdated-ad");

    // "1-Zimmer-Wohnung", "2-Zimmer-Wohnung", ...
    static ref WGG_ROOMS_PATTERN: Regex =
        Regex::new(r"(\d+-\w+-\w+)").expect("Invalid rooms pattern");
}

/// Field selectors for one source's listing cards
pub struct ListingSelectors {
    /// One match per listing card
    pub item: &'static Selector,
    /// Not every source shows a title on its cards
    pub title: Option<&'static Selector>,
    pub price: &'static Selector,
    pub area: &'static Selector,
    pub rooms: &'static Selector,
    pub link: &'static Selector,
    /// Applied to the rooms text when the source embeds it in a longer label
    pub rooms_pattern: Option<&'static Regex>,
}

impl ListingSelectors {
    /// Selectors for the given source
    pub fn for_source(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Immowelt => Self {
                item: &IMMOWELT_ITEM,
                title: Some(&IMMOWELT_TITLE),
                price: &IMMOWELT_PRICE,
                area: &IMMOWELT_AREA,
                rooms: &IMMOWELT_ROOMS,
                link: &IMMOWELT_LINK,
                rooms_pattern: None,
            },
            SourceKind::WgGesucht => Self {
                item: &WGG_ITEM,
                title: None,
                price: &WGG_PRICE,
                area: &WGG_AREA,
                rooms: &WGG_ROOMS,
                link: &WGG_LINK,
                rooms_pattern: Some(&WGG_ROOMS_PATTERN),
            },
            SourceKind::Kleinanzeigen => Self {
                item: &KA_ITEM,
                title: Some(&KA_TITLE),
                price: &KA_PRICE,
                area: &KA_AREA,
                rooms: &KA_ROOMS,
                link: &KA_LINK,
                rooms_pattern: None,
            },
        }
    }
}

/// Selector for the "no longer available" marker on a listing page
pub fn removed_marker(kind: SourceKind) -> &'static Selector {
    match kind {
        SourceKind::Immowelt => &IMMOWELT_REMOVED,
        SourceKind::WgGesucht => &WGG_REMOVED,
        SourceKind::Kleinanzeigen => &KA_REMOVED,
    }
}
