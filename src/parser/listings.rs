use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Placeholder for any field the listing card does not provide.
pub const NOT_AVAILABLE: &str = "N/A";

static GROUP_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.Cols3").unwrap());
static CARD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.Cols3_item").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// One job advertisement as shown on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub detail_url: String,
}

impl JobListing {
    pub fn has_detail_url(&self) -> bool {
        self.detail_url != NOT_AVAILABLE
    }
}

/// Parse every listing card on the index page, in document order.
///
/// A card missing some sub-element still produces a listing; the missing
/// fields are set to [`NOT_AVAILABLE`]. A `<p>` that is present but blank
/// gives an empty title.
pub fn parse_listings(index_html: &str, base_url: &str) -> Vec<JobListing> {
    let document = Html::parse_document(index_html);
    let mut listings = Vec::new();

    for group in document.select(&GROUP_SEL) {
        for card in group.select(&CARD_SEL) {
            listings.push(parse_card(card, base_url));
        }
    }

    listings
}

fn parse_card(card: ElementRef<'_>, base_url: &str) -> JobListing {
    let title = card
        .select(&TITLE_SEL)
        .next()
        .map(|p| p.text().collect::<String>().trim().to_string());

    let anchor = card.select(&ANCHOR_SEL).next();

    let (company, location) = match anchor {
        Some(a) => {
            let text = a.text().collect::<String>();
            let mut parts = LINE_BREAK_RE
                .split(text.trim())
                .map(str::trim)
                .filter(|part| !part.is_empty());
            (parts.next().map(String::from), parts.next().map(String::from))
        }
        None => (None, None),
    };

    let detail_url = anchor
        .and_then(|a| a.value().attr("href"))
        .map(|href| format!("{}{}", base_url, href));

    JobListing {
        title: or_not_available(title),
        company: or_not_available(company),
        location: or_not_available(location),
        detail_url: or_not_available(detail_url),
    }
}

fn or_not_available(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
