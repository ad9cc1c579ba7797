//! Link classification for the three URL pattern families on CivicAtlas.
//!
//! State entry pages, district listings, and urban-local-body pages are all
//! recognizable from their URL shapes alone:
//!
//! - state: `/urban-local-bodies-list-in-<slug>-state-<id>`
//! - district: `/urban-local-bodies-list-in-<slug>-district-<id>`
//! - urban body: `/<type-token>-<slug>-<id>` with one of eight type tokens
//!
//! All functions here are pure over a parsed document or element. Anchors
//! with malformed hrefs are skipped, never an error.

use crate::models::{District, Region, UlbType, UrbanBody};
use crate::utils::normalize_text;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static STATE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/urban-local-bodies-list-in-.*-state-\d+").unwrap());
static STATE_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/urban-local-bodies-list-in-(.+?)-state-\d+").unwrap());
static DISTRICT_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/urban-local-bodies-list-in-.*-district-\d+").unwrap());
static ULB_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/(municipal-corporations|municipality|town-panchayat|notified-area-council|cantonment-board|nct-municipal-council|city-municipal-council|town-municipal-council)-",
    )
    .unwrap()
});
// A trailing ULB-count annotation on state link text, e.g. "Tamil Nadu 664".
static TRAILING_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\d+$").unwrap());

/// Anchor text with HTML structure flattened away.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extract state entry links from the site root.
///
/// One [`Region`] per matching anchor; name-collision handling is left to the
/// caller.
pub fn state_links(document: &Html, base: &Url) -> Vec<Region> {
    let mut regions = Vec::new();
    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else { continue };
        if !STATE_HREF.is_match(href) {
            continue;
        }
        let Ok(entry_url) = base.join(href) else { continue };
        if let Some(name) = state_display_name(&element_text(element), href) {
            debug!(%name, %entry_url, "Found state link");
            regions.push(Region { name, entry_url });
        }
    }
    regions
}

/// Extract district listing links from a state entry page.
pub fn district_links(document: &Html, base: &Url) -> Vec<District> {
    let mut districts = Vec::new();
    for element in document.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else { continue };
        if !DISTRICT_HREF.is_match(href) {
            continue;
        }
        let Ok(url) = base.join(href) else { continue };
        districts.push(District { name: element_text(element), url });
    }
    districts
}

/// Extract urban-body links from one element subtree (typically a table row),
/// tagging each with the given district name.
pub fn urban_body_links(scope: ElementRef<'_>, base: &Url, district: &str) -> Vec<UrbanBody> {
    let mut bodies = Vec::new();
    for element in scope.select(&ANCHOR) {
        let Some(href) = element.value().attr("href") else { continue };
        if !ULB_HREF.is_match(href) {
            continue;
        }
        let Ok(url) = base.join(href) else { continue };
        let kind = UlbType::from_url(url.as_str());
        bodies.push(UrbanBody {
            name: normalize_text(&element_text(element)),
            url,
            kind,
            district: district.to_string(),
        });
    }
    bodies
}

/// Derive a state's display name from its link.
///
/// Prefers the anchor text with any trailing ULB-count annotation stripped.
/// Falls back to the URL slug (hyphens to spaces, title-cased) when the text
/// is absent or is the generic "Urban Local Bodies" placeholder.
fn state_display_name(text: &str, href: &str) -> Option<String> {
    if !text.is_empty() && text != "Urban Local Bodies" {
        let name = TRAILING_COUNT.replace(text, "").trim().to_string();
        if !name.is_empty() {
            return Some(name);
        }
    }
    let captures = STATE_SLUG.captures(href)?;
    Some(title_case_slug(&captures[1]))
}

/// "tamil-nadu" -> "Tamil Nadu".
fn title_case_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
