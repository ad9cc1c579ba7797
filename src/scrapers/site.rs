//! Hierarchical traversal of the site: states, districts, urban bodies, wards.
//!
//! [`SiteScraper`] orchestrates fetch → classify → recurse over an injected
//! [`FetchPage`] implementation, so the same traversal logic runs under the
//! sequential and parallel schedulers and against in-memory fixtures in
//! tests. Parsed documents are only held inside synchronous scopes; every
//! await point sees owned data.

use crate::error::Result;
use crate::fetch::FetchPage;
use crate::models::{District, Region, RunStats, UrbanBody, WardRecord};
use crate::scrapers::{links, wards};
use crate::utils::normalize_text;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static TBODY: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// Delay between district page fetches within one state.
const DISTRICT_DELAY: Duration = Duration::from_millis(500);

/// Keywords that mark a table as a ward listing when found among its first
/// five cells.
const WARD_TABLE_KEYWORDS: [&str; 3] = ["ward", "name", "no"];

pub struct SiteScraper<F> {
    base_url: Url,
    fetcher: F,
    stats: Arc<RunStats>,
}

impl<F> SiteScraper<F>
where
    F: FetchPage,
{
    pub fn new(base_url: Url, fetcher: F, stats: Arc<RunStats>) -> Self {
        Self { base_url, fetcher, stats }
    }

    /// Discover every state and union territory from the site root.
    ///
    /// When two links derive the same display name, the last seen wins while
    /// the position of the first keeps the encounter order stable.
    #[instrument(level = "info", skip_all)]
    pub async fn discover_regions(&self) -> Result<Vec<Region>> {
        let body = self.fetcher.fetch(&self.base_url).await?;
        let found = {
            let document = Html::parse_document(&body);
            links::state_links(&document, &self.base_url)
        };

        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut regions: Vec<Region> = Vec::new();
        for region in found {
            match by_name.get(&region.name) {
                Some(&index) => regions[index] = region,
                None => {
                    by_name.insert(region.name.clone(), regions.len());
                    regions.push(region);
                }
            }
        }

        info!(count = regions.len(), "Discovered states and union territories");
        Ok(regions)
    }

    /// List the urban local bodies of one state, deduplicated by page URL.
    ///
    /// States with district-wise listings are resolved district by district;
    /// a failed district fetch is logged, counted, and skipped without
    /// aborting the state. States without districts are scanned directly,
    /// inferring district names from row context where possible.
    #[instrument(level = "info", skip_all, fields(state = %region.name))]
    pub async fn list_urban_bodies(&self, region: &Region) -> Result<Vec<UrbanBody>> {
        let body = self.fetcher.fetch(&region.entry_url).await?;
        let (districts, mut bodies) = {
            let document = Html::parse_document(&body);
            let districts = links::district_links(&document, &self.base_url);
            if districts.is_empty() {
                (Vec::new(), scan_listing_tables(&document, &self.base_url, None))
            } else {
                (districts, Vec::new())
            }
        };

        for district in &districts {
            match self.fetch_district(district).await {
                Ok(found) => {
                    debug!(district = %district.name, count = found.len(), "District listed");
                    bodies.extend(found);
                }
                Err(e) => {
                    warn!(district = %district.name, error = %e, "District fetch failed; skipping");
                    self.stats.add_error();
                }
            }
            sleep(DISTRICT_DELAY).await;
        }

        // First occurrence wins; encounter order preserved.
        let unique: Vec<UrbanBody> = bodies.into_iter().unique_by(|b| b.url.clone()).collect();
        info!(count = unique.len(), "Found urban local bodies");
        Ok(unique)
    }

    async fn fetch_district(&self, district: &District) -> Result<Vec<UrbanBody>> {
        let body = self.fetcher.fetch(&district.url).await?;
        let document = Html::parse_document(&body);
        Ok(scan_listing_tables(&document, &self.base_url, Some(&district.name)))
    }

    /// Extract ward records from an urban body's page, in row order,
    /// concatenated across every ward table on the page.
    #[instrument(level = "debug", skip_all, fields(body = %body.name))]
    pub async fn list_wards(&self, body: &UrbanBody) -> Result<Vec<WardRecord>> {
        let html = self.fetcher.fetch(&body.url).await?;
        let document = Html::parse_document(&html);
        let records = ward_tables(&document);
        debug!(count = records.len(), "Extracted wards");
        Ok(records)
    }
}

/// Scan a listing page's table bodies for urban-body links.
///
/// `district` is the known district name on district pages; on direct state
/// listings it is inferred per row, defaulting to "Unknown".
fn scan_listing_tables(document: &Html, base: &Url, district: Option<&str>) -> Vec<UrbanBody> {
    let mut bodies = Vec::new();
    for table in document.select(&TABLE) {
        let Some(tbody) = table.select(&TBODY).next() else { continue };
        for row in tbody.select(&ROW) {
            let district_name = match district {
                Some(name) => name.to_string(),
                None => infer_district(row).unwrap_or_else(|| "Unknown".to_string()),
            };
            bodies.extend(links::urban_body_links(row, base, &district_name));
        }
    }
    bodies
}

/// Infer a district name from a row's own cells.
///
/// Takes the first cell containing "district" (any case) shorter than 50
/// characters, with the literal "district"/"District" stripped out.
fn infer_district(row: ElementRef<'_>) -> Option<String> {
    for cell in row.select(&CELL) {
        let text = normalize_text(&cell.text().collect::<String>());
        if text.to_lowercase().contains("district") && text.chars().count() < 50 {
            let name = text.replace("district", "").replace("District", "");
            let name = name.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Pull ward records out of every ward-looking table on a page.
fn ward_tables(document: &Html) -> Vec<WardRecord> {
    let mut records = Vec::new();
    for table in document.select(&TABLE) {
        let header_text = table
            .select(&CELL)
            .take(5)
            .map(|cell| cell.text().collect::<String>().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        if !WARD_TABLE_KEYWORDS.iter().any(|kw| header_text.contains(kw)) {
            continue;
        }

        // The parser gives every table with rows an implicit tbody, so header
        // rows can land inside it. Rows made entirely of th cells are headers
        // and never ward data.
        let rows: Vec<ElementRef<'_>> = match table.select(&TBODY).next() {
            Some(tbody) => tbody.select(&ROW).collect(),
            None => table.select(&ROW).collect(),
        };

        for row in rows {
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() < 3 || cells.iter().all(|cell| cell.value().name() == "th") {
                continue;
            }
            let texts: Vec<String> = cells
                .iter()
                .map(|cell| normalize_text(&cell.text().collect::<String>()))
                .collect();
            if let Some(record) = wards::extract_ward(&texts) {
                records.push(record);
            }
        }
    }
    records
}
