//! Data models for the state → urban local body → ward hierarchy.
//!
//! This module defines the core data structures used throughout the scraper:
//! - [`Region`]: a state or union territory discovered on the site root
//! - [`District`]: the optional intermediate grouping some states expose
//! - [`UrbanBody`] and [`UlbType`]: a municipal governance unit and its kind
//! - [`WardRecord`]: the ward attributes pulled out of one table row
//! - [`OutputRow`]: the flattened 7-column CSV record
//! - [`RunStats`]: counters shared across concurrent region tasks

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// A state or union territory, the top level of the hierarchy.
///
/// Identified by name; name collisions during discovery are resolved
/// last-seen-wins, so a `Region` is immutable once discovery completes.
#[derive(Debug, Clone)]
pub struct Region {
    /// Display name, e.g. "Tamil Nadu".
    pub name: String,
    /// The state's urban-local-bodies listing page.
    pub entry_url: Url,
}

/// A district-wise listing page. Only some states expose these.
#[derive(Debug, Clone)]
pub struct District {
    pub name: String,
    pub url: Url,
}

/// The kind of urban local body, derived from the URL path of its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UlbType {
    MunicipalCorporation,
    Municipality,
    TownPanchayat,
    NotifiedAreaCouncil,
    CantonmentBoard,
    NctMunicipalCouncil,
    CityMunicipalCouncil,
    TownMunicipalCouncil,
    Unknown,
}

/// URL path tokens in first-match order. "municipal-corporations" must be
/// checked before "municipality" so corporation URLs never fall through to
/// the looser token.
const ULB_TYPE_TOKENS: [(&str, UlbType); 8] = [
    ("municipal-corporations", UlbType::MunicipalCorporation),
    ("municipality", UlbType::Municipality),
    ("town-panchayat", UlbType::TownPanchayat),
    ("notified-area-council", UlbType::NotifiedAreaCouncil),
    ("cantonment-board", UlbType::CantonmentBoard),
    ("nct-municipal-council", UlbType::NctMunicipalCouncil),
    ("city-municipal-council", UlbType::CityMunicipalCouncil),
    ("town-municipal-council", UlbType::TownMunicipalCouncil),
];

impl UlbType {
    /// Classify a page URL by the first matching path token.
    pub fn from_url(url: &str) -> Self {
        for (token, kind) in ULB_TYPE_TOKENS {
            if url.contains(token) {
                return kind;
            }
        }
        UlbType::Unknown
    }

    /// The display label used in the CSV output.
    pub fn label(&self) -> &'static str {
        match self {
            UlbType::MunicipalCorporation => "Municipal Corporation",
            UlbType::Municipality => "Municipality",
            UlbType::TownPanchayat => "Town Panchayat",
            UlbType::NotifiedAreaCouncil => "Notified Area Council",
            UlbType::CantonmentBoard => "Cantonment Board",
            UlbType::NctMunicipalCouncil => "NCT Municipal Council",
            UlbType::CityMunicipalCouncil => "City Municipal Council",
            UlbType::TownMunicipalCouncil => "Town Municipal Council",
            UlbType::Unknown => "Unknown",
        }
    }
}

/// A municipal governance unit within a region or district.
///
/// The page URL is the identity key: within one region's result set no two
/// entries share a url.
#[derive(Debug, Clone)]
pub struct UrbanBody {
    pub name: String,
    pub url: Url,
    pub kind: UlbType,
    /// District name, or "Unknown" when not derivable from page context.
    pub district: String,
}

/// Ward attributes extracted from a single table row.
///
/// All three fields are independently optional; a record is only emitted when
/// at least one is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WardRecord {
    pub ward_number: String,
    pub ward_name: String,
    pub lgd_code: String,
}

impl WardRecord {
    /// True when at least one field carries data.
    pub fn has_data(&self) -> bool {
        !self.ward_number.is_empty() || !self.ward_name.is_empty() || !self.lgd_code.is_empty()
    }
}

/// The flattened join of ward, urban body, and state: one CSV data row.
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub ward_number: String,
    pub ward_name: String,
    pub body_name: String,
    pub body_type: &'static str,
    pub district: String,
    pub state: String,
    pub lgd_code: String,
}

impl OutputRow {
    pub fn new(ward: &WardRecord, body: &UrbanBody, state: &str) -> Self {
        Self {
            ward_number: ward.ward_number.clone(),
            ward_name: ward.ward_name.clone(),
            body_name: body.name.clone(),
            body_type: body.kind.label(),
            district: body.district.clone(),
            state: state.to_string(),
            lgd_code: ward.lgd_code.clone(),
        }
    }

    /// Fields in CSV column order.
    pub fn fields(&self) -> [&str; 7] {
        [
            &self.ward_number,
            &self.ward_name,
            &self.body_name,
            self.body_type,
            &self.district,
            &self.state,
            &self.lgd_code,
        ]
    }
}

/// Aggregate counters for one run, shared across concurrent region tasks.
///
/// Plain atomic increments; the only cross-task mutable state in the program.
#[derive(Debug, Default)]
pub struct RunStats {
    regions_processed: AtomicU64,
    urban_bodies_processed: AtomicU64,
    wards_extracted: AtomicU64,
    errors: AtomicU64,
    skipped: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&self) {
        self.regions_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_urban_body(&self) {
        self.urban_bodies_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_wards(&self, count: u64) {
        self.wards_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            regions_processed: self.regions_processed.load(Ordering::Relaxed),
            urban_bodies_processed: self.urban_bodies_processed.load(Ordering::Relaxed),
            wards_extracted: self.wards_extracted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`RunStats`], used for logging and the JSON summary.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub regions_processed: u64,
    pub urban_bodies_processed: u64,
    pub wards_extracted: u64,
    pub errors: u64,
    pub skipped: u64,
}

/// The final report for one run, written to `summary.json` and logged.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub regions_discovered: usize,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub consolidated_rows: u64,
    pub consolidated_file: String,
    pub consolidated_bytes: u64,
    pub duration_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_covers_all_tokens() {
        let cases = [
            ("/municipal-corporations-chennai-1", UlbType::MunicipalCorporation),
            ("/municipality-ambur-2", UlbType::Municipality),
            ("/town-panchayat-alandur-3", UlbType::TownPanchayat),
            ("/notified-area-council-x-4", UlbType::NotifiedAreaCouncil),
            ("/cantonment-board-y-5", UlbType::CantonmentBoard),
            ("/nct-municipal-council-z-6", UlbType::NctMunicipalCouncil),
            ("/city-municipal-council-w-7", UlbType::CityMunicipalCouncil),
            ("/town-municipal-council-v-8", UlbType::TownMunicipalCouncil),
        ];
        for (url, expected) in cases {
            assert_eq!(UlbType::from_url(url), expected, "{url}");
        }
    }

    #[test]
    fn test_type_mapping_unrecognized_is_unknown() {
        assert_eq!(UlbType::from_url("/gram-panchayat-somewhere-9"), UlbType::Unknown);
        assert_eq!(UlbType::from_url(""), UlbType::Unknown);
    }

    #[test]
    fn test_corporation_token_wins_over_looser_match() {
        // "municipal-corporations" is checked first even though the URL could
        // loosely resemble other tokens downstream.
        let url = "/municipal-corporations-greater-chennai-municipal-corporation-1";
        assert_eq!(UlbType::from_url(url), UlbType::MunicipalCorporation);
    }

    #[test]
    fn test_ward_record_has_data() {
        assert!(!WardRecord::default().has_data());
        let rec = WardRecord {
            ward_number: "5".into(),
            ..Default::default()
        };
        assert!(rec.has_data());
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = RunStats::new();
        stats.add_region();
        stats.add_urban_body();
        stats.add_urban_body();
        stats.add_wards(12);
        stats.add_error();
        stats.add_skipped();
        let snap = stats.snapshot();
        assert_eq!(snap.regions_processed, 1);
        assert_eq!(snap.urban_bodies_processed, 2);
        assert_eq!(snap.wards_extracted, 12);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.skipped, 1);
    }
}
