//! Heuristic mapping of table-row cells to ward attributes.
//!
//! Ward tables on CivicAtlas are not uniform: the common layout is
//! `#, Ward Name, Ward No, LGD Code`, but some bodies drop or reorder
//! columns. Extraction runs one left-to-right pass over the cells, trying the
//! positional rules first and falling back to content-based rules. A field
//! set by an earlier cell is never overwritten by a later one, with one
//! deliberate exception in the "Ward No. <n>" combined-cell rule below.

use crate::models::WardRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// A combined cell like "Ward No. 5" or "ward no 12 - Central".
static WARD_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ward\s*no\.?\s*(\d+)").unwrap());

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Map one row's cell texts to a [`WardRecord`].
///
/// `cells` must already be normalized (see `utils::normalize_text`). Returns
/// `None` when every cell is empty or no field can be populated. Pure
/// function: the same cells always produce the same record.
///
/// Per cell, the first matching rule applies:
/// 1. cell 0, purely digits: row ordinal, ignored
/// 2. cell 1 containing "ward": ward name verbatim
/// 3. cell 2, purely digits: ward number
/// 4. cell 3, purely digits: LGD code
/// 5. any digits-only cell: length ≥ 3 fills an unset LGD code, length ≤ 2
///    an unset ward number
/// 6. any cell containing "ward" longer than 5 chars fills an unset ward name
/// 7. a "ward no. <digits>" cell sets the ward number from the capture and,
///    when the ward name is still unset, the whole cell as ward name
pub fn extract_ward(cells: &[String]) -> Option<WardRecord> {
    if cells.iter().all(|cell| cell.is_empty()) {
        return None;
    }

    let mut record = WardRecord::default();

    for (i, text) in cells.iter().enumerate() {
        if text.is_empty() {
            continue;
        }
        let lower = text.to_lowercase();
        let length = text.chars().count();

        if i == 0 && is_digits(text) {
            // Serial number column, never populates a field.
        } else if i == 1 && lower.contains("ward") {
            record.ward_name = text.clone();
        } else if i == 2 && is_digits(text) {
            record.ward_number = text.clone();
        } else if i == 3 && is_digits(text) {
            record.lgd_code = text.clone();
        } else if is_digits(text) && length >= 3 && record.lgd_code.is_empty() {
            record.lgd_code = text.clone();
        } else if is_digits(text) && length <= 2 && record.ward_number.is_empty() {
            record.ward_number = text.clone();
        } else if lower.contains("ward") && length > 5 && record.ward_name.is_empty() {
            record.ward_name = text.clone();
        } else if record.ward_name.is_empty() {
            if let Some(captures) = WARD_NO.captures(text) {
                record.ward_number = captures[1].to_string();
                record.ward_name = text.clone();
            }
        }
    }

    if record.has_data() {
        Some(record)
    } else {
        debug!(?cells, "Row populated no ward fields; dropping");
        None
    }
}
