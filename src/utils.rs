//! Utility functions for text cleanup, file naming, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Text normalization for everything pulled out of HTML
//! - Filesystem-safe file names for per-state output
//! - Human-readable durations for the final summary
//! - Output directory validation before the crawl starts

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-.,()/]").unwrap());
static UNSAFE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static SPACE_OR_DOT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s.]+").unwrap());

/// Normalize raw text extracted from HTML into a canonical string.
///
/// Collapses whitespace runs to single spaces, trims the ends, and replaces
/// any character outside {word chars, whitespace, `-`, `.`, `,`, `(`, `)`,
/// `/`} with a space before collapsing again. Empty input yields an empty
/// string, and the function is idempotent.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let collapsed = WHITESPACE_RUN.replace_all(text.trim(), " ");
    let cleaned = DISALLOWED.replace_all(&collapsed, " ");
    WHITESPACE_RUN.replace_all(cleaned.trim(), " ").into_owned()
}

/// Turn a region name into a filesystem-safe file stem.
///
/// Replaces `<>:"/\|?*` with underscores, collapses whitespace and dot runs
/// to a single underscore, caps the length at 200 characters, and trims
/// leading/trailing underscores.
pub fn clean_filename(name: &str) -> String {
    let replaced = UNSAFE_FILENAME.replace_all(name, "_");
    let mut cleaned = SPACE_OR_DOT_RUN.replace_all(&replaced, "_").into_owned();
    if let Some((idx, _)) = cleaned.char_indices().nth(200) {
        cleaned.truncate(idx);
    }
    cleaned.trim_matches('_').to_string()
}

/// Format a duration in seconds as a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_duration(42.5), "42.5 seconds");
/// assert_eq!(format_duration(125.0), "2m 5s");
/// assert_eq!(format_duration(3725.0), "1h 2m 5s");
/// ```
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1} seconds")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{minutes}m {secs}s")
    } else {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{hours}h {minutes}m {secs}s")
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
