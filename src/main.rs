//! # CivicAtlas Wards
//!
//! A batch scraper that extracts the state → urban local body → ward
//! hierarchy from CivicAtlas.in and persists it as CSV.
//!
//! ## Features
//!
//! - Discovers every state and union territory from the site root
//! - Resolves district-wise listings where states expose them
//! - Parses heterogeneous ward tables into a fixed 7-column schema
//! - Retries every fetch with exponential backoff; isolated failures never
//!   abort the run
//! - Sequential mode with polite fixed delays, or bounded parallel fan-out
//!   with one fetch session per state
//!
//! ## Usage
//!
//! ```sh
//! civicatlas_wards -o ./data --parallel
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: classify state entry links on the site root
//! 2. **Traversal**: per state, enumerate urban bodies (via districts when
//!    present) and extract each body's ward table rows
//! 3. **Output**: append rows to one CSV stream per state
//! 4. **Consolidation**: merge all state files into one CSV, then write a
//!    JSON run summary

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod fetch;
mod models;
mod outputs;
mod run;
mod scrapers;
mod utils;

use cli::Cli;
use utils::{ensure_writable_dir, format_duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("civicatlas_wards starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: ensure the output dir is writable before any crawling
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // Per-state files are flushed after every append, so an interrupt leaves
    // valid partial output behind; only the consolidation step is lost.
    let report = tokio::select! {
        result = run::run(&args) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; partial per-state output under {} remains valid", args.output_dir);
            return Err("interrupted by user".into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        regions_discovered = report.regions_discovered,
        regions_processed = report.stats.regions_processed,
        urban_bodies_processed = report.stats.urban_bodies_processed,
        wards_extracted = report.stats.wards_extracted,
        errors = report.stats.errors,
        skipped = report.stats.skipped,
        consolidated_rows = report.consolidated_rows,
        consolidated_bytes = report.consolidated_bytes,
        output = %report.consolidated_file,
        duration = %format_duration(elapsed.as_secs_f64()),
        "Run complete"
    );

    Ok(())
}
