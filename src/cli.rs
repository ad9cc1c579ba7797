//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.

use clap::Parser;

/// Command-line arguments for the CivicAtlas ward scraper.
///
/// # Examples
///
/// ```sh
/// # Sequential crawl into ./data
/// civicatlas_wards -o ./data
///
/// # Parallel crawl, 30 states at a time
/// civicatlas_wards -o ./data --parallel
///
/// # Lower the parallel ceiling
/// civicatlas_wards --parallel --concurrency 8
/// ```
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Directory for per-state CSV files and the consolidated output
    #[arg(short, long, default_value = "data")]
    pub output_dir: String,

    /// Base URL of the CivicAtlas site
    #[arg(long, env = "CIVICATLAS_BASE_URL", default_value = "https://civicatlas.in")]
    pub base_url: String,

    /// Crawl states concurrently instead of one at a time
    #[arg(short, long)]
    pub parallel: bool,

    /// Maximum number of states in flight in parallel mode
    #[arg(long, default_value_t = 30)]
    pub concurrency: usize,
}
