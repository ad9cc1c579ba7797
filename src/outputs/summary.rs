//! JSON run summary.
//!
//! After the crawl and consolidation finish, the final [`RunReport`] is
//! written as `summary.json` next to the consolidated CSV so downstream
//! tooling can pick up the run's counters without parsing logs.

use crate::error::Result;
use crate::models::RunReport;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_report(report: &RunReport, output_dir: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    let path = output_dir.join("summary.json");
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(())
}
