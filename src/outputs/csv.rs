//! Per-state CSV streams and the post-run consolidation pass.
//!
//! Each region task writes its own file under the states directory, so there
//! is no cross-task contention. Files carry the header immediately on
//! creation and are flushed after every append; an interrupted run leaves
//! every file a valid table. Consolidation runs once, after all region tasks
//! finish.

use crate::error::Result;
use crate::models::OutputRow;
use crate::utils::clean_filename;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

/// The fixed 7-column output schema.
pub const CSV_HEADER: [&str; 7] = [
    "Ward Number",
    "Ward Name",
    "Urban Local Body Name",
    "Urban Local Body Type",
    "District",
    "State",
    "LGD Code",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn format_row(fields: &[&str]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        if needs_quotes(field) {
            line.push('"');
            line.push_str(&field.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(field);
        }
    }
    line.push('\n');
    line
}

/// Append-only CSV stream for one state.
pub struct RegionCsv {
    file: File,
    path: PathBuf,
}

impl RegionCsv {
    /// Create (or truncate) the state's file and write the header, so even a
    /// state with zero wards leaves a valid table behind.
    pub async fn create(states_dir: &Path, region_name: &str) -> Result<Self> {
        fs::create_dir_all(states_dir).await?;
        let path = states_dir.join(format!("{}.csv", clean_filename(region_name)));
        let mut file = File::create(&path).await?;
        file.write_all(format_row(&CSV_HEADER).as_bytes()).await?;
        file.flush().await?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch of rows and flush.
    pub async fn append(&mut self, rows: &[OutputRow]) -> Result<()> {
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&format_row(&row.fields()));
        }
        self.file.write_all(buf.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }
}

/// Outcome of the consolidation pass.
#[derive(Debug, Default)]
pub struct ConsolidationReport {
    pub files_merged: usize,
    pub files_skipped: usize,
    pub rows: u64,
}

/// Merge every state file into one consolidated CSV.
///
/// State files are taken in sorted name order, header written once, then each
/// file's data rows. Unreadable files are skipped with a warning rather than
/// aborting the merge. Fields are normalized upstream and carry no embedded
/// newlines, so splitting on lines is safe.
#[instrument(level = "info", skip_all, fields(out = %out_path.display()))]
pub async fn consolidate(states_dir: &Path, out_path: &Path) -> Result<ConsolidationReport> {
    let mut paths = Vec::new();
    let mut entries = fs::read_dir(states_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("csv") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut out = File::create(out_path).await?;
    out.write_all(format_row(&CSV_HEADER).as_bytes()).await?;

    let mut report = ConsolidationReport::default();
    for path in paths {
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let mut buf = String::new();
                for line in contents.lines().skip(1) {
                    if !line.is_empty() {
                        buf.push_str(line);
                        buf.push('\n');
                        report.rows += 1;
                    }
                }
                out.write_all(buf.as_bytes()).await?;
                report.files_merged += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable state file; skipping");
                report.files_skipped += 1;
            }
        }
    }
    out.flush().await?;

    info!(
        files = report.files_merged,
        skipped = report.files_skipped,
        rows = report.rows,
        "Consolidated state files"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UlbType, UrbanBody, WardRecord};
    use url::Url;

    fn sample_row(n: u32) -> OutputRow {
        let ward = WardRecord {
            ward_number: n.to_string(),
            ward_name: format!("Ward No. {n}"),
            lgd_code: format!("10000{n}"),
        };
        let body = UrbanBody {
            name: "Ambur".into(),
            url: Url::parse("https://civicatlas.in/municipality-ambur-1").unwrap(),
            kind: UlbType::Municipality,
            district: "Tirupattur".into(),
        };
        OutputRow::new(&ward, &body, "Tamil Nadu")
    }

    #[test]
    fn test_format_row_quotes_commas_and_quotes() {
        let line = format_row(&["a,b", r#"say "hi""#, "plain"]);
        assert_eq!(line, "\"a,b\",\"say \"\"hi\"\"\",plain\n");
    }

    #[tokio::test]
    async fn test_region_csv_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = RegionCsv::create(dir.path(), "Tamil Nadu").await.unwrap();
        csv.append(&[sample_row(1), sample_row(2)]).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("Tamil_Nadu.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Ward Number,Ward Name,Urban Local Body Name,Urban Local Body Type,District,State,LGD Code"
        );
        assert_eq!(lines[1], "1,Ward No. 1,Ambur,Municipality,Tirupattur,Tamil Nadu,100001");
    }

    #[tokio::test]
    async fn test_empty_region_file_is_still_a_valid_table() {
        let dir = tempfile::tempdir().unwrap();
        let csv = RegionCsv::create(dir.path(), "Lakshadweep").await.unwrap();
        let contents = std::fs::read_to_string(csv.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_consolidate_merges_all_state_files() {
        let dir = tempfile::tempdir().unwrap();
        let states = dir.path().join("states");

        let mut a = RegionCsv::create(&states, "Alpha").await.unwrap();
        a.append(&[sample_row(1), sample_row(2)]).await.unwrap();
        RegionCsv::create(&states, "Beta").await.unwrap(); // zero rows
        let mut c = RegionCsv::create(&states, "Gamma").await.unwrap();
        c.append(&[sample_row(3), sample_row(4), sample_row(5)]).await.unwrap();

        let out = dir.path().join("all.csv");
        let report = consolidate(&states, &out).await.unwrap();
        assert_eq!(report.files_merged, 3);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.rows, 5);

        let contents = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 6); // header + 5 data rows
        assert!(lines[0].starts_with("Ward Number,"));
    }

    #[tokio::test]
    async fn test_consolidate_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let states = dir.path().join("states");
        let mut a = RegionCsv::create(&states, "Alpha").await.unwrap();
        a.append(&[sample_row(1)]).await.unwrap();
        // A directory with a .csv name is unreadable as a file.
        std::fs::create_dir(states.join("broken.csv")).unwrap();

        let out = dir.path().join("all.csv");
        let report = consolidate(&states, &out).await.unwrap();
        assert_eq!(report.files_merged, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.rows, 1);
    }
}
