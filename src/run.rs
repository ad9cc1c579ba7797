//! Run coordination: one traversal, two schedulers.
//!
//! Sequential and parallel runs drive the same [`process_region`]; the only
//! differences are the delay profile and how region tasks are scheduled.
//! Sequential crawls share one connection pool and pace themselves with
//! 2 s / 1 s delays; parallel crawls fan out with `buffer_unordered`, give
//! every state its own fetch session, and pace urban-body fetches inside
//! each task, so total request rate scales with concurrency.

use crate::cli::Cli;
use crate::error::{Result, ScrapeError};
use crate::fetch::{FetchPage, HttpFetcher, RetryFetch, build_client};
use crate::models::{OutputRow, Region, RunReport, RunStats};
use crate::outputs::{csv, summary};
use crate::scrapers::site::SiteScraper;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

const MAX_RETRIES: usize = 3;
const DISCOVERY_RETRY_DELAY: Duration = Duration::from_secs(2);
const TRAVERSAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const SEQUENTIAL_REGION_DELAY: Duration = Duration::from_secs(2);
const SEQUENTIAL_BODY_DELAY: Duration = Duration::from_secs(1);
const PARALLEL_BODY_DELAY: Duration = Duration::from_millis(500);

pub const CONSOLIDATED_FILENAME: &str = "civicatlas_urban_bodies_wards.csv";

/// Execute the full discovery, traversal, and consolidation pipeline.
///
/// Fatal only when the site root cannot be fetched after retries or yields
/// no states; every smaller failure is isolated, counted, and skipped.
pub async fn run(cli: &Cli) -> Result<RunReport> {
    let start = Instant::now();
    let base_url = Url::parse(&cli.base_url)?;
    let output_dir = PathBuf::from(&cli.output_dir);
    let states_dir = output_dir.join("states");
    tokio::fs::create_dir_all(&states_dir).await?;
    let stats = Arc::new(RunStats::new());

    // Discovery gets the longer initial backoff; failure here aborts the run.
    let client = build_client()?;
    let discovery = SiteScraper::new(
        base_url.clone(),
        RetryFetch::new(
            HttpFetcher::from_client(client.clone()),
            MAX_RETRIES,
            DISCOVERY_RETRY_DELAY,
        ),
        Arc::clone(&stats),
    );
    let regions = discovery.discover_regions().await?;
    if regions.is_empty() {
        return Err(ScrapeError::NoRegions(base_url));
    }

    info!(
        count = regions.len(),
        parallel = cli.parallel,
        "Beginning state traversal"
    );
    if cli.parallel {
        run_parallel(&base_url, &regions, &states_dir, &stats, cli.concurrency).await;
    } else {
        run_sequential(&base_url, client, &regions, &states_dir, &stats).await;
    }

    // All region tasks have completed; merge their files.
    let consolidated_path = output_dir.join(CONSOLIDATED_FILENAME);
    let merged = csv::consolidate(&states_dir, &consolidated_path).await?;
    let consolidated_bytes = tokio::fs::metadata(&consolidated_path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);

    let report = RunReport {
        regions_discovered: regions.len(),
        stats: stats.snapshot(),
        consolidated_rows: merged.rows,
        consolidated_file: consolidated_path.display().to_string(),
        consolidated_bytes,
        duration_secs: start.elapsed().as_secs(),
    };
    summary::write_report(&report, &output_dir).await?;
    Ok(report)
}

/// One state at a time over a shared connection pool.
async fn run_sequential(
    base_url: &Url,
    client: Client,
    regions: &[Region],
    states_dir: &Path,
    stats: &Arc<RunStats>,
) {
    let total = regions.len();
    let scraper = SiteScraper::new(
        base_url.clone(),
        RetryFetch::new(
            HttpFetcher::from_client(client),
            MAX_RETRIES,
            TRAVERSAL_RETRY_DELAY,
        ),
        Arc::clone(stats),
    );

    for (i, region) in regions.iter().enumerate() {
        info!(state = %region.name, index = i + 1, total, "Processing state");
        if let Err(e) =
            process_region(&scraper, region, states_dir, SEQUENTIAL_BODY_DELAY, stats).await
        {
            error!(state = %region.name, error = %e, "State failed; continuing");
            stats.add_error();
        }
        if i + 1 < total {
            sleep(SEQUENTIAL_REGION_DELAY).await;
        }
    }
}

/// Bounded fan-out; each state task runs its own fetch session and reports
/// first-to-finish.
async fn run_parallel(
    base_url: &Url,
    regions: &[Region],
    states_dir: &Path,
    stats: &Arc<RunStats>,
    concurrency: usize,
) {
    stream::iter(regions.iter().cloned())
        .map(|region| {
            let base_url = base_url.clone();
            let states_dir = states_dir.to_path_buf();
            let stats = Arc::clone(stats);
            async move {
                let result = match HttpFetcher::new() {
                    Ok(fetcher) => {
                        let scraper = SiteScraper::new(
                            base_url,
                            RetryFetch::new(fetcher, MAX_RETRIES, TRAVERSAL_RETRY_DELAY),
                            Arc::clone(&stats),
                        );
                        process_region(&scraper, &region, &states_dir, PARALLEL_BODY_DELAY, &stats)
                            .await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => info!(state = %region.name, "State completed"),
                    Err(e) => {
                        error!(state = %region.name, error = %e, "State failed");
                        stats.add_error();
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<()>>()
        .await;
}

/// Traverse one state: list its urban bodies, extract each body's wards in
/// discovery order, and append the rows to the state's own CSV stream.
///
/// A failed ward fetch skips that body only; the state keeps going.
async fn process_region<F>(
    scraper: &SiteScraper<F>,
    region: &Region,
    states_dir: &Path,
    body_delay: Duration,
    stats: &RunStats,
) -> Result<()>
where
    F: FetchPage,
{
    // Header goes out immediately so an empty state still leaves a valid file.
    let mut out = csv::RegionCsv::create(states_dir, &region.name).await?;
    debug!(file = %out.path().display(), "Opened state output stream");
    let bodies = scraper.list_urban_bodies(region).await?;
    let total = bodies.len();

    for (i, body) in bodies.iter().enumerate() {
        match scraper.list_wards(body).await {
            Ok(wards) if wards.is_empty() => {
                debug!(body = %body.name, "No wards found");
                stats.add_skipped();
                stats.add_urban_body();
            }
            Ok(wards) => {
                let rows: Vec<OutputRow> = wards
                    .iter()
                    .map(|ward| OutputRow::new(ward, body, &region.name))
                    .collect();
                out.append(&rows).await?;
                stats.add_wards(rows.len() as u64);
                stats.add_urban_body();
                debug!(
                    body = %body.name,
                    index = i + 1,
                    total,
                    wards = rows.len(),
                    "Urban body processed"
                );
            }
            Err(e) => {
                warn!(body = %body.name, error = %e, "Urban body fetch failed; skipping");
                stats.add_error();
            }
        }
        if i + 1 < total {
            sleep(body_delay).await;
        }
    }

    stats.add_region();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    impl FetchPage for MapFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.pages.get(url.as_str()).cloned().ok_or(ScrapeError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                url: url.clone(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_region_writes_rows_and_counts() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://civicatlas.in/urban-local-bodies-list-in-goa-state-10".to_string(),
            r#"<table><tbody>
                <tr><td>North Goa district</td>
                    <td><a href="/municipality-panaji-1">Panaji</a></td></tr>
                <tr><td></td><td><a href="/municipality-empty-2">Empty</a></td></tr>
            </tbody></table>"#
                .to_string(),
        );
        pages.insert(
            "https://civicatlas.in/municipality-panaji-1".to_string(),
            r#"<table>
                <tr><th>#</th><th>Ward Name</th><th>Ward No</th><th>LGD Code</th></tr>
                <tr><td>1</td><td>Ward No. 1</td><td>1</td><td>200001</td></tr>
                <tr><td>2</td><td>Ward No. 2</td><td>2</td><td>200002</td></tr>
            </table>"#
                .to_string(),
        );
        pages.insert(
            "https://civicatlas.in/municipality-empty-2".to_string(),
            "<html></html>".to_string(),
        );

        let stats = Arc::new(RunStats::new());
        let scraper = SiteScraper::new(
            Url::parse("https://civicatlas.in/").unwrap(),
            MapFetcher { pages },
            Arc::clone(&stats),
        );
        let region = Region {
            name: "Goa".into(),
            entry_url: Url::parse(
                "https://civicatlas.in/urban-local-bodies-list-in-goa-state-10",
            )
            .unwrap(),
        };
        let dir = tempfile::tempdir().unwrap();

        process_region(&scraper, &region, dir.path(), Duration::from_secs(1), &stats)
            .await
            .unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.regions_processed, 1);
        assert_eq!(snap.urban_bodies_processed, 2);
        assert_eq!(snap.wards_extracted, 2);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.errors, 0);

        let contents = std::fs::read_to_string(dir.path().join("Goa.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,Ward No. 1,Panaji,Municipality,North Goa,Goa,200001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_body_fetch_does_not_abort_region() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://civicatlas.in/urban-local-bodies-list-in-goa-state-10".to_string(),
            r#"<table><tbody>
                <tr><td><a href="/municipality-gone-1">Gone</a></td></tr>
                <tr><td><a href="/municipality-panaji-2">Panaji</a></td></tr>
            </tbody></table>"#
                .to_string(),
        );
        pages.insert(
            "https://civicatlas.in/municipality-panaji-2".to_string(),
            r#"<table>
                <tr><th>Ward Name</th><th>Ward No</th><th>LGD Code</th></tr>
                <tr><td>x</td><td>3</td><td>300003</td></tr>
            </table>"#
                .to_string(),
        );

        let stats = Arc::new(RunStats::new());
        let scraper = SiteScraper::new(
            Url::parse("https://civicatlas.in/").unwrap(),
            MapFetcher { pages },
            Arc::clone(&stats),
        );
        let region = Region {
            name: "Goa".into(),
            entry_url: Url::parse(
                "https://civicatlas.in/urban-local-bodies-list-in-goa-state-10",
            )
            .unwrap(),
        };
        let dir = tempfile::tempdir().unwrap();

        process_region(&scraper, &region, dir.path(), Duration::from_millis(1), &stats)
            .await
            .unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.urban_bodies_processed, 1);
        assert_eq!(snap.wards_extracted, 1);
    }
}
