use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{HeaderSpec, RecordSet};
use tally_import::{ingest_side, reconcile_records, PipelineError, ReconConfig};
use tokio::task::JoinHandle;

use crate::cli::Cli;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

pub const RECONCILED_FILE: &str = "reconciled.csv";
pub const UNMATCHED_FILE: &str = "unmatched.csv";

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub total_rebate: Decimal,
    pub total_net: Decimal,
    pub reconciled_path: PathBuf,
    pub unmatched_path: PathBuf,
}

pub async fn load_config(path: Option<&Path>) -> Result<ReconConfig> {
    match path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config {}", path.display()))?;
            ReconConfig::from_toml(&text)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => ReconConfig::from_toml(DEFAULT_CONFIG).context("loading built-in config"),
    }
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

/// Runs one side's ingestion on the blocking pool.
fn spawn_ingest(
    data: Vec<u8>,
    config: &Arc<ReconConfig>,
    side: fn(&ReconConfig) -> &HeaderSpec,
) -> JoinHandle<Result<RecordSet, PipelineError>> {
    let config = Arc::clone(config);
    tokio::task::spawn_blocking(move || ingest_side(&data, side(&config)))
}

async fn finish_ingest(handle: JoinHandle<Result<RecordSet, PipelineError>>) -> Result<RecordSet> {
    Ok(handle.await.context("ingestion task failed")??)
}

/// Reads both exports, ingests them concurrently and, once both have
/// succeeded, reconciles them and writes the two result files.
pub async fn reconcile(cli: &Cli) -> Result<RunSummary> {
    let config = Arc::new(load_config(cli.config.as_deref()).await?);

    let (file_a, file_b) = tokio::try_join!(read_input(&cli.system_a), read_input(&cli.system_b))?;

    let a_task = spawn_ingest(file_a, &config, |c| &c.system_a);
    let b_task = spawn_ingest(file_b, &config, |c| &c.system_b);
    let (a, b) = tokio::try_join!(finish_ingest(a_task), finish_ingest(b_task))?;

    let report = reconcile_records(a, b, &config);

    tokio::fs::create_dir_all(&cli.out_dir)
        .await
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let reconciled_path = cli.out_dir.join(RECONCILED_FILE);
    let unmatched_path = cli.out_dir.join(UNMATCHED_FILE);

    tokio::fs::write(&reconciled_path, report.matched_csv()?)
        .await
        .with_context(|| format!("writing {}", reconciled_path.display()))?;
    tokio::fs::write(&unmatched_path, report.unmatched_csv()?)
        .await
        .with_context(|| format!("writing {}", unmatched_path.display()))?;

    tracing::info!(
        reconciled = %reconciled_path.display(),
        unmatched = %unmatched_path.display(),
        "results written"
    );

    Ok(RunSummary {
        matched: report.matched.len(),
        unmatched: report.unmatched.len(),
        total_rebate: report.total_rebate(),
        total_net: report.total_net(),
        reconciled_path,
        unmatched_path,
    })
}

pub fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("Reconciled transactions: {}", summary.matched);
    println!("Missing from System B:   {}", summary.unmatched);
    println!("Total rebate:            {}", summary.total_rebate);
    println!("Total net of rebate:     {}", summary.total_net);
    println!("Wrote {}", summary.reconciled_path.display());
    println!("Wrote {}", summary.unmatched_path.display());
    Ok(())
}
