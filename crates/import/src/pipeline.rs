use rust_decimal::Decimal;
use tally_core::{HeaderSpec, ReconciledRecord, RecordSet};
use thiserror::Error;

use crate::config::ReconConfig;
use crate::csv::{decode, read_rows, IngestError, SchemaCoercer};
use crate::export;
use crate::header;
use crate::rebate::RebateEngine;
use crate::reconcile::Reconciler;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{system} file rejected: {source}")]
    Ingest {
        system: String,
        #[source]
        source: IngestError,
    },
    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Output of one reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    /// Joined layout, without the two rebate columns.
    pub matched_columns: Vec<String>,
    pub matched: Vec<ReconciledRecord>,
    /// System A records with no System B counterpart.
    pub unmatched: RecordSet,
}

impl ReconciliationReport {
    pub fn matched_csv(&self) -> Result<Vec<u8>, csv::Error> {
        export::reconciled_csv(&self.matched_columns, &self.matched)
    }

    pub fn unmatched_csv(&self) -> Result<Vec<u8>, csv::Error> {
        export::record_set_csv(&self.unmatched)
    }

    pub fn total_rebate(&self) -> Decimal {
        total(self.matched.iter().filter_map(ReconciledRecord::calculated_rebate))
    }

    pub fn total_net(&self) -> Decimal {
        total(self.matched.iter().filter_map(ReconciledRecord::amount_net_rebate))
    }
}

/// Sums `amounts`, saturating at the decimal range.
fn total(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).unwrap_or_else(|| {
            tracing::warn!(%acc, %amount, "total out of range, saturating");
            acc.saturating_add(amount)
        })
    })
}

/// Locates the header row of one export and coerces it against `spec`.
pub fn ingest(data: &[u8], spec: &HeaderSpec) -> Result<RecordSet, IngestError> {
    let content = decode(data)?;
    let rows = read_rows(content)?;

    let header_row =
        header::locate(&rows, spec).ok_or_else(|| IngestError::HeaderNotFound {
            system: spec.name.clone(),
            expected: spec.mandatory_names().join(", "),
        })?;
    tracing::debug!(spec = %spec.name, header_row, rows = rows.len(), "header row located");

    let set = SchemaCoercer::new(spec).coerce(&rows[header_row..])?;
    tracing::info!(spec = %spec.name, records = set.len(), "file ingested");
    Ok(set)
}

/// Joins two already ingested record sets and prices the matches.
pub fn reconcile_records(
    a: RecordSet,
    b: RecordSet,
    config: &ReconConfig,
) -> ReconciliationReport {
    let reconciliation = Reconciler::new(config.reconcile.clone()).reconcile(a, b);
    let engine = RebateEngine::new(config.rebates.clone(), config.rebate.clone());

    ReconciliationReport {
        matched_columns: reconciliation.columns,
        matched: engine.apply_all(reconciliation.matched),
        unmatched: reconciliation.a_unmatched,
    }
}

/// One complete run. Either file failing ingestion aborts the run before any
/// reconciliation happens.
pub fn run(
    file_a: &[u8],
    file_b: &[u8],
    config: &ReconConfig,
) -> Result<ReconciliationReport, PipelineError> {
    let a = ingest_side(file_a, &config.system_a)?;
    let b = ingest_side(file_b, &config.system_b)?;
    Ok(reconcile_records(a, b, config))
}

/// [`ingest`] with the failure attributed to the system it came from.
pub fn ingest_side(data: &[u8], spec: &HeaderSpec) -> Result<RecordSet, PipelineError> {
    ingest(data, spec).map_err(|source| PipelineError::Ingest {
        system: spec.name.clone(),
        source,
    })
}
