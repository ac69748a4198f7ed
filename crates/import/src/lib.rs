pub mod config;
pub mod csv;
pub mod export;
pub mod header;
pub mod pipeline;
pub mod rebate;
pub mod reconcile;

pub use crate::csv::{ErrorKind, IngestError, SchemaCoercer};
pub use config::{ConfigError, ReconConfig};
pub use header::locate;
pub use pipeline::{ingest, ingest_side, reconcile_records, run, PipelineError, ReconciliationReport};
pub use rebate::{RebateColumns, RebateEngine};
pub use reconcile::{inner_join_by, JoinColumns, JoinIndex, Reconciliation, Reconciler};
