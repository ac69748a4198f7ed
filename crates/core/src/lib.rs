pub mod canonical;
pub mod rebate;
pub mod record;
pub mod schema;
pub mod value;

pub use canonical::{canonical_column, canonical_header, normalize_company, strip_bom};
pub use rebate::{RebateRate, RebateRule, RuleError};
pub use record::{
    RawRow, Rebate, ReconciledRecord, RecordSet, TypedRecord, AMOUNT_NET_REBATE, CALCULATED_REBATE,
};
pub use schema::{ColumnSpec, HeaderSpec, SpecError};
pub use value::{ColumnType, Value};
