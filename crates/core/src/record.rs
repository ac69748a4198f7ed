use rust_decimal::Decimal;

use crate::value::Value;

pub const CALCULATED_REBATE: &str = "calculatedrebate";
pub const AMOUNT_NET_REBATE: &str = "amountnetrebate";

/// One physical line of an export, untyped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file.
    pub line: u64,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        RawRow { line, cells }
    }
}

/// Ordered column name → value mapping produced by schema coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedRecord {
    fields: Vec<(String, Value)>,
}

impl TypedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<(String, Value)>) -> Self {
        TypedRecord { fields }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replaces the value of an existing column, or appends a new one.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cell text for each of `columns`, in that order. Absent columns render
    /// as empty cells.
    pub fn to_row(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.get(c).map(Value::to_string).unwrap_or_default())
            .collect()
    }
}

/// A sequence of records that all share one column layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<TypedRecord>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>, records: Vec<TypedRecord>) -> Self {
        RecordSet { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypedRecord> {
        self.records.iter()
    }

    /// Appends a column to the layout and sets it on every record.
    pub fn alias_column(&mut self, from: &str, to: &str) {
        if !self.columns.iter().any(|c| c == to) {
            self.columns.push(to.to_string());
        }
        for record in &mut self.records {
            if let Some(value) = record.get(from).cloned() {
                record.set(to, value);
            }
        }
    }
}

/// The rebate figures attached to a reconciled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebate {
    pub rate: Decimal,
    /// Stored as a deduction, so never positive.
    pub calculated_rebate: Decimal,
    pub amount_net_rebate: Decimal,
}

/// One System A record joined with one System B record.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub record: TypedRecord,
    rebate: Option<Rebate>,
}

impl ReconciledRecord {
    pub fn new(record: TypedRecord) -> Self {
        ReconciledRecord {
            record,
            rebate: None,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.record.get(column)
    }

    pub fn rebate(&self) -> Option<&Rebate> {
        self.rebate.as_ref()
    }

    pub fn with_rebate(self, rebate: Rebate) -> Self {
        ReconciledRecord {
            rebate: Some(rebate),
            ..self
        }
    }

    pub fn calculated_rebate(&self) -> Option<Decimal> {
        self.rebate.map(|r| r.calculated_rebate)
    }

    pub fn amount_net_rebate(&self) -> Option<Decimal> {
        self.rebate.map(|r| r.amount_net_rebate)
    }

    /// Cells for `columns` followed by the two rebate columns.
    pub fn to_row(&self, columns: &[String]) -> Vec<String> {
        let mut row = self.record.to_row(columns);
        row.push(
            self.calculated_rebate()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        row.push(
            self.amount_net_rebate()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        row
    }
}
