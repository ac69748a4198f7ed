use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::{
    canonical_column, strip_bom, ColumnSpec, ColumnType, HeaderSpec, RawRow, RecordSet,
    TypedRecord, Value,
};
use thiserror::Error;

/// Cell contents treated as "no value" in addition to blank cells.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// The three failure classes a file can hit during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFile,
    ParseError,
    TypeConversionError,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid {system} file: no row contains the mandatory columns ({expected})")]
    HeaderNotFound { system: String, expected: String },
    #[error("Invalid file: header row {row} is past the end of the file ({rows} rows)")]
    HeaderOutOfRange { row: usize, rows: usize },
    #[error("Invalid file: missing required column: {0}")]
    MissingColumn(String),
    #[error("Error parsing CSV file: {0}")]
    Csv(#[from] csv::Error),
    #[error("Error parsing CSV file: not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("Error parsing CSV file: EOF inside quoted field opened on line {line}")]
    UnterminatedQuote { line: u64 },
    #[error("Error parsing CSV file: line {line} has {found} fields, header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("Error converting column {column} to {expected}: {value:?} on line {line}")]
    TypeConversion {
        column: String,
        expected: ColumnType,
        value: String,
        line: u64,
    },
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::HeaderNotFound { .. }
            | IngestError::HeaderOutOfRange { .. }
            | IngestError::MissingColumn(_) => ErrorKind::InvalidFile,
            IngestError::Csv(_)
            | IngestError::Encoding(_)
            | IngestError::UnterminatedQuote { .. }
            | IngestError::RaggedRow { .. } => ErrorKind::ParseError,
            IngestError::TypeConversion { .. } => ErrorKind::TypeConversionError,
        }
    }

    /// The column at fault, when the error is tied to one.
    pub fn column(&self) -> Option<&str> {
        match self {
            IngestError::MissingColumn(column) | IngestError::TypeConversion { column, .. } => {
                Some(column)
            }
            _ => None,
        }
    }
}

/// Decodes file bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode(data: &[u8]) -> Result<&str, IngestError> {
    let text = std::str::from_utf8(data)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Splits delimited text into raw rows. Rows may have differing lengths and
/// byte-order marks are removed from every cell.
pub fn read_rows(content: &str) -> Result<Vec<RawRow>, IngestError> {
    if let Some(line) = unterminated_quote(content) {
        return Err(IngestError::UnterminatedQuote { line });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push(RawRow::new(line, record.iter().map(strip_bom).collect()));
    }
    Ok(rows)
}

#[derive(Clone, Copy)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Line on which a quoted field opens without ever being closed. The csv
/// reader accepts such input and folds the rest of the file into one field.
fn unterminated_quote(content: &str) -> Option<u64> {
    use QuoteState::*;

    let mut state = FieldStart;
    let mut line = 1;
    let mut opened_on = 1;
    for b in content.bytes() {
        state = match (state, b) {
            (Quoted, b'"') => QuoteInQuoted,
            (Quoted, _) => Quoted,
            (QuoteInQuoted, b'"') => Quoted,
            (FieldStart, b'"') => {
                opened_on = line;
                Quoted
            }
            (_, b',' | b'\n' | b'\r') => FieldStart,
            (_, _) => Unquoted,
        };
        if b == b'\n' {
            line += 1;
        }
    }
    matches!(state, Quoted).then_some(opened_on)
}

/// Parses `content` from `header_row` onwards into records restricted to the
/// mandatory columns of `spec`.
pub fn parse(
    content: &str,
    header_row: usize,
    spec: &HeaderSpec,
) -> Result<RecordSet, IngestError> {
    let rows = read_rows(content)?;
    if header_row >= rows.len() {
        return Err(IngestError::HeaderOutOfRange {
            row: header_row,
            rows: rows.len(),
        });
    }
    SchemaCoercer::new(spec).coerce(&rows[header_row..])
}

pub struct SchemaCoercer<'a> {
    spec: &'a HeaderSpec,
}

impl<'a> SchemaCoercer<'a> {
    pub fn new(spec: &'a HeaderSpec) -> Self {
        Self { spec }
    }

    /// `rows[0]` is the header line, the rest are data lines.
    pub fn coerce(&self, rows: &[RawRow]) -> Result<RecordSet, IngestError> {
        let Some((header, data)) = rows.split_first() else {
            return Err(IngestError::HeaderOutOfRange { row: 0, rows: 0 });
        };

        let retained: Vec<(usize, String)> = header
            .cells
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_placeholder(name))
            .map(|(idx, name)| (idx, canonical_column(name)))
            .collect();
        tracing::debug!(
            spec = %self.spec.name,
            line = header.line,
            columns = retained.len(),
            discarded = header.cells.len() - retained.len(),
            "header row decoded"
        );

        let mut kept = Vec::with_capacity(data.len());
        for row in data {
            if row.cells.len() > header.cells.len() {
                return Err(IngestError::RaggedRow {
                    line: row.line,
                    expected: header.cells.len(),
                    found: row.cells.len(),
                });
            }
            let complete = retained
                .iter()
                .all(|(idx, _)| row.cells.get(*idx).is_some_and(|c| !is_missing(c)));
            if complete {
                kept.push(row);
            }
        }
        if kept.len() < data.len() {
            tracing::debug!(
                spec = %self.spec.name,
                dropped = data.len() - kept.len(),
                "dropped rows with missing values"
            );
        }

        let columns = self.project(&retained)?;

        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(columns.len()); kept.len()];
        for (col, idx) in &columns {
            for (row, out) in kept.iter().zip(values.iter_mut()) {
                let raw = &row.cells[*idx];
                let value = coerce_cell(raw, col.column_type).ok_or_else(|| {
                    IngestError::TypeConversion {
                        column: col.name.clone(),
                        expected: col.column_type,
                        value: raw.clone(),
                        line: row.line,
                    }
                })?;
                out.push(value);
            }
        }

        let names: Vec<String> = columns.iter().map(|(col, _)| col.name.clone()).collect();
        let records = values
            .into_iter()
            .map(|row| TypedRecord::from_fields(names.iter().cloned().zip(row).collect()))
            .collect();
        Ok(RecordSet::new(names, records))
    }

    /// Maps each mandatory spec column to its position in the file.
    fn project(
        &self,
        retained: &[(usize, String)],
    ) -> Result<Vec<(&'a ColumnSpec, usize)>, IngestError> {
        let spec: &'a HeaderSpec = self.spec;
        let mut columns = Vec::new();
        for col in spec.mandatory() {
            let mut hits = retained.iter().filter(|(_, name)| *name == col.name);
            let (idx, _) = hits
                .next()
                .ok_or_else(|| IngestError::MissingColumn(col.name.clone()))?;
            if hits.next().is_some() {
                tracing::warn!(column = %col.name, "column appears more than once, using the first");
            }
            columns.push((col, *idx));
        }
        Ok(columns)
    }
}

/// Empty or auto-generated header cells.
fn is_placeholder(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.starts_with("unnamed") || name.starts_with("Unnamed")
}

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}

pub fn coerce_cell(raw: &str, column_type: ColumnType) -> Option<Value> {
    match column_type {
        ColumnType::Text => Some(Value::Text(raw.to_string())),
        ColumnType::Integer => raw.trim().parse::<i64>().ok().map(Value::Integer),
        ColumnType::Decimal => parse_decimal(raw).map(Value::Decimal),
        ColumnType::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for fmt in &[
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }

    for fmt in &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %I:%M %p",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }

    for fmt in &[
        "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%b %d, %Y",
        "%B %d, %Y", "%d %b %Y", "%Y%m%d",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}
