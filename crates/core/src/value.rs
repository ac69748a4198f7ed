use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

/// Fractional seconds are written only when present.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The closed set of column types a header spec can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Decimal => write!(f, "decimal"),
            ColumnType::Timestamp => write!(f, "timestamp"),
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ColumnType::Text),
            "integer" => Ok(ColumnType::Integer),
            "decimal" => Ok(ColumnType::Decimal),
            "timestamp" => Ok(ColumnType::Timestamp),
            other => Err(format!("Unknown column type: '{other}'")),
        }
    }
}

/// A single coerced cell. Values are hashable so an identifier column can be
/// used directly as a join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::Text,
            Value::Integer(_) => ColumnType::Integer,
            Value::Decimal(_) => ColumnType::Decimal,
            Value::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen losslessly.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Integer(n) => Some(Decimal::from(*n)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    #[test]
    fn column_type_from_str_is_case_insensitive() {
        assert_eq!(ColumnType::from_str("Decimal").unwrap(), ColumnType::Decimal);
        assert_eq!(ColumnType::from_str("TIMESTAMP").unwrap(), ColumnType::Timestamp);
        assert!(ColumnType::from_str("float").is_err());
    }

    #[test]
    fn decimal_keys_compare_numerically() {
        let a = Value::Decimal(Decimal::from_str("12.50").unwrap());
        let b = Value::Decimal(Decimal::from_str("12.5").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn integer_widens_to_decimal() {
        assert_eq!(Value::Integer(45).as_decimal(), Some(Decimal::from(45)));
        assert_eq!(Value::from("45").as_decimal(), None);
    }

    #[test]
    fn display_formats() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-03-09 14:05:00");
        assert_eq!(Value::Decimal(Decimal::new(-250, 2)).to_string(), "-2.50");
        assert_eq!(Value::Integer(1001).to_string(), "1001");
    }

    #[test]
    fn timestamp_keeps_fractional_seconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(14, 5, 0, 250)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-03-09 14:05:00.250");
    }
}
