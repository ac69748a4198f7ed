use serde::Deserialize;
use thiserror::Error;

use crate::canonical::{canonical_column, canonical_header};
use crate::value::ColumnType;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

fn default_mandatory() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.to_string(),
            column_type,
            mandatory: true,
        }
    }

    pub fn optional(name: &str, column_type: ColumnType) -> Self {
        ColumnSpec {
            mandatory: false,
            ..ColumnSpec::new(name, column_type)
        }
    }
}

/// Expected layout of one system's export. Column order is significant: it
/// is the order of fields in every record parsed against this spec.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeaderSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpecError {
    #[error("{spec}: no mandatory columns declared")]
    NoMandatoryColumns { spec: String },
    #[error("{spec}: column name '{column}' is not canonical (expected '{expected}')")]
    NonCanonicalName {
        spec: String,
        column: String,
        expected: String,
    },
    #[error("{spec}: column '{column}' declared twice")]
    DuplicateColumn { spec: String, column: String },
}

impl HeaderSpec {
    pub fn new(name: &str, columns: Vec<ColumnSpec>) -> Self {
        HeaderSpec {
            name: name.to_string(),
            columns,
        }
    }

    pub fn mandatory(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.mandatory)
    }

    /// Mandatory column names in declaration order.
    pub fn mandatory_names(&self) -> Vec<String> {
        self.mandatory().map(|c| c.name.clone()).collect()
    }

    /// Mandatory names reduced to letters only, as they must appear in the
    /// header row after canonicalisation.
    pub fn header_tokens(&self) -> Vec<String> {
        self.mandatory().map(|c| canonical_header(&c.name)).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.mandatory().next().is_none() {
            return Err(SpecError::NoMandatoryColumns {
                spec: self.name.clone(),
            });
        }
        for (i, col) in self.columns.iter().enumerate() {
            let expected = canonical_column(&col.name);
            if expected.is_empty() || expected != col.name {
                return Err(SpecError::NonCanonicalName {
                    spec: self.name.clone(),
                    column: col.name.clone(),
                    expected,
                });
            }
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(SpecError::DuplicateColumn {
                    spec: self.name.clone(),
                    column: col.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> HeaderSpec {
        HeaderSpec::new(
            "System A",
            vec![
                ColumnSpec::new("roid", ColumnType::Integer),
                ColumnSpec::optional("notes", ColumnType::Text),
                ColumnSpec::new("subtotal", ColumnType::Decimal),
            ],
        )
    }

    #[test]
    fn mandatory_names_skip_optional_columns() {
        assert_eq!(spec().mandatory_names(), vec!["roid", "subtotal"]);
    }

    #[test]
    fn valid_spec_passes() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn non_canonical_name_rejected() {
        let mut s = spec();
        s.columns.push(ColumnSpec::new("Payable Amount", ColumnType::Decimal));
        assert!(matches!(
            s.validate(),
            Err(SpecError::NonCanonicalName { expected, .. }) if expected == "payableamount"
        ));
    }

    #[test]
    fn spec_without_mandatory_columns_rejected() {
        let s = HeaderSpec::new("empty", vec![ColumnSpec::optional("notes", ColumnType::Text)]);
        assert!(matches!(s.validate(), Err(SpecError::NoMandatoryColumns { .. })));
    }

    #[test]
    fn duplicate_column_rejected() {
        let mut s = spec();
        s.columns.push(ColumnSpec::new("roid", ColumnType::Text));
        assert!(matches!(s.validate(), Err(SpecError::DuplicateColumn { .. })));
    }

    #[test]
    fn deserializes_from_toml_with_default_mandatory() {
        let s: HeaderSpec = toml::from_str(
            r#"
            name = "System B"
            [[columns]]
            name = "aiorderid"
            type = "integer"
            [[columns]]
            name = "shopname"
            type = "text"
            mandatory = false
            "#,
        )
        .unwrap();
        assert_eq!(s.columns.len(), 2);
        assert!(s.columns[0].mandatory);
        assert!(!s.columns[1].mandatory);
        assert_eq!(s.columns[0].column_type, ColumnType::Integer);
    }
}
