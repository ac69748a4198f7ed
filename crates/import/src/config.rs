use serde::Deserialize;
use std::str::FromStr;
use tally_core::{ColumnSpec, HeaderSpec, RebateRule, SpecError};
use thiserror::Error;

use crate::rebate::RebateColumns;
use crate::reconcile::JoinColumns;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid header spec: {0}")]
    Spec(#[from] SpecError),
    #[error("{spec}: join column '{column}' is not a mandatory column")]
    UnknownJoinColumn { spec: String, column: String },
    #[error("join key types differ: {a_column} is {a_type}, {b_column} is {b_type}")]
    KeyTypeMismatch {
        a_column: String,
        a_type: String,
        b_column: String,
        b_type: String,
    },
    #[error("rebate input column '{0}' is not a mandatory column of either system")]
    UnknownRebateColumn(String),
}

/// Everything one reconciliation run needs besides the two files.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub system_a: HeaderSpec,
    pub system_b: HeaderSpec,
    #[serde(default)]
    pub reconcile: JoinColumns,
    #[serde(default)]
    pub rebate: RebateColumns,
    /// Evaluated in file order.
    #[serde(default)]
    pub rebates: Vec<RebateRule>,
}

impl FromStr for ReconConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(s)
    }
}

impl ReconConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ReconConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.system_a.validate()?;
        self.system_b.validate()?;

        let join = &self.reconcile;
        let a_key = mandatory(&self.system_a, &join.key)?;
        let b_key = mandatory(&self.system_b, &join.b_key_source)?;
        if a_key.column_type != b_key.column_type {
            return Err(ConfigError::KeyTypeMismatch {
                a_column: a_key.name.clone(),
                a_type: a_key.column_type.to_string(),
                b_column: b_key.name.clone(),
                b_type: b_key.column_type.to_string(),
            });
        }
        mandatory(&self.system_b, &join.company)?;

        let r = &self.rebate;
        for column in [&r.company, &r.country, &r.subtotal, &r.payable_amount] {
            let known = [&self.system_a, &self.system_b]
                .iter()
                .any(|spec| spec.mandatory().any(|c| &c.name == column));
            if !known {
                return Err(ConfigError::UnknownRebateColumn(column.clone()));
            }
        }
        Ok(())
    }
}

fn mandatory<'a>(spec: &'a HeaderSpec, column: &str) -> Result<&'a ColumnSpec, ConfigError> {
    spec.mandatory()
        .find(|c| c.name == column)
        .ok_or_else(|| ConfigError::UnknownJoinColumn {
            spec: spec.name.clone(),
            column: column.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tally_core::{ColumnType, RebateRate};

    pub(crate) const SAMPLE: &str = r#"
        [system_a]
        name = "Auto Integrate"

        [[system_a.columns]]
        name = "roid"
        type = "integer"

        [[system_a.columns]]
        name = "subtotal"
        type = "decimal"

        [[system_a.columns]]
        name = "payableamount"
        type = "decimal"

        [[system_a.columns]]
        name = "notes"
        type = "text"
        mandatory = false

        [system_b]
        name = "CarAdvise"

        [[system_b.columns]]
        name = "aiorderid"
        type = "integer"

        [[system_b.columns]]
        name = "company"
        type = "text"

        [[system_b.columns]]
        name = "country"
        type = "text"

        [[rebates]]
        token = "valvoline"
        rate = "0.05"

        [[rebates]]
        token = "jiffylube"
        rates = { us = "0.04", ca = "0.03" }
    "#;

    #[test]
    fn sample_config_loads_with_defaults() {
        let config: ReconConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.system_a.mandatory_names(), vec!["roid", "subtotal", "payableamount"]);
        assert_eq!(config.system_b.columns[0].column_type, ColumnType::Integer);
        assert_eq!(config.reconcile, JoinColumns::default());
        assert_eq!(config.rebate, RebateColumns::default());
        assert_eq!(config.rebates.len(), 2);
        assert_eq!(config.rebates[0].rate, RebateRate::Flat(Decimal::new(5, 2)));
    }

    #[test]
    fn key_type_mismatch_rejected() {
        let toml = SAMPLE.replacen(
            "name = \"aiorderid\"\n        type = \"integer\"",
            "name = \"aiorderid\"\n        type = \"text\"",
            1,
        );
        assert!(matches!(
            ReconConfig::from_toml(&toml),
            Err(ConfigError::KeyTypeMismatch { .. })
        ));
    }

    #[test]
    fn unknown_join_column_rejected() {
        let toml = format!("{SAMPLE}\n[reconcile]\nkey = \"orderid\"\n");
        assert!(matches!(
            ReconConfig::from_toml(&toml),
            Err(ConfigError::UnknownJoinColumn { column, .. }) if column == "orderid"
        ));
    }

    #[test]
    fn unknown_rebate_column_rejected() {
        let toml = format!("{SAMPLE}\n[rebate]\nsubtotal = \"gross\"\n");
        assert!(matches!(
            ReconConfig::from_toml(&toml),
            Err(ConfigError::UnknownRebateColumn(c)) if c == "gross"
        ));
    }

    #[test]
    fn invalid_rule_is_a_parse_error() {
        let toml = format!("{SAMPLE}\n[[rebates]]\ntoken = \"x\"\nrate = \"2\"\n");
        assert!(matches!(ReconConfig::from_toml(&toml), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn non_canonical_column_rejected() {
        let toml = SAMPLE.replacen("name = \"subtotal\"", "name = \"Sub Total\"", 1);
        assert!(matches!(ReconConfig::from_toml(&toml), Err(ConfigError::Spec(_))));
    }
}
