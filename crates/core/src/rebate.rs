use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("rebate rule has an empty token")]
    EmptyToken,
    #[error("rebate rule '{0}' must define exactly one of `rate` or `rates`")]
    AmbiguousRate(String),
    #[error("rebate rule '{token}': rate {rate} is outside [0, 1)")]
    RateOutOfRange { token: String, rate: Decimal },
}

/// How much a matching rule deducts, as a fraction of the subtotal.
#[derive(Debug, Clone, PartialEq)]
pub enum RebateRate {
    /// Applies regardless of country.
    Flat(Decimal),
    /// Keyed by the record's country value. Countries not listed get no rate.
    PerCountry(BTreeMap<String, Decimal>),
}

impl RebateRate {
    pub fn rate_for(&self, country: Option<&str>) -> Option<Decimal> {
        match self {
            RebateRate::Flat(rate) => Some(*rate),
            RebateRate::PerCountry(rates) => country.and_then(|c| rates.get(c)).copied(),
        }
    }

    fn rates(&self) -> Vec<Decimal> {
        match self {
            RebateRate::Flat(rate) => vec![*rate],
            RebateRate::PerCountry(rates) => rates.values().copied().collect(),
        }
    }
}

/// A company-name token and the rate it triggers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRebateRule")]
pub struct RebateRule {
    pub token: String,
    pub rate: RebateRate,
}

#[derive(Deserialize)]
struct RawRebateRule {
    token: String,
    rate: Option<Decimal>,
    rates: Option<BTreeMap<String, Decimal>>,
}

impl TryFrom<RawRebateRule> for RebateRule {
    type Error = RuleError;

    fn try_from(raw: RawRebateRule) -> Result<Self, Self::Error> {
        let rate = match (raw.rate, raw.rates) {
            (Some(rate), None) => RebateRate::Flat(rate),
            (None, Some(rates)) => RebateRate::PerCountry(rates),
            _ => return Err(RuleError::AmbiguousRate(raw.token)),
        };
        RebateRule::new(&raw.token, rate)
    }
}

impl RebateRule {
    pub fn new(token: &str, rate: RebateRate) -> Result<Self, RuleError> {
        if token.is_empty() {
            return Err(RuleError::EmptyToken);
        }
        if let Some(bad) = rate
            .rates()
            .into_iter()
            .find(|r| r.is_sign_negative() || *r >= Decimal::ONE)
        {
            return Err(RuleError::RateOutOfRange {
                token: token.to_string(),
                rate: bad,
            });
        }
        Ok(RebateRule {
            token: token.to_string(),
            rate,
        })
    }

    pub fn flat(token: &str, rate: Decimal) -> Result<Self, RuleError> {
        Self::new(token, RebateRate::Flat(rate))
    }

    pub fn per_country<'a>(
        token: &str,
        rates: impl IntoIterator<Item = (&'a str, Decimal)>,
    ) -> Result<Self, RuleError> {
        let rates = rates
            .into_iter()
            .map(|(country, rate)| (country.to_string(), rate))
            .collect();
        Self::new(token, RebateRate::PerCountry(rates))
    }

    /// Whether the rule's token occurs in an already-normalised company name.
    pub fn matches(&self, company: &str) -> bool {
        company.contains(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[derive(Deserialize)]
    struct Table {
        rebates: Vec<RebateRule>,
    }

    #[test]
    fn per_country_rate_lookup() {
        let rule =
            RebateRule::per_country("jiffylube", [("us", dec("0.04")), ("ca", dec("0.03"))])
                .unwrap();
        assert_eq!(rule.rate.rate_for(Some("us")), Some(dec("0.04")));
        assert_eq!(rule.rate.rate_for(Some("ca")), Some(dec("0.03")));
        assert_eq!(rule.rate.rate_for(Some("mx")), None);
        assert_eq!(rule.rate.rate_for(None), None);
    }

    #[test]
    fn flat_rate_ignores_country() {
        let rule = RebateRule::flat("valvoline", dec("0.05")).unwrap();
        assert_eq!(rule.rate.rate_for(None), Some(dec("0.05")));
        assert_eq!(rule.rate.rate_for(Some("ca")), Some(dec("0.05")));
    }

    #[test]
    fn rate_must_be_below_one() {
        assert!(matches!(
            RebateRule::flat("x", Decimal::ONE),
            Err(RuleError::RateOutOfRange { .. })
        ));
        assert!(matches!(
            RebateRule::flat("x", dec("-0.01")),
            Err(RuleError::RateOutOfRange { .. })
        ));
        assert!(RebateRule::flat("x", Decimal::ZERO).is_ok());
    }

    #[test]
    fn empty_token_rejected() {
        assert_eq!(
            RebateRule::flat("", dec("0.1")).unwrap_err(),
            RuleError::EmptyToken
        );
    }

    #[test]
    fn deserializes_rule_table_in_order() {
        let table: Table = toml::from_str(
            r#"
            [[rebates]]
            token = "valvoline"
            rate = "0.05"

            [[rebates]]
            token = "jiffylube"
            rates = { us = "0.04", ca = "0.03" }
            "#,
        )
        .unwrap();
        assert_eq!(table.rebates[0].token, "valvoline");
        assert_eq!(table.rebates[0].rate, RebateRate::Flat(dec("0.05")));
        assert!(matches!(table.rebates[1].rate, RebateRate::PerCountry(_)));
    }

    #[test]
    fn rule_with_both_rate_forms_rejected() {
        let result: Result<Table, _> = toml::from_str(
            r#"
            [[rebates]]
            token = "valvoline"
            rate = "0.05"
            rates = { us = "0.04" }
            "#,
        );
        assert!(result.is_err());
    }
}
