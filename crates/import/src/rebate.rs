use rust_decimal::Decimal;
use serde::Deserialize;
use tally_core::{Rebate, RebateRule, ReconciledRecord, Value};

/// Where the engine reads its inputs in a reconciled record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RebateColumns {
    pub company: String,
    pub country: String,
    pub subtotal: String,
    pub payable_amount: String,
}

impl Default for RebateColumns {
    fn default() -> Self {
        Self {
            company: "company".to_string(),
            country: "country".to_string(),
            subtotal: "subtotal".to_string(),
            payable_amount: "payableamount".to_string(),
        }
    }
}

pub struct RebateEngine {
    rules: Vec<RebateRule>,
    columns: RebateColumns,
}

impl RebateEngine {
    pub fn new(rules: Vec<RebateRule>, columns: RebateColumns) -> Self {
        Self { rules, columns }
    }

    /// Rate for a normalised company name. Every rule whose token occurs in
    /// the name is visited in table order and the last one that yields a rate
    /// wins. A per-country rule without an entry for `country` leaves the rate
    /// untouched.
    pub fn rate_for(&self, company: &str, country: Option<&str>) -> Decimal {
        let mut rate = Decimal::ZERO;
        for rule in self.rules.iter().filter(|r| r.matches(company)) {
            if let Some(r) = rule.rate.rate_for(country) {
                rate = r;
            }
        }
        rate
    }

    pub fn apply(&self, record: ReconciledRecord) -> ReconciledRecord {
        let company = record
            .get(&self.columns.company)
            .and_then(Value::as_text)
            .unwrap_or_default();
        let country = record.get(&self.columns.country).and_then(Value::as_text);
        let rate = self.rate_for(company, country);

        let subtotal = self.amount(&record, &self.columns.subtotal);
        let payable = self.amount(&record, &self.columns.payable_amount);

        // Amounts beyond the decimal range saturate instead of aborting the run.
        let calculated_rebate = match rate.checked_mul(subtotal) {
            Some(rebate) => -rebate,
            None => {
                tracing::warn!(%rate, %subtotal, "rebate out of range, saturating");
                -rate.saturating_mul(subtotal)
            }
        }
        .normalize();
        let amount_net_rebate = match payable.checked_sub(calculated_rebate) {
            Some(net) => net,
            None => {
                tracing::warn!(%payable, %calculated_rebate, "net amount out of range, saturating");
                payable.saturating_sub(calculated_rebate)
            }
        }
        .normalize();

        record.with_rebate(Rebate {
            rate,
            calculated_rebate,
            amount_net_rebate,
        })
    }

    pub fn apply_all(&self, records: Vec<ReconciledRecord>) -> Vec<ReconciledRecord> {
        records.into_iter().map(|r| self.apply(r)).collect()
    }

    fn amount(&self, record: &ReconciledRecord, column: &str) -> Decimal {
        match record.get(column).and_then(Value::as_decimal) {
            Some(amount) => amount,
            None => {
                tracing::warn!(column, "no numeric value for rebate input, using zero");
                Decimal::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tally_core::TypedRecord;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rules() -> Vec<RebateRule> {
        vec![
            RebateRule::flat("valvoline", dec("0.05")).unwrap(),
            RebateRule::per_country("jiffylube", [("us", dec("0.04")), ("ca", dec("0.03"))])
                .unwrap(),
            RebateRule::flat("take", dec("0.02")).unwrap(),
        ]
    }

    fn engine() -> RebateEngine {
        RebateEngine::new(rules(), RebateColumns::default())
    }

    fn record(company: &str, country: &str, subtotal: &str, payable: &str) -> ReconciledRecord {
        ReconciledRecord::new(TypedRecord::from_fields(vec![
            ("subtotal".to_string(), Value::Decimal(dec(subtotal))),
            ("payableamount".to_string(), Value::Decimal(dec(payable))),
            ("company".to_string(), Value::from(company)),
            ("country".to_string(), Value::from(country)),
        ]))
    }

    #[test]
    fn rebate_is_stored_as_deduction() {
        let engine = RebateEngine::new(
            vec![RebateRule::flat("shop", dec("0.10")).unwrap()],
            RebateColumns::default(),
        );
        let out = engine.apply(record("shop", "us", "100.00", "90.00"));
        assert_eq!(out.calculated_rebate(), Some(dec("-10.00")));
        // Subtracting the negative deduction raises the net amount.
        assert_eq!(out.amount_net_rebate(), Some(dec("100.00")));
    }

    #[test]
    fn country_specific_rates() {
        let e = engine();
        assert_eq!(e.rate_for("jiffylube", Some("us")), dec("0.04"));
        assert_eq!(e.rate_for("jiffylube", Some("ca")), dec("0.03"));
        assert_eq!(e.rate_for("jiffylube", Some("mx")), Decimal::ZERO);
        assert_eq!(e.rate_for("jiffylube", None), Decimal::ZERO);
    }

    #[test]
    fn country_match_is_exact() {
        assert_eq!(engine().rate_for("jiffylube", Some("US")), Decimal::ZERO);
    }

    #[test]
    fn flat_rule_ignores_country() {
        let e = engine();
        assert_eq!(e.rate_for("valvolineexpress", Some("ca")), dec("0.05"));
        assert_eq!(e.rate_for("valvolineexpress", None), dec("0.05"));
    }

    #[test]
    fn last_matching_rule_wins() {
        // Matches both "valvoline" and the later "take" token.
        assert_eq!(engine().rate_for("valvolinetakefive", Some("us")), dec("0.02"));

        let reversed: Vec<_> = rules().into_iter().rev().collect();
        let e = RebateEngine::new(reversed, RebateColumns::default());
        assert_eq!(e.rate_for("valvolinetakefive", Some("us")), dec("0.05"));
    }

    #[test]
    fn unrated_country_keeps_earlier_match() {
        // "jiffylube" comes after "valvoline" but has no rate for "mx".
        assert_eq!(engine().rate_for("valvolinejiffylube", Some("mx")), dec("0.05"));
        assert_eq!(engine().rate_for("valvolinejiffylube", Some("ca")), dec("0.03"));
    }

    #[test]
    fn no_match_means_zero_rebate() {
        let out = engine().apply(record("meineke", "us", "80.00", "75.00"));
        let rebate = out.rebate().unwrap();
        assert_eq!(rebate.rate, Decimal::ZERO);
        assert!(rebate.calculated_rebate.is_zero());
        assert_eq!(rebate.amount_net_rebate, dec("75.00"));
    }

    #[test]
    fn jiffylube_record_uses_us_rate() {
        let out = engine().apply(record("jiffylube", "us", "50.00", "45.00"));
        assert_eq!(out.calculated_rebate(), Some(dec("-2.00")));
        assert_eq!(out.amount_net_rebate(), Some(dec("47.00")));
    }

    #[test]
    fn missing_amounts_count_as_zero() {
        let rec = ReconciledRecord::new(TypedRecord::from_fields(vec![(
            "company".to_string(),
            Value::from("valvoline"),
        )]));
        let out = engine().apply(rec);
        assert!(out.calculated_rebate().unwrap().is_zero());
        assert!(out.amount_net_rebate().unwrap().is_zero());
    }

    #[test]
    fn extreme_amounts_saturate_instead_of_panicking() {
        let out = engine().apply(ReconciledRecord::new(TypedRecord::from_fields(vec![
            ("subtotal".to_string(), Value::Decimal(Decimal::MAX)),
            ("payableamount".to_string(), Value::Decimal(Decimal::MAX)),
            ("company".to_string(), Value::from("valvoline")),
            ("country".to_string(), Value::from("us")),
        ])));
        let rebate = out.rebate().unwrap();
        assert!(rebate.calculated_rebate < Decimal::ZERO);
        assert_eq!(rebate.amount_net_rebate, Decimal::MAX);
    }

    #[test]
    fn large_negative_payable_saturates_low() {
        let out = engine().apply(ReconciledRecord::new(TypedRecord::from_fields(vec![
            ("subtotal".to_string(), Value::Decimal(Decimal::MIN)),
            ("payableamount".to_string(), Value::Decimal(Decimal::MIN)),
            ("company".to_string(), Value::from("valvoline")),
        ])));
        assert_eq!(out.amount_net_rebate(), Some(Decimal::MIN));
    }
}
