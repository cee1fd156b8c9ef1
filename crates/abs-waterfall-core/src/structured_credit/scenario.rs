//! Scenario assumptions fed to the waterfall engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::deal::DealTemplate;
use crate::error::WaterfallError;
use crate::types::{Bps, Pct};
use crate::WaterfallResult;

/// Fees and spread adjustments are capped at 100% a year.
const MAX_BPS: Bps = dec!(10_000);

/// Purchase prices are percent of par.
const MAX_PURCHASE_PRICE: Pct = dec!(1_000);

/// Stress assumptions for a single waterfall run.
///
/// Rates are annualized percents, fees and adjustments are basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    /// Constant prepayment rate, annual percent.
    pub cpr: Pct,
    /// Constant default rate, annual percent.
    pub cdr: Pct,
    /// Recovery on defaulted balance, percent (severity = 100 - recovery).
    pub recovery: Pct,
    pub projection_months: u32,
    /// Floating-rate index, percent. Held flat for the whole projection.
    pub base_rate: Pct,
    pub excess_spread_adj_bps: Bps,
    pub servicing_fee_bps: Bps,
    pub other_fees_bps: Bps,
    /// Share of excess spread released to the residual while pro-rata.
    pub equity_share_pct: Pct,
    /// Purchase price per tranche name, percent of par. Missing means par.
    pub purchase_prices: BTreeMap<String, Pct>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        ScenarioParams {
            cpr: dec!(15),
            cdr: dec!(5),
            recovery: dec!(45),
            projection_months: 60,
            base_rate: dec!(4.30),
            excess_spread_adj_bps: Decimal::ZERO,
            servicing_fee_bps: Decimal::ZERO,
            other_fees_bps: Decimal::ZERO,
            equity_share_pct: dec!(50),
            purchase_prices: BTreeMap::new(),
        }
    }
}

impl ScenarioParams {
    pub fn with_cdr(&self, cdr: Pct) -> Self {
        ScenarioParams {
            cdr,
            ..self.clone()
        }
    }

    /// Purchase price for a tranche, percent of par (100 when unset).
    pub fn purchase_price(&self, tranche_name: &str) -> Pct {
        self.purchase_prices
            .get(tranche_name)
            .copied()
            .unwrap_or(Decimal::ONE_HUNDRED)
    }

    /// Collateral yield net of fees, percent, floored at zero.
    pub fn effective_yield(&self, wac: Pct) -> Pct {
        let hundred = Decimal::ONE_HUNDRED;
        let y = wac + self.excess_spread_adj_bps / hundred
            - self.servicing_fee_bps / hundred
            - self.other_fees_bps / hundred;
        y.max(Decimal::ZERO)
    }

    pub fn validate(&self, template: &DealTemplate) -> WaterfallResult<()> {
        check_pct("cpr", self.cpr)?;
        check_pct("cdr", self.cdr)?;
        check_pct("recovery", self.recovery)?;
        check_pct("equity_share_pct", self.equity_share_pct)?;
        check_range("base_rate", self.base_rate, -Decimal::ONE_HUNDRED, Decimal::ONE_HUNDRED)?;
        check_range("excess_spread_adj_bps", self.excess_spread_adj_bps, -MAX_BPS, MAX_BPS)?;
        check_range("servicing_fee_bps", self.servicing_fee_bps, Decimal::ZERO, MAX_BPS)?;
        check_range("other_fees_bps", self.other_fees_bps, Decimal::ZERO, MAX_BPS)?;

        if self.projection_months == 0 {
            return Err(WaterfallError::InvalidInput {
                field: "projection_months".into(),
                reason: "Must project at least one month".into(),
            });
        }

        for (name, price) in &self.purchase_prices {
            if !template.tranches.iter().any(|t| &t.name == name) {
                return Err(WaterfallError::InvalidInput {
                    field: format!("purchase_prices[{name}]"),
                    reason: format!("No tranche named '{name}' in template {}", template.id),
                });
            }
            check_range(
                &format!("purchase_prices[{name}]"),
                *price,
                Decimal::ZERO,
                MAX_PURCHASE_PRICE,
            )?;
        }

        Ok(())
    }
}

fn check_pct(field: &str, value: Pct) -> WaterfallResult<()> {
    check_range(field, value, Decimal::ZERO, Decimal::ONE_HUNDRED)
}

fn check_range(field: &str, value: Decimal, min: Decimal, max: Decimal) -> WaterfallResult<()> {
    if value < min || value > max {
        return Err(WaterfallError::InvalidInput {
            field: field.into(),
            reason: format!("Must be within [{min}, {max}], got {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_credit::templates::subprime_auto;

    #[test]
    fn test_purchase_price_defaults_to_par() {
        let mut s = ScenarioParams::default();
        assert_eq!(s.purchase_price("Class A"), dec!(100));
        s.purchase_prices.insert("Class A".into(), dec!(98.5));
        assert_eq!(s.purchase_price("Class A"), dec!(98.5));
    }

    #[test]
    fn test_effective_yield_floors_at_zero() {
        let mut s = ScenarioParams::default();
        s.servicing_fee_bps = dec!(300);
        s.other_fees_bps = dec!(50);
        s.excess_spread_adj_bps = dec!(-25);
        assert_eq!(s.effective_yield(dec!(18.5)), dec!(14.75));
        assert_eq!(s.effective_yield(dec!(2)), Decimal::ZERO);
    }

    #[test]
    fn test_validate_ranges() {
        let template = subprime_auto();
        let mut s = ScenarioParams::default();
        assert!(s.validate(&template).is_ok());

        s.cdr = dec!(-1);
        assert!(s.validate(&template).is_err());
        s.cdr = dec!(101);
        assert!(s.validate(&template).is_err());
        s.cdr = dec!(5);

        s.projection_months = 0;
        assert!(s.validate(&template).is_err());
    }

    #[test]
    fn test_validate_bounds_rates_and_fees() {
        let template = subprime_auto();

        let mut s = ScenarioParams::default();
        s.base_rate = dec!(1_000_000_000_000_000_000_000_000_000);
        assert!(s.validate(&template).unwrap_err().to_string().contains("base_rate"));

        let mut s = ScenarioParams::default();
        s.base_rate = dec!(-0.5);
        assert!(s.validate(&template).is_ok());

        let mut s = ScenarioParams::default();
        s.servicing_fee_bps = dec!(-1);
        assert!(s.validate(&template).is_err());

        let mut s = ScenarioParams::default();
        s.excess_spread_adj_bps = dec!(10_001);
        assert!(s.validate(&template).is_err());

        let mut s = ScenarioParams::default();
        s.purchase_prices.insert("Class A".into(), Decimal::MAX);
        assert!(s.validate(&template).is_err());
    }

    #[test]
    fn test_validate_unknown_purchase_price_tranche() {
        let template = subprime_auto();
        let mut s = ScenarioParams::default();
        s.purchase_prices.insert("Class Z".into(), dec!(99));
        let err = s.validate(&template).unwrap_err();
        assert!(err.to_string().contains("Class Z"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: ScenarioParams = serde_json::from_str(r#"{"cdr": 12}"#).unwrap();
        assert_eq!(s.cdr, dec!(12));
        assert_eq!(s.cpr, dec!(15));
        assert!(s.purchase_prices.is_empty());
    }

    #[test]
    fn test_with_cdr_keeps_everything_else() {
        let base = ScenarioParams::default();
        let stressed = base.with_cdr(dec!(20));
        assert_eq!(stressed.cdr, dec!(20));
        assert_eq!(stressed.cpr, base.cpr);
        assert_eq!(stressed.recovery, base.recovery);
    }
}
