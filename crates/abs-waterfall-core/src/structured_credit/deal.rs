//! Deal structure: collateral pool, tranche stack and trigger set.
//!
//! Tranche order is payment priority: index 0 is the most senior note. The
//! `NR` tranche is the residual (equity) piece and is paid last for principal.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::WaterfallError;
use crate::types::{Bps, Money, Pct};
use crate::WaterfallResult;

/// Longest pool the engine will project (fifty years).
pub const MAX_WAM_MONTHS: Decimal = dec!(600);

/// Largest pool or tranche balance accepted, in millions.
pub const MAX_BALANCE: Money = dec!(1_000_000_000);

/// Widest tranche spread accepted (100%).
pub const MAX_SPREAD_BPS: Bps = dec!(10_000);

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Collateral archetype of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    AutoAbs,
    ConsumerAbs,
    EquipmentAbs,
    Clo,
}

impl AssetClass {
    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::AutoAbs => "Auto ABS",
            AssetClass::ConsumerAbs => "Consumer ABS",
            AssetClass::EquipmentAbs => "Equipment ABS",
            AssetClass::Clo => "CLO",
        }
    }
}

/// Rating label of a tranche. `NR` marks the residual piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    AAA,
    AA,
    A,
    BBB,
    BB,
    B,
    NR,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::AAA => "AAA",
            Rating::AA => "AA",
            Rating::A => "A",
            Rating::BBB => "BBB",
            Rating::BB => "BB",
            Rating::B => "B",
            Rating::NR => "NR",
        }
    }

    /// Hex colour used when charting the capital stack.
    pub fn display_color(&self) -> &'static str {
        match self {
            Rating::AAA => "#1b5e20",
            Rating::AA => "#2e7d32",
            Rating::A => "#558b2f",
            Rating::BBB => "#f9a825",
            Rating::BB => "#ef6c00",
            Rating::B => "#d84315",
            Rating::NR => "#6a1b9a",
        }
    }

    pub fn is_equity(&self) -> bool {
        matches!(self, Rating::NR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Fixed,
    Floating,
}

/// Kind of structural test. Only OC, CNL and ARD influence the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Overcollateralization: collateral / rated notes, in percent.
    #[serde(rename = "OC")]
    Oc,
    /// Interest coverage: collateral interest / rated interest due, in percent.
    #[serde(rename = "IC")]
    Ic,
    /// Cumulative net loss as a percent of the original pool.
    #[serde(rename = "CNL")]
    Cnl,
    /// Accelerated redemption date, threshold is a month number.
    #[serde(rename = "ARD")]
    Ard,
    /// Informational date or level (e.g. a non-call date).
    #[serde(rename = "INFO")]
    Info,
}

impl TriggerKind {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::Oc => "OC",
            TriggerKind::Ic => "IC",
            TriggerKind::Cnl => "CNL",
            TriggerKind::Ard => "ARD",
            TriggerKind::Info => "INFO",
        }
    }

    pub fn drives_payment_mode(&self) -> bool {
        match self {
            TriggerKind::Oc | TriggerKind::Cnl | TriggerKind::Ard => true,
            TriggerKind::Ic | TriggerKind::Info => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Structure types
// ---------------------------------------------------------------------------

/// The collateral pool backing the notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralPool {
    /// Current pool balance.
    pub balance: Money,
    /// Weighted-average coupon, percent.
    pub wac: Pct,
    /// Weighted-average maturity in months.
    pub wam_months: Decimal,
}

/// A single tranche in the capital structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheSpec {
    /// Class name (e.g. "Class A", "Residual").
    pub name: String,
    /// Original balance at closing.
    pub balance: Money,
    pub coupon_type: CouponType,
    /// Spread over the base rate in basis points. Zero for the residual.
    pub spread_bps: Bps,
    pub rating: Rating,
    /// Static subordination at closing: junior balance / pool, percent.
    pub subordination_pct: Pct,
}

impl TrancheSpec {
    pub fn is_equity(&self) -> bool {
        self.rating.is_equity()
    }

    /// Whether the tranche receives a coupon in the interest waterfall.
    pub fn is_interest_bearing(&self) -> bool {
        !self.is_equity() && self.spread_bps > Decimal::ZERO
    }

    /// Annual coupon in percent for a given base rate (percent).
    pub fn coupon_pct(&self, base_rate: Pct) -> Pct {
        base_rate + self.spread_bps / Decimal::ONE_HUNDRED
    }
}

/// A structural trigger test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub name: String,
    pub kind: TriggerKind,
    /// Percent for OC/IC/CNL, month number for ARD, free-form for INFO.
    pub threshold: Decimal,
    /// What happens on breach, for display.
    pub consequence: String,
}

impl TriggerSpec {
    /// Threshold check shared by all trigger kinds.
    ///
    /// The observation is OC% or IC% for coverage tests, CNL% for loss
    /// tests and the period number for ARD. INFO triggers never breach.
    pub fn is_breached(&self, observation: Decimal) -> bool {
        match self.kind {
            TriggerKind::Oc | TriggerKind::Ic => observation < self.threshold,
            TriggerKind::Cnl => observation > self.threshold,
            TriggerKind::Ard => observation > self.threshold,
            TriggerKind::Info => false,
        }
    }
}

/// A complete deal template: pool, tranches in priority order, triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealTemplate {
    pub id: String,
    pub name: String,
    pub asset_class: AssetClass,
    pub collateral: CollateralPool,
    pub tranches: Vec<TrancheSpec>,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

impl DealTemplate {
    /// Parse and validate a template from JSON.
    pub fn from_json(json: &str) -> WaterfallResult<Self> {
        let template: DealTemplate = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> WaterfallResult<()> {
        if self.tranches.is_empty() {
            return Err(WaterfallError::InvalidInput {
                field: "tranches".into(),
                reason: "At least one tranche is required".into(),
            });
        }
        if self.collateral.balance <= Decimal::ZERO {
            return Err(WaterfallError::InvalidInput {
                field: "collateral.balance".into(),
                reason: "Collateral balance must be positive".into(),
            });
        }
        if self.collateral.balance > MAX_BALANCE {
            return Err(WaterfallError::InvalidInput {
                field: "collateral.balance".into(),
                reason: format!("Collateral balance cannot exceed {MAX_BALANCE}"),
            });
        }
        if self.collateral.wam_months <= Decimal::ZERO {
            return Err(WaterfallError::InvalidInput {
                field: "collateral.wam_months".into(),
                reason: "WAM must be positive; the scheduled amortization rate is 1/WAM".into(),
            });
        }
        if self.collateral.wam_months > MAX_WAM_MONTHS {
            return Err(WaterfallError::InvalidInput {
                field: "collateral.wam_months".into(),
                reason: format!("WAM cannot exceed {MAX_WAM_MONTHS} months"),
            });
        }
        if self.collateral.wac < Decimal::ZERO || self.collateral.wac > Decimal::ONE_HUNDRED {
            return Err(WaterfallError::InvalidInput {
                field: "collateral.wac".into(),
                reason: format!("WAC must be within [0, 100], got {}", self.collateral.wac),
            });
        }

        let mut names = HashSet::new();
        for tranche in &self.tranches {
            if !names.insert(tranche.name.as_str()) {
                return Err(WaterfallError::InvalidInput {
                    field: format!("tranche[{}].name", tranche.name),
                    reason: "Tranche names must be unique".into(),
                });
            }
            if tranche.balance < Decimal::ZERO || tranche.balance > MAX_BALANCE {
                return Err(WaterfallError::InvalidInput {
                    field: format!("tranche[{}].balance", tranche.name),
                    reason: format!("Tranche balance must be within [0, {MAX_BALANCE}]"),
                });
            }
            if tranche.spread_bps < Decimal::ZERO || tranche.spread_bps > MAX_SPREAD_BPS {
                return Err(WaterfallError::InvalidInput {
                    field: format!("tranche[{}].spread_bps", tranche.name),
                    reason: format!("Spread must be within [0, {MAX_SPREAD_BPS}] bps"),
                });
            }
        }

        if self.total_tranche_balance().is_zero() {
            return Err(WaterfallError::InvalidInput {
                field: "tranches".into(),
                reason: "Total tranche balance must be positive".into(),
            });
        }

        for trigger in &self.triggers {
            if trigger.threshold < Decimal::ZERO {
                return Err(WaterfallError::InvalidInput {
                    field: format!("trigger[{}].threshold", trigger.name),
                    reason: "Trigger threshold cannot be negative".into(),
                });
            }
        }

        Ok(())
    }

    pub fn total_tranche_balance(&self) -> Money {
        self.tranches.iter().map(|t| t.balance).sum()
    }

    pub fn rated_balance(&self) -> Money {
        self.tranches
            .iter()
            .filter(|t| !t.is_equity())
            .map(|t| t.balance)
            .sum()
    }

    /// Closing OC: pool / rated notes, percent.
    pub fn initial_oc_pct(&self) -> Option<Pct> {
        let rated = self.rated_balance();
        if rated.is_zero() {
            None
        } else {
            Some(self.collateral.balance / rated * Decimal::ONE_HUNDRED)
        }
    }

    pub fn triggers_of(&self, kind: TriggerKind) -> impl Iterator<Item = &TriggerSpec> {
        self.triggers.iter().filter(move |t| t.kind == kind)
    }

    /// Month after which the deal turbo-amortizes, if an ARD is defined.
    /// With several ARD triggers the earliest governs.
    pub fn ard_month(&self) -> Option<Decimal> {
        self.triggers_of(TriggerKind::Ard).map(|t| t.threshold).min()
    }
}

/// Subordination below each tranche as a percent of the pool.
pub fn static_subordination(pool_balance: Money, balances: &[Money]) -> Vec<Pct> {
    balances
        .iter()
        .enumerate()
        .map(|(idx, _)| {
            let junior: Money = balances[idx + 1..].iter().copied().sum();
            if pool_balance.is_zero() {
                Decimal::ZERO
            } else {
                junior / pool_balance * Decimal::ONE_HUNDRED
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tranche(name: &str, balance: Decimal, spread: Decimal, rating: Rating) -> TrancheSpec {
        TrancheSpec {
            name: name.into(),
            balance,
            coupon_type: CouponType::Fixed,
            spread_bps: spread,
            rating,
            subordination_pct: Decimal::ZERO,
        }
    }

    fn simple_deal() -> DealTemplate {
        DealTemplate {
            id: "test".into(),
            name: "Test".into(),
            asset_class: AssetClass::AutoAbs,
            collateral: CollateralPool {
                balance: dec!(100),
                wac: dec!(10),
                wam_months: dec!(24),
            },
            tranches: vec![
                tranche("A", dec!(80), dec!(100), Rating::AAA),
                tranche("R", dec!(20), dec!(0), Rating::NR),
            ],
            triggers: vec![],
        }
    }

    #[test]
    fn test_trigger_threshold_directions() {
        let mk = |kind| TriggerSpec {
            name: "t".into(),
            kind,
            threshold: dec!(10),
            consequence: String::new(),
        };
        assert!(mk(TriggerKind::Oc).is_breached(dec!(9)));
        assert!(!mk(TriggerKind::Oc).is_breached(dec!(10)));
        assert!(mk(TriggerKind::Ic).is_breached(dec!(9.99)));
        assert!(mk(TriggerKind::Cnl).is_breached(dec!(10.01)));
        assert!(!mk(TriggerKind::Cnl).is_breached(dec!(10)));
        assert!(mk(TriggerKind::Ard).is_breached(dec!(11)));
        assert!(!mk(TriggerKind::Ard).is_breached(dec!(10)));
        assert!(!mk(TriggerKind::Info).is_breached(dec!(1_000)));
    }

    #[test]
    fn test_only_oc_cnl_ard_drive_mode() {
        assert!(TriggerKind::Oc.drives_payment_mode());
        assert!(TriggerKind::Cnl.drives_payment_mode());
        assert!(TriggerKind::Ard.drives_payment_mode());
        assert!(!TriggerKind::Ic.drives_payment_mode());
        assert!(!TriggerKind::Info.drives_payment_mode());
    }

    #[test]
    fn test_rating_serde_labels() {
        let json = serde_json::to_string(&Rating::NR).unwrap();
        assert_eq!(json, "\"NR\"");
        let parsed: Rating = serde_json::from_str("\"BBB\"").unwrap();
        assert_eq!(parsed, Rating::BBB);
        assert_eq!(parsed.label(), "BBB");
        assert!(Rating::NR.is_equity());
        assert!(!Rating::B.is_equity());
    }

    #[test]
    fn test_rating_colors_are_distinct() {
        let all = [
            Rating::AAA,
            Rating::AA,
            Rating::A,
            Rating::BBB,
            Rating::BB,
            Rating::B,
            Rating::NR,
        ];
        let colors: HashSet<&str> = all.iter().map(|r| r.display_color()).collect();
        assert_eq!(colors.len(), all.len());
        assert_eq!(Rating::AAA.display_color(), "#1b5e20");
        assert!(all.iter().all(|r| r.display_color().starts_with('#')));
    }

    #[test]
    fn test_validate_rejects_out_of_range_amounts() {
        let mut deal = simple_deal();
        deal.collateral.wac = dec!(1_000_000_000_000_000_000_000_000_000);
        assert!(deal.validate().unwrap_err().to_string().contains("collateral.wac"));

        let mut deal = simple_deal();
        deal.collateral.wac = dec!(100.01);
        assert!(deal.validate().is_err());

        let mut deal = simple_deal();
        deal.tranches[0].balance = Decimal::MAX;
        deal.tranches[1].balance = Decimal::MAX;
        assert!(deal.validate().unwrap_err().to_string().contains("balance"));

        let mut deal = simple_deal();
        deal.collateral.balance = Decimal::MAX;
        assert!(deal.validate().is_err());

        let mut deal = simple_deal();
        deal.tranches[0].spread_bps = dec!(10_001);
        assert!(deal.validate().is_err());
    }

    #[test]
    fn test_coupon_pct_adds_spread() {
        let t = tranche("A", dec!(80), dec!(150), Rating::AAA);
        assert_eq!(t.coupon_pct(dec!(4.5)), dec!(6.0));
        assert!(t.is_interest_bearing());
        let r = tranche("R", dec!(20), dec!(0), Rating::NR);
        assert!(!r.is_interest_bearing());
    }

    #[test]
    fn test_validate_rejects_zero_wam() {
        let mut deal = simple_deal();
        deal.collateral.wam_months = Decimal::ZERO;
        let err = deal.validate().unwrap_err();
        assert!(err.to_string().contains("wam_months"));

        deal.collateral.wam_months = dec!(-12);
        assert!(deal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_tranches() {
        let mut deal = simple_deal();
        deal.tranches.clear();
        assert!(deal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut deal = simple_deal();
        deal.tranches[1].name = "A".into();
        assert!(deal.validate().is_err());
    }

    #[test]
    fn test_initial_oc() {
        let deal = simple_deal();
        assert_eq!(deal.initial_oc_pct(), Some(dec!(125)));
    }

    #[test]
    fn test_static_subordination() {
        let sub = static_subordination(dec!(100), &[dec!(70), dec!(20), dec!(10)]);
        assert_eq!(sub, vec![dec!(30), dec!(10), dec!(0)]);
    }

    #[test]
    fn test_from_json_roundtrip_validates() {
        let json = serde_json::to_string(&simple_deal()).unwrap();
        let parsed = DealTemplate::from_json(&json).unwrap();
        assert_eq!(parsed.tranches.len(), 2);

        let bad = json.replace("\"wam_months\":\"24\"", "\"wam_months\":\"0\"");
        assert!(DealTemplate::from_json(&bad).is_err());
    }
}
