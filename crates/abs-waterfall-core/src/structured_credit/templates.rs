//! Built-in deal templates, one per collateral archetype.
//!
//! Balances are in millions. Structures are representative of recent
//! public deals in each sector, not copies of any one transaction.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::deal::{
    static_subordination, AssetClass, CollateralPool, CouponType, DealTemplate, Rating,
    TrancheSpec, TriggerKind, TriggerSpec,
};
use super::scenario::ScenarioParams;
use crate::error::WaterfallError;
use crate::types::{Bps, Money, Pct};
use crate::WaterfallResult;

pub const SUBPRIME_AUTO: &str = "subprime-auto";
pub const CONSUMER_LOAN: &str = "consumer-loan";
pub const EQUIPMENT: &str = "equipment";
pub const BROADLY_SYNDICATED_CLO: &str = "bsl-clo";

/// Short listing row for template pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
    pub asset_class: AssetClass,
    pub collateral_balance: Money,
    pub wac: Pct,
    pub wam_months: Decimal,
    pub tranche_count: usize,
    pub trigger_count: usize,
    pub initial_oc_pct: Option<Pct>,
}

impl From<&DealTemplate> for TemplateInfo {
    fn from(t: &DealTemplate) -> Self {
        TemplateInfo {
            id: t.id.clone(),
            name: t.name.clone(),
            asset_class: t.asset_class,
            collateral_balance: t.collateral.balance,
            wac: t.collateral.wac,
            wam_months: t.collateral.wam_months,
            tranche_count: t.tranches.len(),
            trigger_count: t.triggers.len(),
            initial_oc_pct: t.initial_oc_pct(),
        }
    }
}

pub fn all_templates() -> Vec<DealTemplate> {
    vec![
        subprime_auto(),
        consumer_loan(),
        equipment(),
        broadly_syndicated_clo(),
    ]
}

pub fn list_templates() -> Vec<TemplateInfo> {
    all_templates().iter().map(TemplateInfo::from).collect()
}

pub fn find_template(id: &str) -> WaterfallResult<DealTemplate> {
    all_templates()
        .into_iter()
        .find(|t| t.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| WaterfallError::UnknownTemplate(id.to_string()))
}

impl DealTemplate {
    /// Archetype base-case assumptions.
    pub fn base_case(&self) -> ScenarioParams {
        let (cpr, cdr, recovery, months, servicing_fee_bps, other_fees_bps) =
            match self.asset_class {
                AssetClass::AutoAbs => (dec!(15), dec!(5), dec!(45), 60, dec!(200), dec!(10)),
                AssetClass::ConsumerAbs => (dec!(20), dec!(7), dec!(10), 36, dec!(150), dec!(15)),
                AssetClass::EquipmentAbs => (dec!(8), dec!(1.5), dec!(40), 48, dec!(75), dec!(10)),
                AssetClass::Clo => (dec!(20), dec!(2.5), dec!(65), 96, dec!(40), dec!(15)),
            };
        ScenarioParams {
            cpr,
            cdr,
            recovery,
            projection_months: months,
            base_rate: dec!(4.30),
            excess_spread_adj_bps: Decimal::ZERO,
            servicing_fee_bps,
            other_fees_bps,
            equity_share_pct: dec!(50),
            purchase_prices: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

struct ClassDef {
    name: &'static str,
    balance: Money,
    coupon_type: CouponType,
    spread_bps: Bps,
    rating: Rating,
}

fn class(
    name: &'static str,
    balance: Money,
    coupon_type: CouponType,
    spread_bps: Bps,
    rating: Rating,
) -> ClassDef {
    ClassDef {
        name,
        balance,
        coupon_type,
        spread_bps,
        rating,
    }
}

fn trigger(name: &str, kind: TriggerKind, threshold: Decimal, consequence: &str) -> TriggerSpec {
    TriggerSpec {
        name: name.into(),
        kind,
        threshold,
        consequence: consequence.into(),
    }
}

fn build(
    id: &str,
    name: &str,
    asset_class: AssetClass,
    collateral: CollateralPool,
    classes: Vec<ClassDef>,
    triggers: Vec<TriggerSpec>,
) -> DealTemplate {
    let balances: Vec<Money> = classes.iter().map(|c| c.balance).collect();
    let subordination = static_subordination(collateral.balance, &balances);
    let tranches = classes
        .into_iter()
        .zip(subordination)
        .map(|(c, sub)| TrancheSpec {
            name: c.name.into(),
            balance: c.balance,
            coupon_type: c.coupon_type,
            spread_bps: c.spread_bps,
            rating: c.rating,
            subordination_pct: sub.round_dp(2),
        })
        .collect();

    DealTemplate {
        id: id.into(),
        name: name.into(),
        asset_class,
        collateral,
        tranches,
        triggers,
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub fn subprime_auto() -> DealTemplate {
    use CouponType::Fixed;
    build(
        SUBPRIME_AUTO,
        "Subprime Auto Receivables Trust 2024-1",
        AssetClass::AutoAbs,
        CollateralPool {
            balance: dec!(260),
            wac: dec!(18.5),
            wam_months: dec!(60),
        },
        vec![
            class("Class A", dec!(150), Fixed, dec!(85), Rating::AAA),
            class("Class B", dec!(26), Fixed, dec!(130), Rating::AA),
            class("Class C", dec!(24), Fixed, dec!(175), Rating::A),
            class("Class D", dec!(20), Fixed, dec!(260), Rating::BBB),
            class("Class E", dec!(13), Fixed, dec!(475), Rating::BB),
            class("Residual", dec!(27), Fixed, Decimal::ZERO, Rating::NR),
        ],
        vec![
            trigger(
                "OC Test",
                TriggerKind::Oc,
                dec!(105),
                "Switch to sequential pay; all excess spread turbos the notes",
            ),
            trigger(
                "Cumulative Net Loss",
                TriggerKind::Cnl,
                dec!(12),
                "Switch to sequential pay; residual release stops",
            ),
            trigger(
                "Interest Coverage",
                TriggerKind::Ic,
                dec!(120),
                "Reported to noteholders",
            ),
            trigger(
                "Clean-up Call",
                TriggerKind::Info,
                dec!(10),
                "Servicer may call at 10% pool factor",
            ),
        ],
    )
}

pub fn consumer_loan() -> DealTemplate {
    use CouponType::Fixed;
    build(
        CONSUMER_LOAN,
        "Marketplace Consumer Loan Trust 2024-2",
        AssetClass::ConsumerAbs,
        CollateralPool {
            balance: dec!(300),
            wac: dec!(15.5),
            wam_months: dec!(36),
        },
        vec![
            class("Class A", dec!(195), Fixed, dec!(95), Rating::AAA),
            class("Class B", dec!(27), Fixed, dec!(150), Rating::AA),
            class("Class C", dec!(24), Fixed, dec!(210), Rating::A),
            class("Class D", dec!(21), Fixed, dec!(330), Rating::BBB),
            class("Certificates", dec!(33), Fixed, Decimal::ZERO, Rating::NR),
        ],
        vec![
            trigger(
                "OC Test",
                TriggerKind::Oc,
                dec!(104),
                "Switch to sequential pay",
            ),
            trigger(
                "Cumulative Net Loss",
                TriggerKind::Cnl,
                dec!(15),
                "Switch to sequential pay",
            ),
        ],
    )
}

pub fn equipment() -> DealTemplate {
    use CouponType::Fixed;
    build(
        EQUIPMENT,
        "Equipment Lease Trust 2024-A",
        AssetClass::EquipmentAbs,
        CollateralPool {
            balance: dec!(500),
            wac: dec!(7.8),
            wam_months: dec!(42),
        },
        vec![
            class("Class A-2", dec!(380), Fixed, dec!(60), Rating::AAA),
            class("Class B", dec!(30), Fixed, dec!(95), Rating::AA),
            class("Class C", dec!(25), Fixed, dec!(125), Rating::A),
            class("Class D", dec!(20), Fixed, dec!(190), Rating::BBB),
            class("Residual", dec!(45), Fixed, Decimal::ZERO, Rating::NR),
        ],
        vec![
            trigger(
                "OC Test",
                TriggerKind::Oc,
                dec!(103),
                "Switch to sequential pay",
            ),
            trigger(
                "Cumulative Net Loss",
                TriggerKind::Cnl,
                dec!(6),
                "Switch to sequential pay",
            ),
            trigger(
                "Accelerated Redemption",
                TriggerKind::Ard,
                dec!(36),
                "All excess spread turbo-pays the notes after month 36",
            ),
        ],
    )
}

pub fn broadly_syndicated_clo() -> DealTemplate {
    use CouponType::Floating;
    build(
        BROADLY_SYNDICATED_CLO,
        "Broadly Syndicated CLO 2024-3",
        AssetClass::Clo,
        CollateralPool {
            balance: dec!(400),
            wac: dec!(9.0),
            wam_months: dec!(84),
        },
        vec![
            class("Class A", dec!(248), Floating, dec!(140), Rating::AAA),
            class("Class B", dec!(44), Floating, dec!(190), Rating::AA),
            class("Class C", dec!(24), Floating, dec!(240), Rating::A),
            class("Class D", dec!(24), Floating, dec!(350), Rating::BBB),
            class("Class E", dec!(18), Floating, dec!(650), Rating::BB),
            class("Subordinated Notes", dec!(42), Floating, Decimal::ZERO, Rating::NR),
        ],
        vec![
            trigger(
                "Senior OC",
                TriggerKind::Oc,
                dec!(106),
                "Divert interest to pay down Class A",
            ),
            trigger(
                "Interest Coverage",
                TriggerKind::Ic,
                dec!(110),
                "Divert interest to pay down Class A",
            ),
            trigger(
                "Non-Call Period End",
                TriggerKind::Info,
                dec!(24),
                "Equity may call or refinance after month 24",
            ),
        ],
    )
}
