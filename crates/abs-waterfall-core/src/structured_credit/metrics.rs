//! Per-tranche summary statistics derived from the engine's ledgers.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::deal::{Rating, TrancheSpec};
use super::engine::TrancheLedger;
use super::scenario::ScenarioParams;
use crate::time_value::{self, DEFAULT_IRR_GUESS, RATE_FLOOR};
use crate::types::{Money, Multiple, Pct, Rate, Years};

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Balance differences at or below this are Decimal rounding residue.
const ROUNDING_RESIDUE: Money = dec!(0.000000000001);

/// Life-of-deal results for one tranche.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheSummary {
    pub name: String,
    pub rating: Rating,
    pub original_balance: Money,
    pub final_balance: Money,
    pub total_interest: Money,
    pub total_principal: Money,
    pub principal_loss: Money,
    pub interest_shortfall: Money,
    pub purchase_price_pct: Pct,
    pub invested_capital: Money,
    pub moic: Multiple,
    /// Annualized; `None` when no rate solves the cash flows.
    pub irr: Option<Rate>,
    /// Half the projection length in years when any principal was paid.
    /// A coarse stand-in, not a principal-weighted average life.
    pub wal: Years,
}

pub fn summarize_tranches(
    specs: &[TrancheSpec],
    scenario: &ScenarioParams,
    ledgers: &[TrancheLedger],
    periods_run: u32,
    warnings: &mut Vec<String>,
) -> Vec<TrancheSummary> {
    specs
        .iter()
        .zip(ledgers)
        .map(|(spec, ledger)| {
            let summary = summarize_tranche(
                spec,
                ledger,
                scenario.purchase_price(&spec.name),
                periods_run,
            );
            if summary.irr.is_none() && summary.invested_capital > Decimal::ZERO {
                warnings.push(format!(
                    "IRR undefined for {}: cash flows have no solvable rate",
                    spec.name
                ));
            }
            summary
        })
        .collect()
}

pub fn summarize_tranche(
    spec: &TrancheSpec,
    ledger: &TrancheLedger,
    purchase_price_pct: Pct,
    periods_run: u32,
) -> TrancheSummary {
    let original = spec.balance;
    let shortfall = original - ledger.principal_received - ledger.balance;
    let principal_loss = if shortfall > ROUNDING_RESIDUE {
        shortfall
    } else {
        Decimal::ZERO
    };

    let wal = if ledger.principal_received > Decimal::ZERO {
        Decimal::from(periods_run) / Decimal::TWO / MONTHS_PER_YEAR
    } else {
        Decimal::ZERO
    };

    let invested = original * purchase_price_pct / Decimal::ONE_HUNDRED;
    let total_cash = ledger.principal_received + ledger.interest_received;
    let moic = if invested.is_zero() {
        Decimal::ZERO
    } else {
        total_cash / invested
    };

    TrancheSummary {
        name: spec.name.clone(),
        rating: spec.rating,
        original_balance: original,
        final_balance: ledger.balance,
        total_interest: ledger.interest_received,
        total_principal: ledger.principal_received,
        principal_loss,
        interest_shortfall: ledger.interest_shortfall,
        purchase_price_pct,
        invested_capital: invested,
        moic,
        irr: tranche_irr(invested, &ledger.cash_history),
        wal,
    }
}

/// Annualized IRR of buying at `invested` and receiving `receipts` monthly.
pub fn tranche_irr(invested: Money, receipts: &[Money]) -> Option<Rate> {
    let mut flows = Vec::with_capacity(receipts.len() + 1);
    flows.push(-invested);
    flows.extend_from_slice(receipts);

    let monthly = time_value::irr(&flows, DEFAULT_IRR_GUESS)?;
    time_value::annualize_monthly(monthly).map(|annual| annual.max(RATE_FLOOR))
}

/// Lowest defined IRR. Undefined IRRs are excluded, not read as zero.
pub fn min_irr<'a>(summaries: impl IntoIterator<Item = &'a TrancheSummary>) -> Option<Rate> {
    summaries.into_iter().filter_map(|s| s.irr).min()
}
