//! Waterfall Simulation Engine.
//!
//! Month-by-month amortization of the collateral pool with:
//! - Scheduled principal, prepayments and defaults off the start balance
//! - Interest paid senior-to-junior, the remainder becoming excess spread
//! - Pro-rata principal until a trigger breaches, sequential thereafter
//! - Excess spread split between the residual and OC-building turbo
//! - Junior-first write-down whenever the notes exceed the pool
//!
//! The period loop is a fold: each step consumes the previous
//! `SimulationState` and returns the next one with that period's record.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::deal::{DealTemplate, TriggerKind};
use super::metrics::{self, TrancheSummary};
use super::scenario::ScenarioParams;
use crate::types::{with_metadata, ComputationOutput, Money, Pct, Rate};
use crate::WaterfallResult;

/// The loop stops once the pool is at or below this balance.
pub const COLLATERAL_EPSILON: Money = dec!(0.0001);

/// Reported for OC and IC when the denominator is zero (fully covered).
pub const COVERAGE_SENTINEL: Pct = dec!(999);

const MONTHLY_PCT: Decimal = dec!(1200);

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    ProRata,
    Sequential,
}

/// What one tranche received in one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranchePeriodPayment {
    pub tranche_name: String,
    /// Coupon paid; for the residual, excess spread and residual releases.
    pub interest_paid: Money,
    pub principal_paid: Money,
    pub interest_shortfall: Money,
    pub write_down: Money,
}

impl TranchePeriodPayment {
    fn empty(name: &str) -> Self {
        TranchePeriodPayment {
            tranche_name: name.to_string(),
            interest_paid: Decimal::ZERO,
            principal_paid: Decimal::ZERO,
            interest_shortfall: Decimal::ZERO,
            write_down: Decimal::ZERO,
        }
    }

    pub fn total_cash(&self) -> Money {
        self.interest_paid + self.principal_paid
    }
}

/// One simulated month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowRecord {
    pub period: u32,
    pub collateral_start: Money,
    /// Clamped at zero.
    pub collateral_end: Money,
    pub scheduled_principal: Money,
    pub prepayments: Money,
    pub defaults: Money,
    pub recoveries: Money,
    pub losses: Money,
    pub interest_income: Money,
    pub excess_spread: Money,
    pub cnl_pct: Pct,
    pub oc_pct: Pct,
    /// Informational only; never changes the payment mode.
    pub ic_pct: Pct,
    pub oc_breached: bool,
    pub cnl_breached: bool,
    pub ic_breached: bool,
    /// Fail once sequential pay has latched.
    pub trigger_status: TriggerStatus,
    pub payment_mode: PaymentMode,
    pub ard_active: bool,
    pub turbo_payment: Money,
    pub equity_release: Money,
    pub available_principal: Money,
    /// Principal left after every balance is retired, paid to the residual.
    pub residual_release: Money,
    /// Principal with no tranche left to receive it (deals without a residual).
    pub unallocated_principal: Money,
    pub tranche_payments: Vec<TranchePeriodPayment>,
}

/// Breach history of one trigger across the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResult {
    pub name: String,
    pub kind: TriggerKind,
    pub threshold: Decimal,
    pub breach_periods: u32,
    pub first_breach_period: Option<u32>,
}

/// Running totals for one tranche; the engine's per-tranche state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheLedger {
    pub balance: Money,
    pub principal_received: Money,
    pub interest_received: Money,
    pub interest_shortfall: Money,
    pub written_down: Money,
    /// Interest plus principal received each period; feeds the IRR.
    pub cash_history: Vec<Money>,
}

impl TrancheLedger {
    fn opening(balance: Money) -> Self {
        TrancheLedger {
            balance,
            principal_received: Decimal::ZERO,
            interest_received: Decimal::ZERO,
            interest_shortfall: Decimal::ZERO,
            written_down: Decimal::ZERO,
            cash_history: Vec::new(),
        }
    }
}

/// Full result of a waterfall run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallOutput {
    pub cash_flows: Vec<CashFlowRecord>,
    pub tranche_summary: Vec<TrancheSummary>,
    /// Periods in which an OC or CNL test failed.
    pub trigger_breaches: u32,
    pub final_cnl: Pct,
    pub final_oc: Pct,
    pub ard_triggered: bool,
    /// First period in which the ARD turbo applied.
    pub ard_month: Option<u32>,
    pub trigger_results: Vec<TriggerResult>,
    /// Lowest defined IRR among rated tranches. Undefined IRRs are skipped.
    pub min_rated_irr: Option<Rate>,
    pub periods_run: u32,
    pub total_collateral_losses: Money,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SimulationState {
    collateral: Money,
    cumulative_loss: Money,
    /// One-way latch: once set, every later period pays sequentially.
    sequential: bool,
    tranches: Vec<TrancheLedger>,
}

impl SimulationState {
    fn opening(template: &DealTemplate) -> Self {
        SimulationState {
            collateral: template.collateral.balance,
            cumulative_loss: Decimal::ZERO,
            sequential: false,
            tranches: template
                .tranches
                .iter()
                .map(|t| TrancheLedger::opening(t.balance))
                .collect(),
        }
    }
}

/// Deal and scenario constants precomputed once per run.
struct DealTerms<'a> {
    template: &'a DealTemplate,
    scheduled_fraction: Decimal,
    monthly_cpr: Decimal,
    monthly_cdr: Decimal,
    recovery_fraction: Decimal,
    monthly_yield: Decimal,
    equity_share: Decimal,
    /// Monthly coupon fraction per tranche; zero for non-interest-bearing.
    monthly_coupon: Vec<Decimal>,
    rated: Vec<usize>,
    equity: Vec<usize>,
}

impl<'a> DealTerms<'a> {
    fn new(template: &'a DealTemplate, scenario: &ScenarioParams) -> Self {
        let monthly_coupon = template
            .tranches
            .iter()
            .map(|t| {
                if t.is_interest_bearing() {
                    t.coupon_pct(scenario.base_rate) / MONTHLY_PCT
                } else {
                    Decimal::ZERO
                }
            })
            .collect();
        let (equity, rated): (Vec<usize>, Vec<usize>) =
            (0..template.tranches.len()).partition(|&i| template.tranches[i].is_equity());

        DealTerms {
            template,
            scheduled_fraction: Decimal::ONE / template.collateral.wam_months,
            monthly_cpr: scenario.cpr / MONTHLY_PCT,
            monthly_cdr: scenario.cdr / MONTHLY_PCT,
            recovery_fraction: scenario.recovery / Decimal::ONE_HUNDRED,
            monthly_yield: scenario.effective_yield(template.collateral.wac) / MONTHLY_PCT,
            equity_share: scenario.equity_share_pct / Decimal::ONE_HUNDRED,
            monthly_coupon,
            rated,
            equity,
        }
    }

    fn period_cap(&self, scenario: &ScenarioParams) -> u32 {
        let twice_wam = (self.template.collateral.wam_months * dec!(2))
            .ceil()
            .to_u32()
            .unwrap_or(u32::MAX);
        scenario.projection_months.max(twice_wam)
    }
}

struct PeriodOutcome {
    record: CashFlowRecord,
    trigger_hits: Vec<bool>,
    flows_capped: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the structured-credit waterfall for a template under a scenario.
///
/// Either the whole projection completes or a configuration error is
/// returned; no partial ledger is ever handed back.
pub fn run_waterfall(
    template: &DealTemplate,
    scenario: &ScenarioParams,
) -> WaterfallResult<ComputationOutput<WaterfallOutput>> {
    let start = Instant::now();
    let (output, warnings) = simulate(template, scenario)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Structured-credit waterfall: monthly CPR/CDR amortization, \
         pro-rata/sequential principal with OC/CNL/ARD triggers",
        &serde_json::json!({
            "template": template.id,
            "asset_class": template.asset_class.label(),
            "collateral_balance": template.collateral.balance.to_string(),
            "wac": template.collateral.wac.to_string(),
            "wam_months": template.collateral.wam_months.to_string(),
            "num_tranches": template.tranches.len(),
            "scenario": scenario,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Run the period loop and aggregate, without the output envelope.
pub(crate) fn simulate(
    template: &DealTemplate,
    scenario: &ScenarioParams,
) -> WaterfallResult<(WaterfallOutput, Vec<String>)> {
    template.validate()?;
    scenario.validate(template)?;

    let terms = DealTerms::new(template, scenario);
    let cap = terms.period_cap(scenario);
    let mut warnings: Vec<String> = Vec::new();

    let trigger_count = template.triggers.len();
    let mut breach_periods = vec![0u32; trigger_count];
    let mut first_breach: Vec<Option<u32>> = vec![None; trigger_count];
    let mut trigger_breaches = 0u32;
    let mut ard_month: Option<u32> = None;
    let mut first_capped: Option<u32> = None;

    let mut cash_flows: Vec<CashFlowRecord> = Vec::new();
    let mut state = SimulationState::opening(template);
    let mut period: u32 = 1;

    while state.collateral > COLLATERAL_EPSILON && period <= cap {
        let (next, outcome) = step(&terms, state, period);
        state = next;

        for (idx, hit) in outcome.trigger_hits.iter().enumerate() {
            if *hit {
                breach_periods[idx] += 1;
                first_breach[idx].get_or_insert(period);
            }
        }
        if outcome.record.oc_breached || outcome.record.cnl_breached {
            trigger_breaches += 1;
        }
        if outcome.record.ard_active && ard_month.is_none() {
            ard_month = Some(period);
        }
        if outcome.flows_capped && first_capped.is_none() {
            first_capped = Some(period);
        }

        cash_flows.push(outcome.record);
        period += 1;
    }

    let periods_run = cash_flows.len() as u32;

    if let Some(p) = first_capped {
        warnings.push(format!(
            "Scheduled, prepaid and defaulted principal exceeded the pool in period {p}; flows were capped at the start balance"
        ));
    }
    if state.collateral > COLLATERAL_EPSILON {
        warnings.push(format!(
            "Projection stopped after {periods_run} months with {} of collateral outstanding",
            state.collateral.round_dp(4)
        ));
    }
    for (spec, ledger) in template.tranches.iter().zip(&state.tranches) {
        if ledger.interest_shortfall > Decimal::ZERO {
            warnings.push(format!(
                "{} accumulated an interest shortfall of {}",
                spec.name,
                ledger.interest_shortfall.round_dp(4)
            ));
        }
    }

    let tranche_summary = metrics::summarize_tranches(
        &template.tranches,
        scenario,
        &state.tranches,
        periods_run,
        &mut warnings,
    );
    let min_rated_irr = metrics::min_irr(
        template
            .tranches
            .iter()
            .zip(&tranche_summary)
            .filter(|(spec, _)| !spec.is_equity())
            .map(|(_, summary)| summary),
    );

    let trigger_results: Vec<TriggerResult> = template
        .triggers
        .iter()
        .enumerate()
        .map(|(idx, t)| TriggerResult {
            name: t.name.clone(),
            kind: t.kind,
            threshold: t.threshold,
            breach_periods: breach_periods[idx],
            first_breach_period: first_breach[idx],
        })
        .collect();
    for result in &trigger_results {
        if result.breach_periods > 0 && !result.kind.drives_payment_mode() {
            warnings.push(format!(
                "{} test '{}' breached in {} periods; reported only, payment mode unchanged",
                result.kind.label(),
                result.name,
                result.breach_periods
            ));
        }
    }

    let (final_cnl, final_oc) = match cash_flows.last() {
        Some(last) => (last.cnl_pct, last.oc_pct),
        None => (
            Decimal::ZERO,
            template.initial_oc_pct().unwrap_or(COVERAGE_SENTINEL),
        ),
    };

    let output = WaterfallOutput {
        cash_flows,
        tranche_summary,
        trigger_breaches,
        final_cnl,
        final_oc,
        ard_triggered: ard_month.is_some(),
        ard_month,
        trigger_results,
        min_rated_irr,
        periods_run,
        total_collateral_losses: state.cumulative_loss,
    };

    Ok((output, warnings))
}

// ---------------------------------------------------------------------------
// Period step
// ---------------------------------------------------------------------------

fn step(
    terms: &DealTerms,
    mut state: SimulationState,
    period: u32,
) -> (SimulationState, PeriodOutcome) {
    let template = terms.template;
    let start = state.collateral;

    // 1. Collateral flows off the start balance, capped so the pool cannot go negative
    let mut flows_capped = false;
    let mut scheduled = start * terms.scheduled_fraction;
    if scheduled > start {
        scheduled = start;
        flows_capped = true;
    }
    let mut prepayments = start * terms.monthly_cpr;
    if prepayments > start - scheduled {
        prepayments = start - scheduled;
        flows_capped = true;
    }
    let mut defaults = start * terms.monthly_cdr;
    if defaults > start - scheduled - prepayments {
        defaults = start - scheduled - prepayments;
        flows_capped = true;
    }
    let recoveries = defaults * terms.recovery_fraction;
    let losses = defaults - recoveries;

    // 2. Collateral interest net of fees
    let interest_income = start * terms.monthly_yield;

    // 3. Interest waterfall, senior to junior
    let mut payments: Vec<TranchePeriodPayment> = template
        .tranches
        .iter()
        .map(|t| TranchePeriodPayment::empty(&t.name))
        .collect();
    let mut interest_pool = interest_income;
    let mut rated_interest_due = Decimal::ZERO;

    for (idx, coupon) in terms.monthly_coupon.iter().enumerate() {
        if coupon.is_zero() {
            continue;
        }
        let ledger = &mut state.tranches[idx];
        let due = ledger.balance * coupon;
        if due <= Decimal::ZERO {
            continue;
        }
        rated_interest_due += due;
        let paid = due.min(interest_pool);
        let shortfall = due - paid;
        interest_pool -= paid;

        ledger.interest_received += paid;
        ledger.interest_shortfall += shortfall;
        payments[idx].interest_paid = paid;
        payments[idx].interest_shortfall = shortfall;
    }
    let excess_spread = interest_pool.max(Decimal::ZERO);
    let ic_pct = if rated_interest_due > Decimal::ZERO {
        interest_income / rated_interest_due * Decimal::ONE_HUNDRED
    } else {
        COVERAGE_SENTINEL
    };

    // 4. Pool roll-forward and cumulative loss
    let end = start - scheduled - prepayments - defaults;
    state.collateral = end;
    state.cumulative_loss += losses;
    let cnl_pct = state.cumulative_loss / template.collateral.balance * Decimal::ONE_HUNDRED;

    // 5. CNL test and ARD
    let cnl_breached = template
        .triggers_of(TriggerKind::Cnl)
        .any(|t| t.is_breached(cnl_pct));
    let pool_outstanding = end > COLLATERAL_EPSILON;
    let ard_active = pool_outstanding
        && template
            .triggers_of(TriggerKind::Ard)
            .any(|t| t.is_breached(Decimal::from(period)));

    // 6. Payment mode for this period and the excess spread split
    let payment_mode = if state.sequential || ard_active {
        PaymentMode::Sequential
    } else {
        PaymentMode::ProRata
    };
    let residual_idx = terms.equity.first().copied();
    let (equity_release, turbo_payment) = match (payment_mode, residual_idx) {
        (PaymentMode::ProRata, Some(_)) => {
            let release = excess_spread * terms.equity_share;
            (release, excess_spread - release)
        }
        _ => (Decimal::ZERO, excess_spread),
    };
    if let Some(idx) = residual_idx {
        if equity_release > Decimal::ZERO {
            state.tranches[idx].interest_received += equity_release;
            payments[idx].interest_paid += equity_release;
        }
    }

    // 7. Principal waterfall
    let available_principal = scheduled + prepayments + recoveries + turbo_payment;
    let mut remaining = available_principal;

    match payment_mode {
        PaymentMode::Sequential => {
            for &idx in &terms.rated {
                let amount = state.tranches[idx].balance.min(remaining);
                pay_principal(&mut state.tranches[idx], &mut payments[idx], amount);
                remaining -= amount;
            }
        }
        PaymentMode::ProRata => {
            let rated_total: Money = terms
                .rated
                .iter()
                .map(|&idx| state.tranches[idx].balance)
                .sum();
            if rated_total > Decimal::ZERO {
                let pot = remaining;
                let last = terms.rated.len() - 1;
                for (pos, &idx) in terms.rated.iter().enumerate() {
                    let balance = state.tranches[idx].balance;
                    // The last share takes the division remainder
                    let share = if pos == last {
                        remaining
                    } else {
                        pot * balance / rated_total
                    };
                    let amount = share.min(balance).min(remaining);
                    pay_principal(&mut state.tranches[idx], &mut payments[idx], amount);
                    remaining -= amount;
                }
            }
        }
    }

    for &idx in &terms.equity {
        let amount = state.tranches[idx].balance.min(remaining);
        pay_principal(&mut state.tranches[idx], &mut payments[idx], amount);
        remaining -= amount;
    }

    let (residual_release, unallocated_principal) = match residual_idx {
        Some(idx) if remaining > Decimal::ZERO => {
            state.tranches[idx].interest_received += remaining;
            payments[idx].interest_paid += remaining;
            (remaining, Decimal::ZERO)
        }
        Some(_) => (Decimal::ZERO, Decimal::ZERO),
        None => (Decimal::ZERO, remaining.max(Decimal::ZERO)),
    };

    // 8. OC test on the rated notes
    let rated_balance: Money = terms
        .rated
        .iter()
        .map(|&idx| state.tranches[idx].balance)
        .sum();
    let oc_pct = if rated_balance > Decimal::ZERO {
        end.max(Decimal::ZERO) / rated_balance * Decimal::ONE_HUNDRED
    } else {
        COVERAGE_SENTINEL
    };
    let oc_breached = rated_balance > Decimal::ZERO
        && template
            .triggers_of(TriggerKind::Oc)
            .any(|t| t.is_breached(oc_pct));

    let trigger_hits: Vec<bool> = template
        .triggers
        .iter()
        .map(|t| match t.kind {
            TriggerKind::Oc => rated_balance > Decimal::ZERO && t.is_breached(oc_pct),
            TriggerKind::Cnl => t.is_breached(cnl_pct),
            TriggerKind::Ic => rated_interest_due > Decimal::ZERO && t.is_breached(ic_pct),
            TriggerKind::Ard => pool_outstanding && t.is_breached(Decimal::from(period)),
            TriggerKind::Info => false,
        })
        .collect();
    let ic_breached = template
        .triggers
        .iter()
        .zip(&trigger_hits)
        .any(|(t, hit)| t.kind == TriggerKind::Ic && *hit);

    // 9. Latch sequential pay
    state.sequential = state.sequential || oc_breached || cnl_breached;
    let trigger_status = if state.sequential {
        TriggerStatus::Fail
    } else {
        TriggerStatus::Pass
    };

    // Notes in excess of the pool are written down junior-first; a
    // sub-epsilon excess is division residue, not a loss
    let note_balance: Money = state.tranches.iter().map(|t| t.balance).sum();
    let mut deficiency = note_balance - end.max(Decimal::ZERO);
    if deficiency > COLLATERAL_EPSILON {
        for &idx in terms.equity.iter().chain(terms.rated.iter().rev()) {
            if deficiency <= Decimal::ZERO {
                break;
            }
            let ledger = &mut state.tranches[idx];
            let write_down = ledger.balance.min(deficiency);
            ledger.balance -= write_down;
            ledger.written_down += write_down;
            payments[idx].write_down = write_down;
            deficiency -= write_down;
        }
    }

    // 10. Per-tranche cash history for the IRR
    for (ledger, payment) in state.tranches.iter_mut().zip(&payments) {
        ledger.cash_history.push(payment.total_cash());
    }

    let record = CashFlowRecord {
        period,
        collateral_start: start,
        collateral_end: end.max(Decimal::ZERO),
        scheduled_principal: scheduled,
        prepayments,
        defaults,
        recoveries,
        losses,
        interest_income,
        excess_spread,
        cnl_pct,
        oc_pct,
        ic_pct,
        oc_breached,
        cnl_breached,
        ic_breached,
        trigger_status,
        payment_mode,
        ard_active,
        turbo_payment,
        equity_release,
        available_principal,
        residual_release,
        unallocated_principal,
        tranche_payments: payments,
    };

    (
        state,
        PeriodOutcome {
            record,
            trigger_hits,
            flows_capped,
        },
    )
}

fn pay_principal(ledger: &mut TrancheLedger, payment: &mut TranchePeriodPayment, amount: Money) {
    if amount <= Decimal::ZERO {
        return;
    }
    ledger.balance -= amount;
    ledger.principal_received += amount;
    payment.principal_paid += amount;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_credit::deal::{
        AssetClass, CollateralPool, CouponType, Rating, TrancheSpec, TriggerSpec,
    };
    use crate::structured_credit::templates::{equipment, subprime_auto};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

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

    fn oc_trigger(threshold: Decimal) -> TriggerSpec {
        TriggerSpec {
            name: "OC".into(),
            kind: TriggerKind::Oc,
            threshold,
            consequence: String::new(),
        }
    }

    /// Pool 100 at 12% WAC, 10-month WAM; Class A 80 at base+100, residual 20.
    fn two_tranche_deal() -> DealTemplate {
        DealTemplate {
            id: "two".into(),
            name: "Two tranche".into(),
            asset_class: AssetClass::AutoAbs,
            collateral: CollateralPool {
                balance: dec!(100),
                wac: dec!(12),
                wam_months: dec!(10),
            },
            tranches: vec![
                tranche("A", dec!(80), dec!(100), Rating::AAA),
                tranche("R", dec!(20), Decimal::ZERO, Rating::NR),
            ],
            triggers: vec![],
        }
    }

    /// Same pool with A 60 (6%), B 20 (12%) and residual 20.
    fn three_tranche_deal() -> DealTemplate {
        let mut deal = two_tranche_deal();
        deal.tranches = vec![
            tranche("A", dec!(60), dec!(100), Rating::AAA),
            tranche("B", dec!(20), dec!(700), Rating::BBB),
            tranche("R", dec!(20), Decimal::ZERO, Rating::NR),
        ];
        deal
    }

    fn quiet_scenario() -> ScenarioParams {
        ScenarioParams {
            cpr: Decimal::ZERO,
            cdr: Decimal::ZERO,
            recovery: Decimal::ZERO,
            projection_months: 12,
            base_rate: dec!(5),
            excess_spread_adj_bps: Decimal::ZERO,
            servicing_fee_bps: Decimal::ZERO,
            other_fees_bps: Decimal::ZERO,
            equity_share_pct: dec!(50),
            purchase_prices: BTreeMap::new(),
        }
    }

    fn run(template: &DealTemplate, scenario: &ScenarioParams) -> WaterfallOutput {
        run_waterfall(template, scenario).unwrap().result
    }

    #[test]
    fn test_first_period_hand_calculation() {
        let out = run(&two_tranche_deal(), &quiet_scenario());
        let p1 = &out.cash_flows[0];

        // Scheduled 100/10; interest 100 * 12% / 12 = 1; Class A due 80 * 6% / 12 = 0.4
        assert_eq!(p1.scheduled_principal, dec!(10));
        assert_eq!(p1.interest_income, dec!(1));
        assert_eq!(p1.tranche_payments[0].interest_paid, dec!(0.4));
        assert_eq!(p1.excess_spread, dec!(0.6));

        // Pro-rata: half the excess to the residual, half turbos principal
        assert_eq!(p1.payment_mode, PaymentMode::ProRata);
        assert_eq!(p1.equity_release, dec!(0.3));
        assert_eq!(p1.turbo_payment, dec!(0.3));
        assert_eq!(p1.available_principal, dec!(10.3));
        assert_eq!(p1.tranche_payments[0].principal_paid, dec!(10.3));
        assert_eq!(p1.tranche_payments[1].interest_paid, dec!(0.3));
        assert_eq!(p1.tranche_payments[1].principal_paid, Decimal::ZERO);
        assert_eq!(p1.collateral_end, dec!(90));
        assert_eq!(p1.trigger_status, TriggerStatus::Pass);
    }

    #[test]
    fn test_pro_rata_splits_by_balance() {
        let out = run(&three_tranche_deal(), &quiet_scenario());
        let p1 = &out.cash_flows[0];

        // Interest: A 0.3, B 0.2, excess 0.5 -> 0.25 turbo
        assert_eq!(p1.excess_spread, dec!(0.5));
        assert_eq!(p1.available_principal, dec!(10.25));
        assert_eq!(p1.tranche_payments[0].principal_paid, dec!(7.6875));
        assert_eq!(p1.tranche_payments[1].principal_paid, dec!(2.5625));
    }

    #[test]
    fn test_no_defaults_means_no_tranche_losses() {
        for template in crate::structured_credit::templates::all_templates() {
            for share in [dec!(0), dec!(50), dec!(100)] {
                let mut scenario = template.base_case().with_cdr(Decimal::ZERO);
                scenario.equity_share_pct = share;
                let out = run(&template, &scenario);
                for s in &out.tranche_summary {
                    assert_eq!(s.principal_loss, Decimal::ZERO, "{} {}", template.id, s.name);
                }
                assert!(out
                    .cash_flows
                    .iter()
                    .flat_map(|r| &r.tranche_payments)
                    .all(|p| p.write_down.is_zero()));
            }
        }
    }

    #[test]
    fn test_pro_rata_distributes_the_whole_pot() {
        // Class A's two-thirds share of the pot does not terminate
        let mut deal = three_tranche_deal();
        deal.tranches[0].balance = dec!(50);
        deal.tranches[1].balance = dec!(25);
        deal.tranches[2].balance = dec!(25);
        let out = run(&deal, &quiet_scenario());
        for r in &out.cash_flows {
            let paid: Money = r.tranche_payments.iter().map(|p| p.principal_paid).sum();
            assert_eq!(
                paid + r.residual_release + r.unallocated_principal,
                r.available_principal,
                "period {}",
                r.period
            );
        }
    }

    #[test]
    fn test_oc_breach_latches_sequential() {
        let mut deal = three_tranche_deal();
        deal.triggers.push(oc_trigger(dec!(200)));
        let out = run(&deal, &quiet_scenario());

        let p1 = &out.cash_flows[0];
        assert!(p1.oc_breached);
        // Breach is observed after this period's distribution
        assert_eq!(p1.payment_mode, PaymentMode::ProRata);
        assert_eq!(p1.trigger_status, TriggerStatus::Fail);

        let p2 = &out.cash_flows[1];
        assert_eq!(p2.payment_mode, PaymentMode::Sequential);
        assert_eq!(p2.equity_release, Decimal::ZERO);
        assert_eq!(p2.turbo_payment, p2.excess_spread);
        assert_eq!(p2.tranche_payments[1].principal_paid, Decimal::ZERO);
        assert!(p2.tranche_payments[0].principal_paid > Decimal::ZERO);

        assert!(out
            .cash_flows
            .iter()
            .all(|r| r.trigger_status == TriggerStatus::Fail));
        assert_eq!(out.trigger_results[0].first_breach_period, Some(1));
    }

    #[test]
    fn test_cnl_breach_latches_even_after_recovery_of_ratios() {
        let template = subprime_auto();
        let scenario = template.base_case().with_cdr(dec!(30));
        let out = run(&template, &scenario);

        let first_fail = out
            .cash_flows
            .iter()
            .position(|r| r.trigger_status == TriggerStatus::Fail)
            .expect("30% CDR should breach the CNL trigger");
        assert!(out.cash_flows[first_fail..]
            .iter()
            .all(|r| r.trigger_status == TriggerStatus::Fail));
        assert!(out.cash_flows[first_fail + 1..]
            .iter()
            .all(|r| r.payment_mode == PaymentMode::Sequential));
        assert!(out.trigger_breaches > 0);
    }

    #[test]
    fn test_ard_forces_sequential_after_threshold() {
        let template = equipment();
        let out = run(&template, &template.base_case());

        assert!(out.ard_triggered);
        assert_eq!(out.ard_month, Some(37));
        assert!(!out.cash_flows[35].ard_active);
        assert!(out.cash_flows[36].ard_active);
        for record in &out.cash_flows {
            if record.ard_active {
                assert_eq!(record.payment_mode, PaymentMode::Sequential);
                assert_eq!(record.equity_release, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_info_trigger_is_inert() {
        let template = subprime_auto();
        let mut without_info = template.clone();
        without_info.triggers.retain(|t| t.kind != TriggerKind::Info);
        let scenario = template.base_case().with_cdr(dec!(12));

        let a = serde_json::to_value(run(&template, &scenario).cash_flows).unwrap();
        let b = serde_json::to_value(run(&without_info, &scenario).cash_flows).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ic_is_reported_but_never_changes_mode() {
        let mut deal = two_tranche_deal();
        deal.triggers.push(TriggerSpec {
            name: "IC".into(),
            kind: TriggerKind::Ic,
            threshold: dec!(10_000),
            consequence: String::new(),
        });
        let out = run(&deal, &quiet_scenario());
        let plain = run(&two_tranche_deal(), &quiet_scenario());

        assert!(out.cash_flows[0].ic_breached);
        assert!(out
            .cash_flows
            .iter()
            .all(|r| r.payment_mode == PaymentMode::ProRata));
        assert_eq!(out.trigger_breaches, 0);
        assert_eq!(
            out.tranche_summary[0].total_principal,
            plain.tranche_summary[0].total_principal
        );
    }

    #[test]
    fn test_subprime_base_case_period_one_defaults() {
        let template = subprime_auto();
        let out = run(&template, &template.base_case());
        let p1 = &out.cash_flows[0];

        // 260 * 5% / 12
        assert!((p1.defaults - dec!(1.0833)).abs() < dec!(0.0001));
        assert!((p1.prepayments - dec!(3.25)).abs() < dec!(0.0001));
        assert!(out.cash_flows[11].cnl_pct > Decimal::ZERO);
    }

    #[test]
    fn test_collateral_decays_and_chains() {
        let template = subprime_auto();
        let out = run(&template, &template.base_case());
        for pair in out.cash_flows.windows(2) {
            assert!(pair[0].collateral_end <= pair[0].collateral_start);
            assert_eq!(pair[1].collateral_start, pair[0].collateral_end);
        }
        for r in &out.cash_flows {
            assert_eq!(
                r.collateral_end,
                r.collateral_start - r.scheduled_principal - r.prepayments - r.defaults
            );
        }
    }

    #[test]
    fn test_principal_is_fully_distributed_each_period() {
        let template = subprime_auto();
        let out = run(&template, &template.base_case().with_cdr(dec!(20)));
        for r in &out.cash_flows {
            let paid: Money = r.tranche_payments.iter().map(|p| p.principal_paid).sum();
            let diff = r.available_principal - paid - r.residual_release - r.unallocated_principal;
            assert!(diff.abs() < dec!(0.000001), "period {}: {diff}", r.period);
        }
    }

    #[test]
    fn test_residual_written_down_before_notes() {
        let template = subprime_auto();
        let out = run(&template, &template.base_case().with_cdr(dec!(40)));
        let residual = template.tranches.len() - 1;

        let first_note_write_down = out
            .cash_flows
            .iter()
            .position(|r| r.tranche_payments[..residual].iter().any(|p| p.write_down > Decimal::ZERO));
        let first_residual_write_down = out
            .cash_flows
            .iter()
            .position(|r| r.tranche_payments[residual].write_down > Decimal::ZERO)
            .expect("40% CDR should impair the residual");
        if let Some(note) = first_note_write_down {
            assert!(first_residual_write_down <= note);
        }
        assert!(out.tranche_summary[residual].principal_loss > Decimal::ZERO);
    }

    #[test]
    fn test_wam_of_one_retires_pool_in_one_period() {
        let mut deal = two_tranche_deal();
        deal.collateral.wam_months = Decimal::ONE;
        let mut scenario = quiet_scenario();
        scenario.cpr = dec!(30);
        scenario.cdr = dec!(10);

        let out = run_waterfall(&deal, &scenario).unwrap();
        assert_eq!(out.result.periods_run, 1);
        let p1 = &out.result.cash_flows[0];
        assert_eq!(p1.scheduled_principal, dec!(100));
        assert_eq!(p1.prepayments, Decimal::ZERO);
        assert_eq!(p1.defaults, Decimal::ZERO);
        assert_eq!(p1.collateral_end, Decimal::ZERO);
        assert!(out.warnings.iter().any(|w| w.contains("capped")));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let mut deal = two_tranche_deal();
        deal.collateral.wam_months = Decimal::ZERO;
        assert!(run_waterfall(&deal, &quiet_scenario()).is_err());

        let mut deal = two_tranche_deal();
        deal.tranches.clear();
        assert!(run_waterfall(&deal, &quiet_scenario()).is_err());
    }

    #[test]
    fn test_deal_without_residual_reports_unallocated_cash() {
        let mut deal = two_tranche_deal();
        deal.tranches.truncate(1);
        let out = run(&deal, &quiet_scenario());

        // Class A retires before the pool does; the rest has nowhere to go
        assert_eq!(out.tranche_summary[0].final_balance, Decimal::ZERO);
        let unallocated: Money = out.cash_flows.iter().map(|r| r.unallocated_principal).sum();
        assert!(unallocated > Decimal::ZERO);
        assert!(out.cash_flows.iter().all(|r| r.equity_release.is_zero()));
    }

    #[test]
    fn test_horizon_is_twice_wam_at_least() {
        let out = run(&two_tranche_deal(), &quiet_scenario());
        // 12 requested, WAM 10 -> cap 20; 1/WAM amortization never reaches zero
        assert_eq!(out.periods_run, 20);
    }

    #[test]
    fn test_rated_fully_paid_reports_oc_sentinel() {
        let out = run(&two_tranche_deal(), &quiet_scenario());
        let last = out.cash_flows.last().unwrap();
        assert_eq!(out.tranche_summary[0].final_balance, Decimal::ZERO);
        assert_eq!(last.oc_pct, COVERAGE_SENTINEL);
        assert_eq!(out.final_oc, COVERAGE_SENTINEL);
    }
}
