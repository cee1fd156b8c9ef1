//! Breakeven CDR: the default rate at which a tranche first loses principal.
//!
//! Bisection over CDR in [0, 50]. Each probe is a full engine run, so the
//! search itself is sequential; independent tranches are solved in parallel
//! by [`breakeven_table`].

use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::deal::{DealTemplate, Rating};
use super::engine::simulate;
use super::scenario::ScenarioParams;
use crate::error::WaterfallError;
use crate::types::{with_metadata, ComputationOutput, Money, Pct};
use crate::WaterfallResult;

/// Principal loss above this amount counts as impairment.
pub const LOSS_THRESHOLD: Money = dec!(0.01);
pub const CDR_SEARCH_CEILING: Pct = dec!(50);
const MAX_BISECTIONS: u32 = 20;
const CDR_TOLERANCE: Pct = dec!(0.1);

/// Bracket produced by the search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakevenResult {
    pub tranche_index: usize,
    pub tranche_name: String,
    pub rating: Rating,
    /// Lowest searched CDR known to impair the tranche. `None` if the
    /// tranche survives the ceiling.
    pub breakeven_cdr: Option<Pct>,
    /// Highest searched CDR known to leave the tranche whole.
    pub safe_cdr: Option<Pct>,
    pub engine_runs: u32,
}

/// Find the smallest CDR (annual percent) at which `tranche_index` loses
/// more than [`LOSS_THRESHOLD`] of principal. The scenario's own CDR is
/// ignored.
///
/// Returns `Some(0)` when the tranche is impaired with no defaults at all
/// and `None` when it survives a 50% CDR.
pub fn find_breakeven_cdr(
    template: &DealTemplate,
    scenario: &ScenarioParams,
    tranche_index: usize,
) -> WaterfallResult<Option<Pct>> {
    search(template, scenario, tranche_index).map(|r| r.breakeven_cdr)
}

/// Breakeven for every tranche, solved in parallel.
pub fn breakeven_table(
    template: &DealTemplate,
    scenario: &ScenarioParams,
) -> WaterfallResult<ComputationOutput<Vec<BreakevenResult>>> {
    let start = Instant::now();

    let results: Vec<BreakevenResult> = (0..template.tranches.len())
        .into_par_iter()
        .map(|idx| search(template, scenario, idx))
        .collect::<WaterfallResult<Vec<_>>>()?;

    let mut warnings = Vec::new();
    for r in &results {
        match r.breakeven_cdr {
            Some(cdr) if cdr.is_zero() => warnings.push(format!(
                "{} ({}) loses principal even at 0% CDR",
                r.tranche_name,
                r.rating.label()
            )),
            None => warnings.push(format!(
                "{} ({}) is not impaired at the {CDR_SEARCH_CEILING}% CDR search ceiling",
                r.tranche_name,
                r.rating.label()
            )),
            _ => {}
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Breakeven CDR: bisection over annual CDR in [0, 50] on tranche principal loss",
        &serde_json::json!({
            "template": template.id,
            "loss_threshold": LOSS_THRESHOLD.to_string(),
            "cdr_tolerance": CDR_TOLERANCE.to_string(),
            "cpr": scenario.cpr.to_string(),
            "recovery": scenario.recovery.to_string(),
        }),
        warnings,
        elapsed,
        results,
    ))
}

fn search(
    template: &DealTemplate,
    scenario: &ScenarioParams,
    tranche_index: usize,
) -> WaterfallResult<BreakevenResult> {
    let tranche = template
        .tranches
        .get(tranche_index)
        .ok_or_else(|| WaterfallError::InvalidInput {
            field: "tranche_index".into(),
            reason: format!(
                "Index {tranche_index} is out of range for {} tranches",
                template.tranches.len()
            ),
        })?;

    let mut runs = 0u32;
    let mut impaired_at = |cdr: Pct| -> WaterfallResult<bool> {
        runs += 1;
        let (output, _) = simulate(template, &scenario.with_cdr(cdr))?;
        Ok(output.tranche_summary[tranche_index].principal_loss > LOSS_THRESHOLD)
    };

    let (breakeven_cdr, safe_cdr) = if impaired_at(Decimal::ZERO)? {
        (Some(Decimal::ZERO), None)
    } else if !impaired_at(CDR_SEARCH_CEILING)? {
        (None, Some(CDR_SEARCH_CEILING))
    } else {
        let mut low = Decimal::ZERO;
        let mut high = CDR_SEARCH_CEILING;
        for _ in 0..MAX_BISECTIONS {
            if high - low < CDR_TOLERANCE {
                break;
            }
            let mid = (low + high) / Decimal::TWO;
            if impaired_at(mid)? {
                high = mid;
            } else {
                low = mid;
            }
        }
        (Some(high), Some(low))
    };

    Ok(BreakevenResult {
        tranche_index,
        tranche_name: tranche.name.clone(),
        rating: tranche.rating,
        breakeven_cdr,
        safe_cdr,
        engine_runs: runs,
    })
}
