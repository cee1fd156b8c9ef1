//! Stress ladder: the same deal run at multiples of the scenario CDR.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::deal::DealTemplate;
use super::engine::simulate;
use super::scenario::ScenarioParams;
use crate::error::WaterfallError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Pct, Rate};
use crate::WaterfallResult;

/// Principal loss of one tranche on one rung.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheLoss {
    pub name: String,
    pub principal_loss: Money,
    /// Loss as a percent of the original balance.
    pub loss_pct: Pct,
    pub irr: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressRung {
    pub cdr_multiple: Multiple,
    pub cdr: Pct,
    pub final_cnl: Pct,
    pub final_oc: Pct,
    pub trigger_breaches: u32,
    pub ard_triggered: bool,
    pub min_rated_irr: Option<Rate>,
    pub tranche_losses: Vec<TrancheLoss>,
}

pub fn run_stress_ladder(
    template: &DealTemplate,
    scenario: &ScenarioParams,
    cdr_multiples: &[Multiple],
) -> WaterfallResult<ComputationOutput<Vec<StressRung>>> {
    let start = Instant::now();

    if cdr_multiples.is_empty() {
        return Err(WaterfallError::InsufficientData(
            "At least one CDR multiple is required".into(),
        ));
    }
    if let Some(bad) = cdr_multiples.iter().find(|m| **m < Decimal::ZERO) {
        return Err(WaterfallError::InvalidInput {
            field: "cdr_multiples".into(),
            reason: format!("Multiples cannot be negative, got {bad}"),
        });
    }

    let mut warnings = Vec::new();
    let mut rungs = Vec::with_capacity(cdr_multiples.len());

    for &multiple in cdr_multiples {
        let raw = scenario.cdr * multiple;
        let cdr = raw.min(Decimal::ONE_HUNDRED);
        if cdr < raw {
            warnings.push(format!("{multiple}x CDR of {raw}% capped at 100%"));
        }

        let (output, _) = simulate(template, &scenario.with_cdr(cdr))?;

        let tranche_losses = output
            .tranche_summary
            .iter()
            .map(|s| TrancheLoss {
                name: s.name.clone(),
                principal_loss: s.principal_loss,
                loss_pct: if s.original_balance.is_zero() {
                    Decimal::ZERO
                } else {
                    s.principal_loss / s.original_balance * Decimal::ONE_HUNDRED
                },
                irr: s.irr,
            })
            .collect();

        rungs.push(StressRung {
            cdr_multiple: multiple,
            cdr,
            final_cnl: output.final_cnl,
            final_oc: output.final_oc,
            trigger_breaches: output.trigger_breaches,
            ard_triggered: output.ard_triggered,
            min_rated_irr: output.min_rated_irr,
            tranche_losses,
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stress ladder: waterfall rerun at multiples of the scenario CDR",
        &serde_json::json!({
            "template": template.id,
            "base_cdr": scenario.cdr.to_string(),
            "multiples": cdr_multiples.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        rungs,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_credit::templates::subprime_auto;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ladder_rows_follow_multiples() {
        let template = subprime_auto();
        let scenario = template.base_case();
        let out = run_stress_ladder(&template, &scenario, &[dec!(0), dec!(1), dec!(3)]).unwrap();
        let rungs = &out.result;
        assert_eq!(rungs.len(), 3);
        assert_eq!(rungs[0].cdr, dec!(0));
        assert_eq!(rungs[1].cdr, dec!(5));
        assert_eq!(rungs[2].cdr, dec!(15));
        assert_eq!(rungs[0].final_cnl, Decimal::ZERO);
        assert!(rungs[2].final_cnl > rungs[1].final_cnl);
    }

    #[test]
    fn test_ladder_caps_cdr() {
        let template = subprime_auto();
        let scenario = template.base_case().with_cdr(dec!(40));
        let out = run_stress_ladder(&template, &scenario, &[dec!(3)]).unwrap();
        assert_eq!(out.result[0].cdr, dec!(100));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_ladder_rejects_bad_multiples() {
        let template = subprime_auto();
        let scenario = template.base_case();
        assert!(run_stress_ladder(&template, &scenario, &[]).is_err());
        assert!(run_stress_ladder(&template, &scenario, &[dec!(-1)]).is_err());
    }
}
