use clap::Args;
use serde_json::Value;

use abs_waterfall_core::structured_credit::run_waterfall as run_engine;

use super::DealArgs;

/// Arguments for a single waterfall projection
#[derive(Args)]
pub struct WaterfallArgs {
    #[command(flatten)]
    pub deal: DealArgs,

    /// Emit only the period-by-period ledger (one row per month)
    #[arg(long)]
    pub cash_flows: bool,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (template, scenario) = args.deal.resolve()?;
    let result = run_engine(&template, &scenario)?;

    for warning in &result.warnings {
        tracing::info!(template = %template.id, "{warning}");
    }
    tracing::debug!(
        periods = result.result.periods_run,
        elapsed_us = result.metadata.computation_time_us,
        "waterfall complete"
    );

    if args.cash_flows {
        return Ok(flatten_ledger(&serde_json::to_value(&result.result.cash_flows)?));
    }
    Ok(serde_json::to_value(result)?)
}

/// Lift each record's per-tranche payments into flat `<tranche>_interest` /
/// `<tranche>_principal` columns so the ledger reads as one row per period.
fn flatten_ledger(records: &Value) -> Value {
    let Value::Array(rows) = records else {
        return records.clone();
    };
    let flat = rows
        .iter()
        .map(|row| {
            let mut map = row.as_object().cloned().unwrap_or_default();
            if let Some(Value::Array(payments)) = map.remove("tranche_payments") {
                for p in payments {
                    let name = p
                        .get("tranche_name")
                        .and_then(Value::as_str)
                        .unwrap_or("tranche")
                        .to_string();
                    for field in ["interest_paid", "principal_paid", "write_down"] {
                        if let Some(v) = p.get(field) {
                            map.insert(format!("{name} {field}"), v.clone());
                        }
                    }
                }
            }
            Value::Object(map)
        })
        .collect();
    Value::Array(flat)
}
