use clap::Args;
use serde_json::Value;

use abs_waterfall_core::structured_credit::{breakeven_table, find_breakeven_cdr};

use super::DealArgs;

/// Arguments for breakeven CDR search
#[derive(Args)]
pub struct BreakevenArgs {
    #[command(flatten)]
    pub deal: DealArgs,

    /// Tranche index (0 = most senior); omit to solve every tranche
    #[arg(long)]
    pub tranche: Option<usize>,
}

pub fn run_breakeven(args: BreakevenArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (template, scenario) = args.deal.resolve()?;

    if let Some(index) = args.tranche {
        let cdr = find_breakeven_cdr(&template, &scenario, index)?;
        let name = template
            .tranches
            .get(index)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        tracing::debug!(tranche = %name, ?cdr, "breakeven solved");
        return Ok(serde_json::json!({
            "result": {
                "tranche_index": index,
                "tranche_name": name,
                "breakeven_cdr": cdr,
            }
        }));
    }

    let result = breakeven_table(&template, &scenario)?;
    Ok(serde_json::to_value(result)?)
}
