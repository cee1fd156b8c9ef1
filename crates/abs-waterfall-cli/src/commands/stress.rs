use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use abs_waterfall_core::structured_credit::run_stress_ladder;

use super::DealArgs;

/// Arguments for a CDR stress ladder
#[derive(Args)]
pub struct StressArgs {
    #[command(flatten)]
    pub deal: DealArgs,

    /// Comma-separated CDR multiples, e.g. 0.5,1,2,3
    #[arg(long, value_delimiter = ',')]
    pub multiples: Vec<Decimal>,
}

pub fn run_stress(args: StressArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (template, scenario) = args.deal.resolve()?;
    let multiples = if args.multiples.is_empty() {
        vec![dec!(0.5), dec!(1), dec!(2), dec!(3)]
    } else {
        args.multiples
    };

    let result = run_stress_ladder(&template, &scenario, &multiples)?;
    Ok(serde_json::to_value(result)?)
}
