pub mod breakeven;
pub mod stress;
pub mod templates;
pub mod waterfall;

use clap::Args;
use rust_decimal::Decimal;

use abs_waterfall_core::structured_credit::templates::find_template;
use abs_waterfall_core::structured_credit::{DealTemplate, ScenarioParams};

use crate::input;
use crate::market_data::{self, HttpRateSource};

/// Deal and scenario selection shared by every analysis command.
#[derive(Args)]
pub struct DealArgs {
    /// Built-in template id (see `absw templates`)
    #[arg(long, conflicts_with = "template_file")]
    pub template: Option<String>,

    /// Path to a deal template JSON file
    #[arg(long)]
    pub template_file: Option<String>,

    /// Path to a scenario JSON file; otherwise stdin, otherwise the template base case
    #[arg(long)]
    pub scenario: Option<String>,

    /// Annual CPR, percent
    #[arg(long)]
    pub cpr: Option<Decimal>,

    /// Annual CDR, percent
    #[arg(long)]
    pub cdr: Option<Decimal>,

    /// Recovery on defaults, percent
    #[arg(long)]
    pub recovery: Option<Decimal>,

    /// Projection length in months
    #[arg(long)]
    pub months: Option<u32>,

    /// Floating-rate index, percent
    #[arg(long)]
    pub base_rate: Option<Decimal>,

    /// Share of excess spread released to the residual while pro-rata, percent
    #[arg(long)]
    pub equity_share: Option<Decimal>,

    /// Fetch the base rate from a market-data endpoint (falls back on failure)
    #[arg(long, conflicts_with = "base_rate")]
    pub rate_url: Option<String>,
}

impl DealArgs {
    /// Resolve the template and the scenario with every override applied.
    pub fn resolve(&self) -> Result<(DealTemplate, ScenarioParams), Box<dyn std::error::Error>> {
        let template = self.load_template()?;

        let mut scenario: ScenarioParams = if let Some(ref path) = self.scenario {
            input::file::read_json(path)?
        } else if let Some(data) = input::stdin::read_stdin()? {
            serde_json::from_value(data)?
        } else {
            tracing::debug!(template = %template.id, "using template base case");
            template.base_case()
        };

        if let Some(cpr) = self.cpr {
            scenario.cpr = cpr;
        }
        if let Some(cdr) = self.cdr {
            scenario.cdr = cdr;
        }
        if let Some(recovery) = self.recovery {
            scenario.recovery = recovery;
        }
        if let Some(months) = self.months {
            scenario.projection_months = months;
        }
        if let Some(share) = self.equity_share {
            scenario.equity_share_pct = share;
        }
        if let Some(rate) = self.base_rate {
            scenario.base_rate = rate;
        }
        if let Some(ref url) = self.rate_url {
            let source = HttpRateSource::new(url)?;
            scenario.base_rate = market_data::base_rate_or(&source, scenario.base_rate);
        }

        Ok((template, scenario))
    }

    fn load_template(&self) -> Result<DealTemplate, Box<dyn std::error::Error>> {
        match (&self.template, &self.template_file) {
            (Some(id), _) => Ok(find_template(id)?),
            (None, Some(path)) => {
                let template: DealTemplate = input::file::read_json(path)?;
                template.validate()?;
                Ok(template)
            }
            (None, None) => Err("--template <id> or --template-file <file.json> required".into()),
        }
    }
}
