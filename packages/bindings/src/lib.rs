use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;

use abs_waterfall_core::structured_credit::templates::{self, find_template};
use abs_waterfall_core::structured_credit::{DealTemplate, ScenarioParams};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Accept either a built-in template id or a full template JSON document.
fn load_template(template: &str) -> NapiResult<DealTemplate> {
    let trimmed = template.trim();
    if trimmed.starts_with('{') {
        DealTemplate::from_json(trimmed).map_err(to_napi_error)
    } else {
        find_template(trimmed).map_err(to_napi_error)
    }
}

/// An empty scenario string means the template's base case.
fn load_scenario(template: &DealTemplate, scenario_json: &str) -> NapiResult<ScenarioParams> {
    if scenario_json.trim().is_empty() {
        return Ok(template.base_case());
    }
    serde_json::from_str(scenario_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[napi]
pub fn list_templates() -> NapiResult<String> {
    serde_json::to_string(&templates::list_templates()).map_err(to_napi_error)
}

#[napi]
pub fn get_template(template_id: String) -> NapiResult<String> {
    let template = find_template(&template_id).map_err(to_napi_error)?;
    serde_json::to_string(&template).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

#[napi]
pub fn run_waterfall(template: String, scenario_json: String) -> NapiResult<String> {
    let deal = load_template(&template)?;
    let scenario = load_scenario(&deal, &scenario_json)?;
    let output = abs_waterfall_core::structured_credit::run_waterfall(&deal, &scenario)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Breakeven and stress
// ---------------------------------------------------------------------------

/// Breakeven CDR for one tranche as a decimal string, or `null` when the
/// tranche survives the search ceiling.
#[napi]
pub fn find_breakeven_cdr(
    template: String,
    scenario_json: String,
    tranche_index: u32,
) -> NapiResult<String> {
    let deal = load_template(&template)?;
    let scenario = load_scenario(&deal, &scenario_json)?;
    let cdr = abs_waterfall_core::structured_credit::find_breakeven_cdr(
        &deal,
        &scenario,
        tranche_index as usize,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&cdr).map_err(to_napi_error)
}

#[napi]
pub fn breakeven_table(template: String, scenario_json: String) -> NapiResult<String> {
    let deal = load_template(&template)?;
    let scenario = load_scenario(&deal, &scenario_json)?;
    let output = abs_waterfall_core::structured_credit::breakeven_table(&deal, &scenario)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// `multiples_json` is a JSON array of CDR multiples, e.g. `["0.5", "1", "2"]`.
#[napi]
pub fn stress_ladder(
    template: String,
    scenario_json: String,
    multiples_json: String,
) -> NapiResult<String> {
    let deal = load_template(&template)?;
    let scenario = load_scenario(&deal, &scenario_json)?;
    let multiples: Vec<Decimal> = serde_json::from_str(&multiples_json).map_err(to_napi_error)?;
    let output =
        abs_waterfall_core::structured_credit::run_stress_ladder(&deal, &scenario, &multiples)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
