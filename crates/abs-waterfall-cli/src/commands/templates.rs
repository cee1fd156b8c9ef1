use serde_json::Value;

use abs_waterfall_core::structured_credit::templates::list_templates;

pub fn run_templates() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(list_templates())?)
}
