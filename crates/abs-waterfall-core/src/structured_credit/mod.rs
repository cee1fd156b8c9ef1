//! Structured-credit deals: templates, scenario inputs, the monthly waterfall
//! engine and the analytics layered on top of it.

pub mod breakeven;
pub mod deal;
pub mod engine;
pub mod metrics;
pub mod scenario;
pub mod stress;
pub mod templates;

pub use breakeven::{breakeven_table, find_breakeven_cdr, BreakevenResult};
pub use deal::{DealTemplate, Rating, TrancheSpec, TriggerKind, TriggerSpec};
pub use engine::{run_waterfall, CashFlowRecord, WaterfallOutput};
pub use metrics::TrancheSummary;
pub use scenario::ScenarioParams;
pub use stress::run_stress_ladder;
