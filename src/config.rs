//! Engine settings
//!
//! Small knobs for the evaluation engine, loaded from defaults with an
//! environment overlay (`BINDINGS_*`). Scripts are untrusted, so the default
//! backend always runs under a step budget.

use serde::Deserialize;

/// Default fuel for the metered sandbox backend
pub const DEFAULT_STEP_BUDGET: u64 = 100_000;

/// Tunable evaluation settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Maximum AST nodes a single evaluation may visit before failing with `TimedOut`
    pub step_budget: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

impl EngineSettings {
    /// Load settings from defaults overridden by `BINDINGS_*` environment variables
    ///
    /// Example: `BINDINGS_STEP_BUDGET=5000` lowers the budget for constrained hosts.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("step_budget", DEFAULT_STEP_BUDGET as i64)?
            .add_source(config::Environment::with_prefix("BINDINGS"))
            .build()?
            .try_deserialize()
    }
}
