//! Engine configuration.

use serde::Deserialize;

/// Tunables for the access engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// How far ahead a due date may be set, in months (default: 12).
    pub due_date_horizon_months: u32,
    /// Maximum number of audit entries returned by a listing, newest
    /// first (default: 100).
    pub audit_list_limit: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            due_date_horizon_months: 12,
            audit_list_limit: 100,
        }
    }
}
