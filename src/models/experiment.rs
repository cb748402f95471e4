use serde::{Deserialize, Serialize};

use super::UserId;

/// Experiment arm a user is bucketed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Weighted ranking only
    Control,
    /// Weighted ranking re-ranked by the contextual bandit
    Treatment,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Control => "control",
            Variant::Treatment => "treatment",
        }
    }
}

/// Exposure row written for every bucketed recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub user_id: UserId,
    pub experiment_name: String,
    pub variant: Variant,
    pub model_version: String,
    pub metrics: serde_json::Value,
}
