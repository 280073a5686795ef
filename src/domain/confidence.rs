use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub base: f64,
    pub after_shrinkage: f64,
    pub final_score: f64,
    /// Reason -> signed adjustment, in application order (§4.7).
    pub penalties: BTreeMap<String, f64>,
    pub risk: RiskClass,
    pub multi_safe: bool,
}

impl ConfidenceResult {
    pub fn high_severity_penalty_count(&self) -> usize {
        self.penalties.values().filter(|v| **v <= -10.0).count()
    }
}
