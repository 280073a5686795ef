use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueResult {
    pub fair_odds: f64,
    pub odds: f64,
    pub mispricing: f64,
    pub implied_p: f64,
    pub edge: f64,
    pub ev: f64,
    pub ev_per_prob: f64,
}
