//! Stat-family handler table (§9: "a mapping from stat -> handler" replaces
//! dispatch by class name). Each stat family carries a natural value range
//! (used to reject nonsensical projected means) and a default coefficient
//! of variation used when a path lacks enough history to estimate its own.

use crate::domain::Stat;

/// Which conjugate family the Bayesian-update path (§4.6 path 5) assumes
/// when shrinking a stat's recent mean toward its season prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorFamily {
    /// Low, count-like stats (threes, blocks, steals) that cluster near
    /// zero and can't exceed a realistic per-game ceiling: the posterior
    /// mean is kept inside `natural_range`, matching a Beta posterior's
    /// bounded support. The game log here carries made counts, not
    /// makes/attempts pairs, so this isn't a full Beta-Binomial fit — it's
    /// the boundedness assumption that distinguishes Beta from Normal.
    Beta,
    /// Point totals and other stats with enough magnitude that an
    /// unbounded Gaussian posterior is the natural fit.
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatHandler {
    pub natural_range: (f64, f64),
    pub default_cv: f64,
    pub prior_family: PriorFamily,
}

pub fn handler(stat: Stat) -> StatHandler {
    match stat {
        Stat::Points => StatHandler { natural_range: (0.0, 200.0), default_cv: 0.25, prior_family: PriorFamily::Normal },
        Stat::Rebounds => StatHandler { natural_range: (0.0, 40.0), default_cv: 0.35, prior_family: PriorFamily::Normal },
        Stat::Assists => StatHandler { natural_range: (0.0, 30.0), default_cv: 0.35, prior_family: PriorFamily::Normal },
        Stat::Threes => StatHandler { natural_range: (0.0, 15.0), default_cv: 0.50, prior_family: PriorFamily::Beta },
        Stat::Blocks => StatHandler { natural_range: (0.0, 15.0), default_cv: 0.60, prior_family: PriorFamily::Beta },
        Stat::Steals => StatHandler { natural_range: (0.0, 15.0), default_cv: 0.55, prior_family: PriorFamily::Beta },
    }
}

impl StatHandler {
    pub fn in_range(&self, value: f64) -> bool {
        value.is_finite() && value >= self.natural_range.0 && value <= self.natural_range.1
    }
}

/// Welford's online mean/variance, used to derive the coefficient of
/// variation feeding both the projection engine's Normal approximation and
/// the confidence engine's volatility penalty.
#[derive(Debug, Default, Clone, Copy)]
pub struct RollingStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RollingStats {
    pub fn from_values(values: &[f64]) -> Self {
        let mut stats = Self::default();
        for &v in values {
            stats.update(v);
        }
        stats
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    /// Coefficient of variation; falls back to `default_cv` when there isn't
    /// enough history or the mean is ~0 to divide by.
    pub fn coefficient_of_variation(&self, default_cv: f64) -> f64 {
        if self.count < 2 || self.mean.abs() < 1e-9 {
            return default_cv;
        }
        (self.std_dev() / self.mean).abs()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
