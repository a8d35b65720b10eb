//! Versioned scoring weight table
//!
//! Weights are signed: reliability signals push the score up, risk signals
//! pull it down. Absolute weights must sum to `WEIGHT_TOTAL` so the raw
//! weighted sum always spans a range of exactly that width.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::scoring::types::{Feature, Polarity};

/// Required sum of absolute weights
pub const WEIGHT_TOTAL: f64 = 1.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Version tag of the built-in weight table
pub const DEFAULT_WEIGHTS_VERSION: &str = "v1";

/// One feature's contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub feature: Feature,
    pub weight: f64,
}

impl WeightEntry {
    pub fn new(feature: Feature, weight: f64) -> Self {
        Self { feature, weight }
    }
}

/// Named set of feature weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_entries")]
    pub weights: Vec<WeightEntry>,
}

fn default_version() -> String {
    DEFAULT_WEIGHTS_VERSION.to_string()
}

fn default_entries() -> Vec<WeightEntry> {
    vec![
        WeightEntry::new(Feature::RepaymentRatio, 0.25),
        WeightEntry::new(Feature::TotalUsdDeposited, 0.15),
        WeightEntry::new(Feature::ActiveDays, 0.15),
        WeightEntry::new(Feature::AssetDiversity, 0.10),
        WeightEntry::new(Feature::BorrowToDeposit, -0.15),
        WeightEntry::new(Feature::NumLiquidations, -0.20),
    ]
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            version: default_version(),
            weights: default_entries(),
        }
    }
}

impl ScoringWeights {
    /// Weight for a feature (0.0 when not listed)
    pub fn weight(&self, feature: Feature) -> f64 {
        self.weights
            .iter()
            .find(|e| e.feature == feature)
            .map(|e| e.weight)
            .unwrap_or(0.0)
    }

    /// Lowest reachable raw sum: every negative feature at 1.0, every positive at 0.0
    pub fn floor(&self) -> f64 {
        self.weights.iter().map(|e| e.weight.min(0.0)).sum()
    }

    /// Highest reachable raw sum
    pub fn ceiling(&self) -> f64 {
        self.weights.iter().map(|e| e.weight.max(0.0)).sum()
    }

    /// Sum of absolute weights
    pub fn total(&self) -> f64 {
        self.weights.iter().map(|e| e.weight.abs()).sum()
    }

    /// Check the table is usable by the scorer
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidWeights {
            version: self.version.clone(),
            reason,
        };

        if self.version.trim().is_empty() {
            return Err(invalid("version must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for entry in &self.weights {
            if !entry.weight.is_finite() {
                return Err(invalid(format!("{} weight is not finite", entry.feature)));
            }
            if !seen.insert(entry.feature) {
                return Err(invalid(format!("{} listed more than once", entry.feature)));
            }
            match entry.feature.polarity() {
                Some(Polarity::Positive) if entry.weight < 0.0 => {
                    return Err(invalid(format!(
                        "{} is a reliability signal and cannot have negative weight {}",
                        entry.feature, entry.weight
                    )));
                }
                Some(Polarity::Negative) if entry.weight > 0.0 => {
                    return Err(invalid(format!(
                        "{} is a risk signal and cannot have positive weight {}",
                        entry.feature, entry.weight
                    )));
                }
                _ => {}
            }
        }

        let total = self.total();
        if (total - WEIGHT_TOTAL).abs() > WEIGHT_TOLERANCE {
            return Err(invalid(format!(
                "absolute weights must sum to {}, got {:.6}",
                WEIGHT_TOTAL, total
            )));
        }

        Ok(())
    }

    /// Human-readable table
    pub fn display(&self) -> String {
        let mut out = format!("Weight table {}:\n", self.version);
        for entry in &self.weights {
            out.push_str(&format!("  {:<20} {:+.3}\n", entry.feature.as_str(), entry.weight));
        }
        out.push_str(&format!(
            "  raw range: [{:+.3}, {:+.3}]\n",
            self.floor(),
            self.ceiling()
        ));
        out
    }
}
