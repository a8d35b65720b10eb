//! Scorer - weighted combination of normalized features
//!
//! raw = sum(weight * normalized value), which lies in [floor, ceiling] of the
//! weight table. It is rescaled linearly onto 0-1000, rounded, then clamped.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::scoring::types::{NormalizedMetrics, WalletScore, MAX_SCORE, MIN_SCORE};
use crate::scoring::weights::ScoringWeights;

/// Scores normalized wallets with a validated weight table
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    floor: f64,
    span: f64,
}

impl Scorer {
    /// Create a scorer, rejecting an invalid weight table
    pub fn new(weights: ScoringWeights) -> Result<Self> {
        weights.validate()?;
        let floor = weights.floor();
        let span = weights.ceiling() - floor;
        Ok(Self { weights, floor, span })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Weighted sum before rescaling
    pub fn raw(&self, normalized: &NormalizedMetrics) -> f64 {
        self.weights
            .weights
            .iter()
            .map(|e| e.weight * normalized.get(e.feature))
            .sum()
    }

    /// Score a single wallet
    pub fn score_one(&self, normalized: &NormalizedMetrics) -> WalletScore {
        let unit = (self.raw(normalized) - self.floor) / self.span;
        let scaled = (unit * MAX_SCORE as f64).round();
        let score = if scaled.is_nan() {
            MIN_SCORE
        } else {
            scaled.clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u32
        };

        WalletScore {
            wallet_id: normalized.wallet_id.clone(),
            score,
        }
    }

    /// Score every wallet in the batch
    pub fn score(&self, normalized: &BTreeMap<String, NormalizedMetrics>) -> BTreeMap<String, WalletScore> {
        let scores: BTreeMap<String, WalletScore> = normalized
            .iter()
            .map(|(id, n)| (id.clone(), self.score_one(n)))
            .collect();

        debug!(
            wallets = scores.len(),
            weights = %self.weights.version,
            "Scored wallets"
        );

        scores
    }
}

impl Default for Scorer {
    fn default() -> Self {
        let weights = ScoringWeights::default();
        let floor = weights.floor();
        let span = weights.ceiling() - floor;
        Self { weights, floor, span }
    }
}

/// Score a batch with the built-in weight table
pub fn score(normalized: &BTreeMap<String, NormalizedMetrics>) -> BTreeMap<String, WalletScore> {
    Scorer::default().score(normalized)
}
