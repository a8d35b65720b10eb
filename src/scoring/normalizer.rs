//! Normalizer - population min-max scaling
//!
//! Two passes over the batch:
//! 1. Collect per-feature min/max across every wallet
//! 2. Rescale each wallet's features into 0.0-1.0
//!
//! A feature that is constant across the population maps to 0.5 for everyone.
//! No wallet is scaled until all bounds are known.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::scoring::types::{Feature, NormalizedMetrics, WalletMetrics};

/// Normalized value used when a feature has no spread in the batch
pub const DEGENERATE_VALUE: f64 = 0.5;

/// Upper clip applied to a raw feature before scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCap {
    pub feature: Feature,
    pub max: f64,
}

/// Monotonic per-feature transforms applied before bounds are collected.
///
/// Caps are applied first, then `ln(1 + x)` for log-scaled features.
/// The default policy leaves every feature untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    #[serde(default)]
    pub caps: Vec<FeatureCap>,
    #[serde(default)]
    pub log_scaled: Vec<Feature>,
}

impl NormalizationPolicy {
    /// Validate caps
    pub fn validate(&self) -> std::result::Result<(), String> {
        for cap in &self.caps {
            if !cap.max.is_finite() || cap.max <= 0.0 {
                return Err(format!("cap for {} must be positive, got {}", cap.feature, cap.max));
            }
        }
        Ok(())
    }

    /// Apply the configured transforms to one raw value
    pub fn transform(&self, feature: Feature, raw: f64) -> f64 {
        let mut value = raw;
        if !value.is_finite() {
            // NaN carries no signal, +inf saturates
            value = if value == f64::INFINITY { f64::MAX } else { 0.0 };
        }
        if let Some(cap) = self.caps.iter().find(|c| c.feature == feature) {
            value = value.min(cap.max);
        }
        if self.log_scaled.contains(&feature) {
            value = value.max(0.0).ln_1p();
        }
        value
    }
}

/// Observed range of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureBounds {
    pub min: f64,
    pub max: f64,
}

impl FeatureBounds {
    fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// True when the whole population shares one value
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Scale a value into 0.0-1.0 against these bounds
    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return DEGENERATE_VALUE;
        }
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// Per-feature bounds for a whole batch
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationBounds {
    bounds: [FeatureBounds; 9],
}

impl PopulationBounds {
    /// Collect bounds over every wallet. Returns None for an empty population.
    pub fn collect<'a>(
        wallets: impl IntoIterator<Item = &'a WalletMetrics>,
        policy: &NormalizationPolicy,
    ) -> Option<Self> {
        let mut bounds = [FeatureBounds::empty(); 9];
        let mut seen = 0usize;

        for wallet in wallets {
            seen += 1;
            for (slot, feature) in bounds.iter_mut().zip(Feature::ALL) {
                slot.include(policy.transform(feature, wallet.feature(feature)));
            }
        }

        (seen > 0).then_some(Self { bounds })
    }

    pub fn get(&self, feature: Feature) -> FeatureBounds {
        let idx = Feature::ALL
            .iter()
            .position(|f| *f == feature)
            .unwrap_or_default();
        self.bounds[idx]
    }

    /// Features with no spread in this batch
    pub fn degenerate_features(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_degenerate())
            .collect()
    }

    /// Normalize one wallet against these bounds
    pub fn apply(&self, wallet: &WalletMetrics, policy: &NormalizationPolicy) -> NormalizedMetrics {
        NormalizedMetrics::from_fn(wallet.wallet_id.clone(), |feature| {
            self.get(feature)
                .scale(policy.transform(feature, wallet.feature(feature)))
        })
    }
}

/// Normalize with plain min-max scaling
pub fn normalize(metrics: &BTreeMap<String, WalletMetrics>) -> BTreeMap<String, NormalizedMetrics> {
    normalize_with(metrics, &NormalizationPolicy::default())
}

/// Normalize with a transform policy
pub fn normalize_with(
    metrics: &BTreeMap<String, WalletMetrics>,
    policy: &NormalizationPolicy,
) -> BTreeMap<String, NormalizedMetrics> {
    let Some(bounds) = PopulationBounds::collect(metrics.values(), policy) else {
        return BTreeMap::new();
    };

    let degenerate = bounds.degenerate_features();
    if !degenerate.is_empty() {
        debug!(features = ?degenerate, "Constant features fall back to midpoint");
    }

    metrics
        .iter()
        .map(|(id, wallet)| (id.clone(), bounds.apply(wallet, policy)))
        .collect()
}
