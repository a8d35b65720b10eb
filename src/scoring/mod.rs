//! Wallet Scoring Module
//!
//! Deterministic batch scoring of lending-protocol wallets:
//! - Aggregation of transaction records into per-wallet metrics
//! - Population min-max normalization
//! - Signed weighted scoring onto 0-1000

pub mod aggregator;
pub mod normalizer;
pub mod pipeline;
pub mod scorer;
pub mod types;
pub mod weights;

pub use aggregator::{aggregate, Aggregation};
pub use normalizer::{normalize, normalize_with, FeatureCap, NormalizationPolicy, PopulationBounds};
pub use pipeline::{BatchResult, MalformedPolicy, Pipeline};
pub use scorer::{score, Scorer};
pub use types::{
    Action, Feature, NormalizedMetrics, Polarity, RejectedRecord, TransactionRecord, WalletMetrics,
    WalletScore, MAX_SCORE, MIN_SCORE,
};
pub use weights::{ScoringWeights, WeightEntry};
