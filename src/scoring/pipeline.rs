//! Batch pipeline: records -> metrics -> normalized -> scores
//!
//! Stages run strictly in order. Normalization bounds are computed over the
//! whole aggregated batch before any wallet is scored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scoring::aggregator::aggregate;
use crate::scoring::normalizer::{normalize_with, NormalizationPolicy};
use crate::scoring::scorer::Scorer;
use crate::scoring::types::{
    NormalizedMetrics, RejectedRecord, TransactionRecord, WalletMetrics, WalletScore,
};
use crate::scoring::weights::ScoringWeights;

/// What to do when a record is malformed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Drop the record, report it, keep going
    #[default]
    Skip,
    /// Fail the whole batch on the first malformed record
    Abort,
}

/// Complete result of one batch run
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub weights_version: String,
    /// Records handed to the pipeline, including rejected ones
    pub records_seen: usize,
    pub metrics: BTreeMap<String, WalletMetrics>,
    pub normalized: BTreeMap<String, NormalizedMetrics>,
    pub scores: BTreeMap<String, WalletScore>,
    pub rejected: Vec<RejectedRecord>,
}

impl BatchResult {
    pub fn wallet_count(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Configured scoring pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    scorer: Scorer,
    normalization: NormalizationPolicy,
    malformed_policy: MalformedPolicy,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            scorer: Scorer::default(),
            normalization: NormalizationPolicy::default(),
            malformed_policy: MalformedPolicy::Skip,
        }
    }
}

impl Pipeline {
    /// Build a pipeline, validating the weight table and normalization policy
    pub fn new(
        weights: ScoringWeights,
        normalization: NormalizationPolicy,
        malformed_policy: MalformedPolicy,
    ) -> Result<Self> {
        normalization.validate().map_err(Error::Config)?;
        Ok(Self {
            scorer: Scorer::new(weights)?,
            normalization,
            malformed_policy,
        })
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Run on already-typed records
    pub fn run(&self, records: &[TransactionRecord]) -> Result<BatchResult> {
        self.run_with_rejections(records, Vec::new(), records.len())
    }

    /// Run on records that already went through ingest.
    ///
    /// `upstream_rejected` are records the ingest layer refused; they count
    /// against the malformed policy the same way as aggregator rejections.
    /// `records_seen` is the size of the raw batch before ingest.
    pub fn run_with_rejections(
        &self,
        records: &[TransactionRecord],
        upstream_rejected: Vec<RejectedRecord>,
        records_seen: usize,
    ) -> Result<BatchResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch", run_id = %run_id);
        let _guard = span.enter();

        self.check_policy(&upstream_rejected)?;

        let aggregation = aggregate(records);
        self.check_policy(&aggregation.rejected)?;

        let mut rejected = upstream_rejected;
        rejected.extend(aggregation.rejected);

        if aggregation.metrics.is_empty() {
            info!(records = records_seen, rejected = rejected.len(), "Empty batch, nothing to score");
        }

        let normalized = normalize_with(&aggregation.metrics, &self.normalization);
        let scores = self.scorer.score(&normalized);

        info!(
            records = records_seen,
            wallets = scores.len(),
            rejected = rejected.len(),
            weights = %self.scorer.weights().version,
            "Batch scored"
        );

        Ok(BatchResult {
            run_id,
            weights_version: self.scorer.weights().version.clone(),
            records_seen,
            metrics: aggregation.metrics,
            normalized,
            scores,
            rejected,
        })
    }

    fn check_policy(&self, rejected: &[RejectedRecord]) -> Result<()> {
        let Some(first) = rejected.first() else {
            return Ok(());
        };

        match self.malformed_policy {
            MalformedPolicy::Skip => {
                warn!(count = rejected.len(), "Skipping malformed records");
                Ok(())
            }
            MalformedPolicy::Abort => Err(Error::MalformedRecord {
                index: first.index,
                reason: first.reason.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;
    use crate::scoring::types::Action;
    use chrono::{Duration, TimeZone, Utc};

    fn tx(wallet: &str, action: Action, asset: &str, usd: f64, day: i64) -> TransactionRecord {
        TransactionRecord {
            wallet_id: wallet.to_string(),
            action,
            asset_symbol: asset.to_string(),
            usd_value: usd,
            timestamp: Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap() + Duration::days(day),
        }
    }

    /// Wallet with `days` active days, `assets` distinct assets, deposits, borrows, repays
    fn history(
        wallet: &str,
        deposit: f64,
        borrow: f64,
        repay: f64,
        liquidations: usize,
        days: i64,
        assets: usize,
    ) -> Vec<TransactionRecord> {
        let symbols = ["USDC", "WETH", "DAI", "WBTC", "AAVE", "LINK"];
        let mut out = Vec::new();
        for d in 0..days {
            let asset = symbols[(d as usize) % assets];
            out.push(tx(wallet, Action::Deposit, asset, deposit / days as f64, d));
        }
        if borrow > 0.0 {
            out.push(tx(wallet, Action::Borrow, "DAI", borrow, 0));
        }
        if repay > 0.0 {
            out.push(tx(wallet, Action::Repay, "DAI", repay, days - 1));
        }
        for _ in 0..liquidations {
            out.push(tx(wallet, Action::Liquidation, "WETH", 0.0, days - 1));
        }
        out
    }

    #[test]
    fn test_empty_batch() {
        let result = Pipeline::default().run(&[]).unwrap();
        assert!(result.is_empty());
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_single_wallet_midpoint() {
        let records = history("0xsolo", 5000.0, 1000.0, 500.0, 1, 3, 2);
        let result = Pipeline::default().run(&records).unwrap();
        assert_eq!(result.wallet_count(), 1);
        assert_eq!(result.scores["0xsolo"].score, 500);
    }

    #[test]
    fn test_every_wallet_scored_once_and_bounded() {
        let mut records = Vec::new();
        records.extend(history("0xa", 10_000.0, 5_000.0, 5_000.0, 0, 30, 4));
        records.extend(history("0xb", 100.0, 90.0, 10.0, 3, 2, 1));
        records.extend(history("0xc", 2_000.0, 0.0, 0.0, 0, 10, 3));
        records.extend(history("0xd", 0.0, 0.0, 0.0, 0, 1, 1));

        let result = Pipeline::default().run(&records).unwrap();
        assert_eq!(result.wallet_count(), 4);
        for (id, s) in &result.scores {
            assert_eq!(&s.wallet_id, id);
            assert!(s.score <= 1000);
        }
    }

    #[test]
    fn test_idempotent() {
        let mut records = Vec::new();
        records.extend(history("0xa", 10_000.0, 5_000.0, 4_000.0, 0, 12, 3));
        records.extend(history("0xb", 300.0, 250.0, 20.0, 2, 3, 1));
        records.extend(history("0xc", 900.0, 0.0, 0.0, 0, 5, 2));

        let pipeline = Pipeline::default();
        let first = pipeline.run(&records).unwrap();
        let second = pipeline.run(&records).unwrap();
        assert_eq!(first.scores, second.scores);
        assert_ne!(first.run_id, second.run_id);

        let mut reversed = records.clone();
        reversed.reverse();
        let third = pipeline.run(&reversed).unwrap();
        assert_eq!(first.scores, third.scores);
    }

    #[test]
    fn test_strong_wallet_high_but_below_max() {
        let mut records = Vec::new();
        records.extend(history("0xa", 10_000.0, 5_000.0, 5_000.0, 0, 30, 4));
        records.extend(history("0xb", 1_000.0, 200.0, 100.0, 2, 5, 2));
        records.extend(history("0xc", 500.0, 100.0, 25.0, 1, 2, 1));

        let result = Pipeline::default().run(&records).unwrap();
        let a = result.scores["0xa"].score;
        assert!(a > 700, "score was {}", a);
        assert!(a < 1000);
        assert!(a > result.scores["0xb"].score);
        assert!(a > result.scores["0xc"].score);
    }

    #[test]
    fn test_zero_borrow_wallet_ranks_top() {
        let mut records = Vec::new();
        records.extend(history("0xsaver", 1_000.0, 0.0, 0.0, 0, 5, 2));
        records.extend(history("0xlever", 1_000.0, 800.0, 400.0, 0, 5, 2));
        records.extend(history("0xpartial", 1_000.0, 400.0, 300.0, 0, 5, 2));

        let result = Pipeline::default().run(&records).unwrap();
        let saver = result.scores["0xsaver"].score;
        assert!(saver >= result.scores["0xlever"].score);
        assert!(saver >= result.scores["0xpartial"].score);
        assert!((result.metrics["0xsaver"].repayment_ratio() - 1.0).abs() < 1e-12);
        assert_eq!(result.metrics["0xsaver"].borrow_to_deposit(), 0.0);
    }

    #[test]
    fn test_more_repayment_never_lowers_score() {
        let base = |repay: f64| {
            let mut records = Vec::new();
            records.extend(history("0xref_low", 1_000.0, 500.0, 0.0, 0, 4, 2));
            records.extend(history("0xref_high", 1_000.0, 500.0, 500.0, 0, 4, 2));
            records.extend(history("0xsubject", 1_000.0, 500.0, repay, 0, 4, 2));
            Pipeline::default().run(&records).unwrap().scores["0xsubject"].score
        };

        let mut prev = 0;
        for repay in [10.0, 100.0, 250.0, 400.0, 490.0] {
            let s = base(repay);
            assert!(s >= prev);
            prev = s;
        }
    }

    #[test]
    fn test_more_liquidations_never_raise_score() {
        let base = |liquidations: usize| {
            let mut records = Vec::new();
            records.extend(history("0xref_clean", 1_000.0, 500.0, 250.0, 0, 4, 2));
            records.extend(history("0xref_bad", 1_000.0, 500.0, 250.0, 6, 4, 2));
            records.extend(history("0xsubject", 1_000.0, 500.0, 250.0, liquidations, 4, 2));
            Pipeline::default().run(&records).unwrap().scores["0xsubject"].score
        };

        let mut prev = u32::MAX;
        for n in 0..=6 {
            let s = base(n);
            assert!(s <= prev);
            prev = s;
        }
    }

    #[test]
    fn test_skip_policy_reports_rejections() {
        let mut records = history("0xa", 1_000.0, 0.0, 0.0, 0, 2, 1);
        records.push(tx("0xa", Action::Deposit, "USDC", -1.0, 0));
        records.push(tx("0xb", Action::Deposit, "USDC", 10.0, 0));

        let upstream = vec![RejectedRecord {
            index: 99,
            wallet_id: Some("0xz".to_string()),
            reason: RecordError::UnknownAction("swap".to_string()),
        }];

        let result = Pipeline::default()
            .run_with_rejections(&records, upstream, records.len() + 1)
            .unwrap();
        assert_eq!(result.wallet_count(), 2);
        assert_eq!(result.rejected.len(), 2);
        assert_eq!(result.rejected[0].index, 99);
        assert_eq!(result.records_seen, records.len() + 1);
    }

    #[test]
    fn test_abort_policy_fails_batch() {
        let pipeline = Pipeline::new(
            ScoringWeights::default(),
            NormalizationPolicy::default(),
            MalformedPolicy::Abort,
        )
        .unwrap();

        let mut records = history("0xa", 1_000.0, 0.0, 0.0, 0, 2, 1);
        records.push(tx("0xa", Action::Deposit, "USDC", -1.0, 0));

        let err = pipeline.run(&records).unwrap_err();
        match err {
            Error::MalformedRecord { index, reason } => {
                assert_eq!(index, records.len() - 1);
                assert_eq!(reason, RecordError::NegativeValue(-1.0));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_policy_deserialize() {
        let p: MalformedPolicy = serde_json::from_str(r#""abort""#).unwrap();
        assert_eq!(p, MalformedPolicy::Abort);
    }
}
