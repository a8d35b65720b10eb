//! Aggregator - raw per-wallet metrics
//!
//! Groups a batch of transaction records by wallet and computes:
//! - USD totals per action (deposit, borrow, repay, redeem)
//! - Liquidation and transaction counts
//! - Distinct active calendar days (UTC) and distinct assets touched
//!
//! Invalid records are rejected and reported, never folded into a wallet.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::scoring::types::{Action, RejectedRecord, TransactionRecord, WalletMetrics};

/// Output of one aggregation pass
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// One entry per distinct accepted wallet, ordered by wallet id
    pub metrics: BTreeMap<String, WalletMetrics>,
    /// Records refused, indexed by their position in the input slice
    pub rejected: Vec<RejectedRecord>,
}

impl Aggregation {
    pub fn wallet_count(&self) -> usize {
        self.metrics.len()
    }
}

/// Running totals for a single wallet
#[derive(Default)]
struct WalletAccumulator<'a> {
    deposited: f64,
    borrowed: f64,
    repaid: f64,
    redeemed: f64,
    liquidations: u32,
    tx_count: u32,
    days: HashSet<NaiveDate>,
    assets: HashSet<&'a str>,
}

impl<'a> WalletAccumulator<'a> {
    /// Fold a record in. A record that would overflow a USD total is
    /// refused and leaves the accumulator untouched.
    fn push(&mut self, record: &'a TransactionRecord) -> std::result::Result<(), RecordError> {
        if record.action == Action::Liquidation {
            self.liquidations += 1;
        } else {
            let total = match record.action {
                Action::Deposit => &mut self.deposited,
                Action::Borrow => &mut self.borrowed,
                Action::Repay => &mut self.repaid,
                _ => &mut self.redeemed,
            };
            let sum = *total + record.usd_value;
            if !sum.is_finite() {
                return Err(RecordError::TotalOverflow {
                    action: record.action.as_str(),
                });
            }
            *total = sum;
        }

        self.tx_count += 1;
        self.days.insert(record.timestamp.date_naive());
        self.assets.insert(record.asset_symbol.as_str());
        Ok(())
    }

    fn finish(self, wallet_id: String) -> WalletMetrics {
        WalletMetrics {
            wallet_id,
            total_usd_deposited: self.deposited,
            total_usd_borrowed: self.borrowed,
            total_usd_repaid: self.repaid,
            total_usd_redeemed: self.redeemed,
            num_liquidations: self.liquidations,
            tx_count: self.tx_count,
            active_days: self.days.len() as u32,
            asset_diversity: self.assets.len() as u32,
        }
    }
}

/// Aggregate a batch of records into per-wallet metrics
pub fn aggregate(records: &[TransactionRecord]) -> Aggregation {
    let mut by_wallet: BTreeMap<&str, WalletAccumulator<'_>> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let outcome = record.validate().and_then(|()| {
            by_wallet
                .entry(record.wallet_id.as_str())
                .or_default()
                .push(record)
        });

        if let Err(reason) = outcome {
            warn!(index, wallet = %record.wallet_id, %reason, "Rejecting transaction record");
            rejected.push(RejectedRecord {
                index,
                wallet_id: Some(record.wallet_id.clone()).filter(|w| !w.trim().is_empty()),
                reason,
            });
        }
    }

    let metrics: BTreeMap<String, WalletMetrics> = by_wallet
        .into_iter()
        .map(|(wallet, acc)| (wallet.to_string(), acc.finish(wallet.to_string())))
        .collect();

    debug!(
        records = records.len(),
        wallets = metrics.len(),
        rejected = rejected.len(),
        "Aggregated wallet metrics"
    );

    Aggregation { metrics, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(wallet: &str, action: Action, asset: &str, usd: f64, day: u32, hour: u32) -> TransactionRecord {
        TransactionRecord {
            wallet_id: wallet.to_string(),
            action,
            asset_symbol: asset.to_string(),
            usd_value: usd,
            timestamp: Utc.with_ymd_and_hms(2021, 8, day, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_aggregate_single_wallet() {
        let records = vec![
            record("0xa", Action::Deposit, "USDC", 1000.0, 1, 9),
            record("0xa", Action::Deposit, "WETH", 500.0, 1, 18),
            record("0xa", Action::Borrow, "DAI", 400.0, 2, 10),
            record("0xa", Action::Repay, "DAI", 300.0, 5, 10),
            record("0xa", Action::Redeem, "USDC", 200.0, 6, 10),
            record("0xa", Action::Liquidation, "WETH", 0.0, 7, 10),
        ];

        let agg = aggregate(&records);
        assert_eq!(agg.wallet_count(), 1);
        assert!(agg.rejected.is_empty());

        let m = &agg.metrics["0xa"];
        assert!((m.total_usd_deposited - 1500.0).abs() < 1e-9);
        assert!((m.total_usd_borrowed - 400.0).abs() < 1e-9);
        assert!((m.total_usd_repaid - 300.0).abs() < 1e-9);
        assert!((m.total_usd_redeemed - 200.0).abs() < 1e-9);
        assert_eq!(m.num_liquidations, 1);
        assert_eq!(m.tx_count, 6);
        // Aug 1 counted once despite two records
        assert_eq!(m.active_days, 5);
        assert_eq!(m.asset_diversity, 3);
    }

    #[test]
    fn test_aggregate_partitions_wallets() {
        let records = vec![
            record("0xb", Action::Deposit, "USDC", 10.0, 1, 0),
            record("0xa", Action::Deposit, "USDC", 20.0, 1, 0),
            record("0xb", Action::Borrow, "USDC", 5.0, 2, 0),
        ];

        let agg = aggregate(&records);
        let wallets: Vec<_> = agg.metrics.keys().cloned().collect();
        assert_eq!(wallets, vec!["0xa".to_string(), "0xb".to_string()]);
        assert_eq!(agg.metrics["0xb"].tx_count, 2);
        assert_eq!(agg.metrics["0xa"].tx_count, 1);
    }

    #[test]
    fn test_aggregate_rejects_bad_records() {
        let records = vec![
            record("0xa", Action::Deposit, "USDC", 10.0, 1, 0),
            record("0xa", Action::Deposit, "USDC", -5.0, 1, 0),
            record("", Action::Deposit, "USDC", 5.0, 1, 0),
            record("0xc", Action::Borrow, "USDC", f64::INFINITY, 1, 0),
        ];

        let agg = aggregate(&records);
        assert_eq!(agg.wallet_count(), 1);
        assert_eq!(agg.rejected.len(), 3);
        assert_eq!(agg.rejected[0].index, 1);
        assert_eq!(agg.rejected[0].reason, RecordError::NegativeValue(-5.0));
        assert_eq!(agg.rejected[1].wallet_id, None);
        assert_eq!(agg.rejected[2].reason, RecordError::NonFiniteValue);

        // Rejected value never leaks into the totals
        assert!((agg.metrics["0xa"].total_usd_deposited - 10.0).abs() < 1e-9);
        assert!(!agg.metrics.contains_key("0xc"));
    }

    #[test]
    fn test_aggregate_rejects_total_overflow() {
        let records = vec![
            record("0xa", Action::Deposit, "USDC", 1e308, 1, 0),
            record("0xa", Action::Borrow, "DAI", 1e308, 1, 0),
            record("0xa", Action::Borrow, "DAI", 1e308, 2, 0),
            record("0xa", Action::Repay, "DAI", 1e308, 3, 0),
            record("0xa", Action::Repay, "DAI", 1e308, 4, 0),
            record("0xb", Action::Deposit, "USDC", 10.0, 1, 0),
        ];

        let agg = aggregate(&records);
        assert_eq!(agg.rejected.len(), 2);
        assert_eq!(agg.rejected[0].index, 2);
        assert_eq!(agg.rejected[0].reason, RecordError::TotalOverflow { action: "borrow" });
        assert_eq!(agg.rejected[1].index, 4);
        assert_eq!(agg.rejected[1].reason, RecordError::TotalOverflow { action: "repay" });

        // Refused records leave no trace on the wallet
        let m = &agg.metrics["0xa"];
        assert_eq!(m.total_usd_borrowed, 1e308);
        assert_eq!(m.total_usd_repaid, 1e308);
        assert_eq!(m.tx_count, 3);
        assert_eq!(m.active_days, 2);
        assert!((m.repayment_ratio() - 1.0).abs() < 1e-12);
        assert!((m.borrow_to_deposit() - 1.0).abs() < 1e-12);
        for feature in crate::scoring::types::Feature::ALL {
            assert!(m.feature(feature).is_finite(), "{} is not finite", feature);
        }
    }

    #[test]
    fn test_aggregate_empty_batch() {
        let agg = aggregate(&[]);
        assert!(agg.metrics.is_empty());
        assert!(agg.rejected.is_empty());
    }

    #[test]
    fn test_every_wallet_has_positive_counts() {
        let records = vec![
            record("0xa", Action::Liquidation, "WETH", 0.0, 3, 0),
            record("0xb", Action::Repay, "DAI", 1.0, 4, 0),
        ];
        let agg = aggregate(&records);
        for m in agg.metrics.values() {
            assert!(m.tx_count >= 1);
            assert!(m.active_days >= 1);
            assert!(m.asset_diversity >= 1);
        }
    }
}
