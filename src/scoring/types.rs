//! Core data types for the scoring pipeline
//!
//! Records flow through three shapes:
//! - `TransactionRecord`: one lending-protocol action, as ingested
//! - `WalletMetrics`: raw per-wallet aggregates
//! - `NormalizedMetrics`: the same features rescaled to 0.0-1.0 across the batch
//!
//! and end as a `WalletScore` in 0-1000.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;

/// Lowest possible wallet score
pub const MIN_SCORE: u32 = 0;
/// Highest possible wallet score
pub const MAX_SCORE: u32 = 1000;

/// Lending protocol action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Deposit,
    Borrow,
    Repay,
    Redeem,
    Liquidation,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Deposit => "deposit",
            Action::Borrow => "borrow",
            Action::Repay => "repay",
            Action::Redeem => "redeem",
            Action::Liquidation => "liquidation",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = RecordError;

    /// Accepts both the short names and the Aave event names
    /// (`redeemunderlying`, `liquidationcall`), case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Action::Deposit),
            "borrow" => Ok(Action::Borrow),
            "repay" => Ok(Action::Repay),
            "redeem" | "redeemunderlying" => Ok(Action::Redeem),
            "liquidation" | "liquidationcall" => Ok(Action::Liquidation),
            _ => Err(RecordError::UnknownAction(s.to_string())),
        }
    }
}

/// A single wallet action, already priced in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub wallet_id: String,
    pub action: Action,
    pub asset_symbol: String,
    pub usd_value: f64,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Check the record can be aggregated without corrupting wallet metrics
    pub fn validate(&self) -> std::result::Result<(), RecordError> {
        if self.wallet_id.trim().is_empty() {
            return Err(RecordError::EmptyWallet);
        }
        if !self.usd_value.is_finite() {
            return Err(RecordError::NonFiniteValue);
        }
        if self.usd_value < 0.0 {
            return Err(RecordError::NegativeValue(self.usd_value));
        }
        Ok(())
    }
}

/// A record the pipeline refused, with its position in the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub wallet_id: Option<String>,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: RecordError,
}

fn serialize_reason<S: serde::Serializer>(
    reason: &RecordError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

/// Which way a feature pushes the score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Higher value means a more reliable wallet
    Positive,
    /// Higher value means a riskier wallet
    Negative,
}

/// The nine scalar features every wallet is normalized on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TotalUsdDeposited,
    TotalUsdBorrowed,
    TotalUsdRepaid,
    NumLiquidations,
    TxCount,
    ActiveDays,
    AssetDiversity,
    RepaymentRatio,
    BorrowToDeposit,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::TotalUsdDeposited,
        Feature::TotalUsdBorrowed,
        Feature::TotalUsdRepaid,
        Feature::NumLiquidations,
        Feature::TxCount,
        Feature::ActiveDays,
        Feature::AssetDiversity,
        Feature::RepaymentRatio,
        Feature::BorrowToDeposit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::TotalUsdDeposited => "total_usd_deposited",
            Feature::TotalUsdBorrowed => "total_usd_borrowed",
            Feature::TotalUsdRepaid => "total_usd_repaid",
            Feature::NumLiquidations => "num_liquidations",
            Feature::TxCount => "tx_count",
            Feature::ActiveDays => "active_days",
            Feature::AssetDiversity => "asset_diversity",
            Feature::RepaymentRatio => "repayment_ratio",
            Feature::BorrowToDeposit => "borrow_to_deposit",
        }
    }

    /// Required direction of this feature's weight, if any.
    /// Volume features without a fixed direction may be weighted either way.
    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Feature::RepaymentRatio
            | Feature::ActiveDays
            | Feature::AssetDiversity
            | Feature::TotalUsdDeposited => Some(Polarity::Positive),
            Feature::BorrowToDeposit | Feature::NumLiquidations => Some(Polarity::Negative),
            Feature::TotalUsdBorrowed | Feature::TotalUsdRepaid | Feature::TxCount => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-wallet aggregates for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletMetrics {
    pub wallet_id: String,
    pub total_usd_deposited: f64,
    pub total_usd_borrowed: f64,
    pub total_usd_repaid: f64,
    /// Informational only, not a scoring feature
    pub total_usd_redeemed: f64,
    pub num_liquidations: u32,
    pub tx_count: u32,
    pub active_days: u32,
    pub asset_diversity: u32,
}

impl WalletMetrics {
    /// Fraction of borrowed value repaid. A wallet that never borrowed
    /// carries no repayment risk and gets 1.0.
    pub fn repayment_ratio(&self) -> f64 {
        if self.total_usd_borrowed > 0.0 {
            self.total_usd_repaid / self.total_usd_borrowed
        } else {
            1.0
        }
    }

    /// Leverage proxy. 0.0 when nothing was deposited.
    pub fn borrow_to_deposit(&self) -> f64 {
        if self.total_usd_deposited > 0.0 {
            self.total_usd_borrowed / self.total_usd_deposited
        } else {
            0.0
        }
    }

    /// Raw value of a scoring feature
    pub fn feature(&self, feature: Feature) -> f64 {
        match feature {
            Feature::TotalUsdDeposited => self.total_usd_deposited,
            Feature::TotalUsdBorrowed => self.total_usd_borrowed,
            Feature::TotalUsdRepaid => self.total_usd_repaid,
            Feature::NumLiquidations => self.num_liquidations as f64,
            Feature::TxCount => self.tx_count as f64,
            Feature::ActiveDays => self.active_days as f64,
            Feature::AssetDiversity => self.asset_diversity as f64,
            Feature::RepaymentRatio => self.repayment_ratio(),
            Feature::BorrowToDeposit => self.borrow_to_deposit(),
        }
    }
}

/// Features rescaled to 0.0-1.0 against the batch population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    pub wallet_id: String,
    pub total_usd_deposited: f64,
    pub total_usd_borrowed: f64,
    pub total_usd_repaid: f64,
    pub num_liquidations: f64,
    pub tx_count: f64,
    pub active_days: f64,
    pub asset_diversity: f64,
    pub repayment_ratio: f64,
    pub borrow_to_deposit: f64,
}

impl NormalizedMetrics {
    /// Build from a per-feature value function
    pub fn from_fn(wallet_id: impl Into<String>, mut value: impl FnMut(Feature) -> f64) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            total_usd_deposited: value(Feature::TotalUsdDeposited),
            total_usd_borrowed: value(Feature::TotalUsdBorrowed),
            total_usd_repaid: value(Feature::TotalUsdRepaid),
            num_liquidations: value(Feature::NumLiquidations),
            tx_count: value(Feature::TxCount),
            active_days: value(Feature::ActiveDays),
            asset_diversity: value(Feature::AssetDiversity),
            repayment_ratio: value(Feature::RepaymentRatio),
            borrow_to_deposit: value(Feature::BorrowToDeposit),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::TotalUsdDeposited => self.total_usd_deposited,
            Feature::TotalUsdBorrowed => self.total_usd_borrowed,
            Feature::TotalUsdRepaid => self.total_usd_repaid,
            Feature::NumLiquidations => self.num_liquidations,
            Feature::TxCount => self.tx_count,
            Feature::ActiveDays => self.active_days,
            Feature::AssetDiversity => self.asset_diversity,
            Feature::RepaymentRatio => self.repayment_ratio,
            Feature::BorrowToDeposit => self.borrow_to_deposit,
        }
    }
}

/// Final reliability score for one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletScore {
    pub wallet_id: String,
    pub score: u32,
}
