//! Wallet Credit Scorer Library
//!
//! Deterministic batch credit scoring for lending-protocol wallets.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod scoring;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, RecordError, Result};
pub use scoring::{BatchResult, Pipeline, TransactionRecord, WalletMetrics, WalletScore};
