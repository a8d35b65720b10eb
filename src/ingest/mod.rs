//! Transaction ingest
//!
//! Turns a raw transaction dump on disk into typed `TransactionRecord`s,
//! keeping every refused entry so it can be reported alongside the scores.

pub mod aave;

pub use aave::{parse_dump, IngestOptions, Ingested, DEFAULT_AMOUNT_SCALE};

use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// Read and decode a transaction dump
pub async fn read_transactions<P: AsRef<Path>>(path: P, options: &IngestOptions) -> Result<Ingested> {
    let path = path.as_ref();
    info!(path = %path.display(), "Reading transaction dump");

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;

    parse_dump(&json, options)
}
