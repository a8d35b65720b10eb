//! Aave V2 transaction dump decoder
//!
//! The dump is a JSON array of raw protocol events:
//!
//! ```json
//! {
//!   "userWallet": "0x00000000001accfa9cef68cf5371a23025b6d4b6",
//!   "action": "deposit",
//!   "timestamp": 1629178166,
//!   "actionData": {
//!     "amount": "2000000000",
//!     "assetSymbol": "USDC",
//!     "assetPriceUSD": "0.9938318274296357543568636362026045"
//!   }
//! }
//! ```
//!
//! Numeric fields may arrive as JSON numbers or strings.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RecordError, Result};
use crate::scoring::types::{Action, RejectedRecord, TransactionRecord};

/// Default divisor applied to raw token amounts
pub const DEFAULT_AMOUNT_SCALE: f64 = 1e6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    user_wallet: Option<String>,
    action: Option<String>,
    timestamp: Option<Value>,
    action_data: Option<RawActionData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActionData {
    amount: Option<Value>,
    asset_symbol: Option<String>,
    #[serde(rename = "assetPriceUSD")]
    asset_price_usd: Option<Value>,
    /// Present on liquidation events instead of `assetSymbol`
    collateral_reserve_symbol: Option<String>,
}

/// Decoder settings
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Raw amount is divided by this before pricing
    pub amount_scale: f64,
    /// Wallet ids must match when set
    pub wallet_pattern: Option<Regex>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            amount_scale: DEFAULT_AMOUNT_SCALE,
            wallet_pattern: None,
        }
    }
}

/// Records accepted from a dump plus everything refused
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub records: Vec<TransactionRecord>,
    pub rejected: Vec<RejectedRecord>,
    /// Number of raw entries in the dump
    pub total: usize,
}

/// Decode a JSON array dump
pub fn parse_dump(json: &str, options: &IngestOptions) -> Result<Ingested> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let total = entries.len();
    let mut records = Vec::with_capacity(total);
    let mut rejected = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let wallet_hint = entry
            .get("userWallet")
            .and_then(Value::as_str)
            .map(str::to_string);

        match decode_entry(entry, options) {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(index, wallet = ?wallet_hint, %reason, "Rejecting raw transaction");
                rejected.push(RejectedRecord {
                    index,
                    wallet_id: wallet_hint.filter(|w| !w.trim().is_empty()),
                    reason,
                });
            }
        }
    }

    debug!(
        total,
        accepted = records.len(),
        rejected = rejected.len(),
        "Decoded transaction dump"
    );

    Ok(Ingested {
        records,
        rejected,
        total,
    })
}

fn decode_entry(entry: Value, options: &IngestOptions) -> std::result::Result<TransactionRecord, RecordError> {
    let raw: RawTransaction =
        serde_json::from_value(entry).map_err(|e| RecordError::Unreadable(e.to_string()))?;

    let wallet_id = raw
        .user_wallet
        .ok_or(RecordError::MissingField("userWallet"))?
        .trim()
        .to_string();
    if wallet_id.is_empty() {
        return Err(RecordError::EmptyWallet);
    }
    if let Some(pattern) = &options.wallet_pattern {
        if !pattern.is_match(&wallet_id) {
            return Err(RecordError::WalletPattern(wallet_id));
        }
    }

    let action: Action = raw
        .action
        .ok_or(RecordError::MissingField("action"))?
        .parse()?;

    let timestamp = parse_timestamp(raw.timestamp.as_ref().ok_or(RecordError::MissingField("timestamp"))?)?;

    let data = raw.action_data.ok_or(RecordError::MissingField("actionData"))?;
    let asset_symbol = data
        .asset_symbol
        .clone()
        .or_else(|| match action {
            Action::Liquidation => data.collateral_reserve_symbol.clone(),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .ok_or(RecordError::MissingField("actionData.assetSymbol"))?;

    let usd_value = match action {
        // Liquidation events carry collateral/debt pairs rather than a single
        // amount; only their count is scored, so a missing amount is fine.
        Action::Liquidation if data.amount.is_none() || data.asset_price_usd.is_none() => 0.0,
        _ => {
            let amount = parse_number(
                data.amount.as_ref().ok_or(RecordError::MissingField("actionData.amount"))?,
                "actionData.amount",
            )?;
            let price = parse_number(
                data.asset_price_usd
                    .as_ref()
                    .ok_or(RecordError::MissingField("actionData.assetPriceUSD"))?,
                "actionData.assetPriceUSD",
            )?;
            amount / options.amount_scale * price
        }
    };

    let record = TransactionRecord {
        wallet_id,
        action,
        asset_symbol,
        usd_value,
        timestamp,
    };
    record.validate()?;
    Ok(record)
}

fn parse_number(value: &Value, field: &'static str) -> std::result::Result<f64, RecordError> {
    let invalid = || RecordError::InvalidNumber {
        field,
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_timestamp(value: &Value) -> std::result::Result<DateTime<Utc>, RecordError> {
    let invalid = || RecordError::InvalidTimestamp(value.to_string());

    let secs = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    DateTime::from_timestamp(secs, 0).ok_or_else(invalid)
}
