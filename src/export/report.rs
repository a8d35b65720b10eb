//! Score distribution analysis
//!
//! Buckets scores into ten 100-point ranges and profiles the low (< 300)
//! and high (> 800) scoring groups by their mean raw metrics.

use serde::Serialize;
use std::fmt::Write;

use crate::scoring::pipeline::BatchResult;
use crate::scoring::types::{WalletMetrics, MAX_SCORE};

/// Scores strictly below this are profiled as the low group
pub const LOW_SCORE_THRESHOLD: u32 = 300;
/// Scores strictly above this are profiled as the high group
pub const HIGH_SCORE_THRESHOLD: u32 = 800;

const BUCKETS: usize = 10;
const BUCKET_WIDTH: u32 = MAX_SCORE / BUCKETS as u32;
const BAR_WIDTH: usize = 40;

/// Mean raw metrics of a group of wallets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupProfile {
    pub wallets: usize,
    pub mean_repayment_ratio: f64,
    pub mean_borrow_to_deposit: f64,
    pub mean_liquidations: f64,
    pub mean_tx_count: f64,
    pub mean_active_days: f64,
    pub mean_asset_diversity: f64,
}

impl GroupProfile {
    fn from_wallets<'a>(wallets: impl Iterator<Item = &'a WalletMetrics>) -> Self {
        let mut profile = Self::default();
        for m in wallets {
            profile.wallets += 1;
            profile.mean_repayment_ratio += m.repayment_ratio();
            profile.mean_borrow_to_deposit += m.borrow_to_deposit();
            profile.mean_liquidations += m.num_liquidations as f64;
            profile.mean_tx_count += m.tx_count as f64;
            profile.mean_active_days += m.active_days as f64;
            profile.mean_asset_diversity += m.asset_diversity as f64;
        }

        if profile.wallets > 0 {
            let n = profile.wallets as f64;
            profile.mean_repayment_ratio /= n;
            profile.mean_borrow_to_deposit /= n;
            profile.mean_liquidations /= n;
            profile.mean_tx_count /= n;
            profile.mean_active_days /= n;
            profile.mean_asset_diversity /= n;
        }
        profile
    }
}

/// Summary of one scored batch
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub weights_version: String,
    pub records_seen: usize,
    pub records_rejected: usize,
    pub wallets: usize,
    pub mean_score: f64,
    /// Wallet count per 100-point bucket; the last bucket includes 1000
    pub distribution: [usize; BUCKETS],
    pub low: GroupProfile,
    pub high: GroupProfile,
}

/// Bucket index for a score
pub fn bucket(score: u32) -> usize {
    ((score / BUCKET_WIDTH) as usize).min(BUCKETS - 1)
}

impl AnalysisReport {
    pub fn from_batch(result: &BatchResult) -> Self {
        let mut distribution = [0usize; BUCKETS];
        let mut total = 0u64;
        for s in result.scores.values() {
            distribution[bucket(s.score)] += 1;
            total += s.score as u64;
        }

        let mean_score = if result.scores.is_empty() {
            0.0
        } else {
            total as f64 / result.scores.len() as f64
        };

        let group = |keep: fn(u32) -> bool| {
            GroupProfile::from_wallets(
                result
                    .scores
                    .values()
                    .filter(|s| keep(s.score))
                    .filter_map(|s| result.metrics.get(&s.wallet_id)),
            )
        };

        Self {
            run_id: result.run_id.to_string(),
            weights_version: result.weights_version.clone(),
            records_seen: result.records_seen,
            records_rejected: result.rejected.len(),
            wallets: result.scores.len(),
            mean_score,
            distribution,
            low: group(|s| s < LOW_SCORE_THRESHOLD),
            high: group(|s| s > HIGH_SCORE_THRESHOLD),
        }
    }

    /// Text histogram, one line per bucket
    pub fn histogram(&self) -> String {
        let peak = self.distribution.iter().copied().max().unwrap_or(0).max(1);
        let mut out = String::new();
        for (i, count) in self.distribution.iter().enumerate() {
            let lo = i as u32 * BUCKET_WIDTH;
            let hi = lo + BUCKET_WIDTH;
            let bar = "#".repeat(count * BAR_WIDTH / peak);
            let _ = writeln!(out, "{:>4}-{:<4} | {:<width$} {}", lo, hi, bar, count, width = BAR_WIDTH);
        }
        out
    }

    /// Markdown rendering
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Wallet Credit Score Analysis\n");
        let _ = writeln!(md, "- Run: `{}`", self.run_id);
        let _ = writeln!(md, "- Weight table: `{}`", self.weights_version);
        let _ = writeln!(md, "- Records: {} ({} rejected)", self.records_seen, self.records_rejected);
        let _ = writeln!(md, "- Wallets scored: {}", self.wallets);
        let _ = writeln!(md, "- Mean score: {:.1}\n", self.mean_score);

        let _ = writeln!(md, "## Score Distribution\n");
        let _ = writeln!(md, "```text\n{}```\n", self.histogram());

        write_group(&mut md, &format!("Low-Scoring Wallets (score < {})", LOW_SCORE_THRESHOLD), &self.low);
        write_group(&mut md, &format!("High-Scoring Wallets (score > {})", HIGH_SCORE_THRESHOLD), &self.high);
        md
    }
}

fn write_group(md: &mut String, title: &str, group: &GroupProfile) {
    let _ = writeln!(md, "## {}\n", title);
    let _ = writeln!(md, "- Wallets: {}", group.wallets);
    if group.wallets > 0 {
        let _ = writeln!(md, "- Mean repayment ratio: {:.3}", group.mean_repayment_ratio);
        let _ = writeln!(md, "- Mean borrow/deposit: {:.3}", group.mean_borrow_to_deposit);
        let _ = writeln!(md, "- Mean liquidations: {:.2}", group.mean_liquidations);
        let _ = writeln!(md, "- Mean transactions: {:.1}", group.mean_tx_count);
        let _ = writeln!(md, "- Mean active days: {:.1}", group.mean_active_days);
        let _ = writeln!(md, "- Mean distinct assets: {:.1}", group.mean_asset_diversity);
    }
    md.push('\n');
}
