//! CSV rendering for scores and metrics

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::scoring::types::{WalletMetrics, WalletScore};

pub const SCORES_HEADER: &str = "wallet_id,score";

pub const METRICS_HEADER: &str = "wallet_id,total_usd_deposited,total_usd_borrowed,total_usd_repaid,\
total_usd_redeemed,num_liquidations,tx_count,active_days,asset_diversity,repayment_ratio,\
borrow_to_deposit,score";

/// Quote a field if it contains a delimiter, quote or line break
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `wallet_id,score` rows ordered by wallet id
pub fn render_scores(scores: &BTreeMap<String, WalletScore>) -> String {
    let mut out = String::with_capacity(scores.len() * 56 + SCORES_HEADER.len() + 1);
    out.push_str(SCORES_HEADER);
    out.push('\n');
    for s in scores.values() {
        let _ = writeln!(out, "{},{}", field(&s.wallet_id), s.score);
    }
    out
}

/// Raw metrics, both ratios and the final score for every wallet
pub fn render_metrics(
    metrics: &BTreeMap<String, WalletMetrics>,
    scores: &BTreeMap<String, WalletScore>,
) -> String {
    let mut out = String::new();
    out.push_str(METRICS_HEADER);
    out.push('\n');
    for (id, m) in metrics {
        let score = scores
            .get(id)
            .map(|s| s.score.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{:.6},{:.6},{:.6},{:.6},{},{},{},{},{:.6},{:.6},{}",
            field(id),
            m.total_usd_deposited,
            m.total_usd_borrowed,
            m.total_usd_repaid,
            m.total_usd_redeemed,
            m.num_liquidations,
            m.tx_count,
            m.active_days,
            m.asset_diversity,
            m.repayment_ratio(),
            m.borrow_to_deposit(),
            score,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(id: &str, score: u32) -> (String, WalletScore) {
        (
            id.to_string(),
            WalletScore {
                wallet_id: id.to_string(),
                score,
            },
        )
    }

    #[test]
    fn test_render_scores_sorted() {
        let scores: BTreeMap<_, _> = vec![score("0xb", 12), score("0xa", 987)].into_iter().collect();
        assert_eq!(render_scores(&scores), "wallet_id,score\n0xa,987\n0xb,12\n");
    }

    #[test]
    fn test_render_scores_empty() {
        assert_eq!(render_scores(&BTreeMap::new()), "wallet_id,score\n");
    }

    #[test]
    fn test_field_quoting() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_render_metrics_row() {
        let m = WalletMetrics {
            wallet_id: "0xa".to_string(),
            total_usd_deposited: 100.0,
            total_usd_borrowed: 50.0,
            total_usd_repaid: 25.0,
            total_usd_redeemed: 10.0,
            num_liquidations: 1,
            tx_count: 4,
            active_days: 3,
            asset_diversity: 2,
        };
        let metrics: BTreeMap<_, _> = [("0xa".to_string(), m)].into_iter().collect();
        let scores: BTreeMap<_, _> = vec![score("0xa", 420)].into_iter().collect();

        let csv = render_metrics(&metrics, &scores);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(METRICS_HEADER));
        assert_eq!(
            lines.next(),
            Some("0xa,100.000000,50.000000,25.000000,10.000000,1,4,3,2,0.500000,0.500000,420")
        );
        assert_eq!(lines.next(), None);
    }
}
