//! CLI command implementations

use anyhow::Result;
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::export::{write_outputs, AnalysisReport};
use crate::ingest::read_transactions;
use crate::scoring::pipeline::BatchResult;
use crate::scoring::types::Feature;

/// Ingest the dump and run the scoring pipeline
pub async fn run_batch(config: &Config, input: Option<&Path>) -> Result<BatchResult> {
    let path = input
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.input.path));

    let options = config.ingest_options()?;
    let pipeline = config.pipeline()?;

    let ingested = read_transactions(&path, &options).await?;
    info!(
        total = ingested.total,
        accepted = ingested.records.len(),
        rejected = ingested.rejected.len(),
        "Loaded transactions"
    );

    let result = tokio::task::spawn_blocking(move || {
        pipeline.run_with_rejections(&ingested.records, ingested.rejected, ingested.total)
    })
    .await
    .map_err(|e| Error::Internal(format!("scoring task failed: {}", e)))??;

    Ok(result)
}

/// Score a transaction dump and write every output
pub async fn score(
    config: &Config,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let result = run_batch(config, input.as_deref()).await?;
    let paths = config.output_paths(output_dir.as_deref());

    let mut overwrite = force || config.output.overwrite;
    let existing = paths.existing();
    if !overwrite && !existing.is_empty() && std::io::stdin().is_terminal() {
        let listing: Vec<String> = existing.iter().map(|p| p.display().to_string()).collect();
        let confirmed = Confirm::new()
            .with_prompt(format!("Overwrite existing outputs ({})?", listing.join(", ")))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Score export cancelled by user");
            return Ok(());
        }
        overwrite = true;
    }

    let report = write_outputs(&result, &paths, overwrite).await?;
    print_summary(&report, &result);

    println!("\nScores:  {}", paths.scores.display());
    println!("Metrics: {}", paths.metrics.display());
    println!("Report:  {}", paths.report.display());

    Ok(())
}

fn print_summary(report: &AnalysisReport, result: &BatchResult) {
    println!("\n=== WALLET SCORING SUMMARY ===\n");
    println!("Run:      {}", report.run_id);
    println!("Weights:  {}", report.weights_version);
    println!("Records:  {} ({} rejected)", report.records_seen, report.records_rejected);
    println!("Wallets:  {}", report.wallets);
    println!("Mean:     {:.1}", report.mean_score);
    println!("\n{}", report.histogram());

    if !result.rejected.is_empty() {
        warn!(count = result.rejected.len(), "Some records were rejected");
        for r in result.rejected.iter().take(10) {
            println!(
                "  rejected #{} ({}): {}",
                r.index,
                r.wallet_id.as_deref().unwrap_or("-"),
                r.reason
            );
        }
        if result.rejected.len() > 10 {
            println!("  ... and {} more", result.rejected.len() - 10);
        }
    }
}

/// Show how one wallet's score was built
pub async fn inspect(config: &Config, wallet: &str, input: Option<PathBuf>) -> Result<()> {
    let result = run_batch(config, input.as_deref()).await?;
    println!("{}", render_inspection(config, &result, wallet)?);
    Ok(())
}

fn render_inspection(config: &Config, result: &BatchResult, wallet: &str) -> Result<String> {
    let (Some(metrics), Some(normalized), Some(score)) = (
        result.metrics.get(wallet),
        result.normalized.get(wallet),
        result.scores.get(wallet),
    ) else {
        return Err(Error::WalletNotFound(wallet.to_string()).into());
    };

    let mut out = format!("\n=== WALLET {} ===\n\n", wallet);
    out.push_str(&format!(
        "{:<20} {:>16} {:>10} {:>8} {:>10}\n",
        "feature", "raw", "normalized", "weight", "contrib"
    ));
    for feature in Feature::ALL {
        let weight = config.scoring.weight(feature);
        let n = normalized.get(feature);
        out.push_str(&format!(
            "{:<20} {:>16.4} {:>10.4} {:>+8.3} {:>+10.4}\n",
            feature.as_str(),
            metrics.feature(feature),
            n,
            weight,
            weight * n
        ));
    }
    out.push_str(&format!(
        "\nredeemed: {:.4} USD\nscore: {} / 1000 (weights {})\n",
        metrics.total_usd_redeemed, score.score, result.weights_version
    ));
    Ok(out)
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display_summary());
    Ok(())
}

/// Show the weight table the scorer would run with
pub fn show_weights(config: &Config) -> Result<()> {
    let pipeline = config.pipeline()?;
    println!("{}", pipeline.scorer().weights().display());
    Ok(())
}

/// Process exit code for a failed command: 2 when the input batch is at fault
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_input_error() => 2,
        _ => 1,
    }
}
