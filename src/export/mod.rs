//! Output writers for a scored batch
//!
//! - Scores CSV (`wallet_id,score`)
//! - Metrics CSV (raw aggregates, ratios, score)
//! - Markdown analysis report

pub mod csv;
pub mod report;

pub use report::{AnalysisReport, GroupProfile};

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::scoring::pipeline::BatchResult;

/// Where each output lands
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub scores: PathBuf,
    pub metrics: PathBuf,
    pub report: PathBuf,
}

impl OutputPaths {
    pub fn all(&self) -> [&Path; 3] {
        [self.scores.as_path(), self.metrics.as_path(), self.report.as_path()]
    }

    /// Outputs that already exist on disk
    pub fn existing(&self) -> Vec<&Path> {
        self.all().into_iter().filter(|p| p.exists()).collect()
    }
}

/// Write every output for a batch.
///
/// Fails with `Error::OutputExists` if any target exists and `overwrite` is false.
pub async fn write_outputs(result: &BatchResult, paths: &OutputPaths, overwrite: bool) -> Result<AnalysisReport> {
    if !overwrite {
        if let Some(existing) = paths.existing().first() {
            return Err(Error::OutputExists(existing.display().to_string()));
        }
    }

    for path in paths.all() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let report = AnalysisReport::from_batch(result);

    tokio::fs::write(&paths.scores, csv::render_scores(&result.scores)).await?;
    tokio::fs::write(&paths.metrics, csv::render_metrics(&result.metrics, &result.scores)).await?;
    tokio::fs::write(&paths.report, report.to_markdown()).await?;

    info!(
        scores = %paths.scores.display(),
        metrics = %paths.metrics.display(),
        report = %paths.report.display(),
        wallets = result.scores.len(),
        "Wrote batch outputs"
    );

    Ok(report)
}
