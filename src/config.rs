//! Configuration loading and validation

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::export::OutputPaths;
use crate::ingest::{IngestOptions, DEFAULT_AMOUNT_SCALE};
use crate::scoring::normalizer::NormalizationPolicy;
use crate::scoring::pipeline::{MalformedPolicy, Pipeline};
use crate::scoring::weights::ScoringWeights;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub normalization: NormalizationPolicy,
    #[serde(default)]
    pub scoring: ScoringWeights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Transaction dump to score
    #[serde(default = "default_input_path")]
    pub path: String,
    /// Raw token amounts are divided by this before pricing
    #[serde(default = "default_amount_scale")]
    pub amount_scale: f64,
    /// Optional regex every wallet id must match
    #[serde(default)]
    pub wallet_id_pattern: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            amount_scale: default_amount_scale(),
            wallet_id_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: String,
    #[serde(default = "default_scores_file")]
    pub scores_file: String,
    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Replace existing outputs without asking
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            scores_file: default_scores_file(),
            metrics_file: default_metrics_file(),
            report_file: default_report_file(),
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub malformed_policy: MalformedPolicy,
}

fn default_input_path() -> String {
    "data/user-wallet-transactions.json".to_string()
}

fn default_amount_scale() -> f64 {
    DEFAULT_AMOUNT_SCALE
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_scores_file() -> String {
    "wallet_scores.csv".to_string()
}

fn default_metrics_file() -> String {
    "wallet_metrics.csv".to_string()
}

fn default_report_file() -> String {
    "analysis.md".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("input.path", default_input_path())?
            .set_default("input.amount_scale", default_amount_scale())?
            .set_default("output.directory", default_output_dir())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SCORER__)
            .add_source(
                config::Environment::with_prefix("SCORER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.input.amount_scale.is_finite() || self.input.amount_scale <= 0.0 {
            anyhow::bail!("input.amount_scale must be positive, got {}", self.input.amount_scale);
        }

        self.wallet_pattern()?;

        self.scoring
            .validate()
            .context("Invalid [scoring] weight table")?;

        self.normalization
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [normalization] policy: {}", e))?;

        if self.ingest.malformed_policy == MalformedPolicy::Abort {
            tracing::warn!("malformed_policy is 'abort' - a single bad record fails the whole batch");
        }

        Ok(())
    }

    /// Compiled wallet id pattern, if configured
    pub fn wallet_pattern(&self) -> Result<Option<Regex>> {
        self.input
            .wallet_id_pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidPattern(format!("{}: {}", p, e))))
            .transpose()
            .map_err(Into::into)
    }

    /// Decoder options for the ingest layer
    pub fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptions {
            amount_scale: self.input.amount_scale,
            wallet_pattern: self.wallet_pattern()?,
        })
    }

    /// Build the scoring pipeline
    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.scoring.clone(),
            self.normalization.clone(),
            self.ingest.malformed_policy,
        )?)
    }

    /// Output file locations, optionally under a different directory
    pub fn output_paths(&self, directory: Option<&Path>) -> OutputPaths {
        let dir = directory
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.output.directory));
        OutputPaths {
            scores: dir.join(&self.output.scores_file),
            metrics: dir.join(&self.output.metrics_file),
            report: dir.join(&self.output.report_file),
        }
    }

    /// Configuration summary for display
    pub fn display_summary(&self) -> String {
        let caps: Vec<String> = self
            .normalization
            .caps
            .iter()
            .map(|c| format!("{}<={}", c.feature, c.max))
            .collect();
        let logs: Vec<&str> = self.normalization.log_scaled.iter().map(|f| f.as_str()).collect();

        format!(
            r#"Configuration:
  Input:
    path: {}
    amount_scale: {}
    wallet_id_pattern: {}
  Ingest:
    malformed_policy: {:?}
  Normalization:
    caps: {}
    log_scaled: {}
  Output:
    directory: {}
    files: {}, {}, {}
    overwrite: {}
  Scoring:
    weights: {} ({} entries)
"#,
            self.input.path,
            self.input.amount_scale,
            self.input.wallet_id_pattern.as_deref().unwrap_or("(any)"),
            self.ingest.malformed_policy,
            if caps.is_empty() { "(none)".to_string() } else { caps.join(", ") },
            if logs.is_empty() { "(none)".to_string() } else { logs.join(", ") },
            self.output.directory,
            self.output.scores_file,
            self.output.metrics_file,
            self.output.report_file,
            self.output.overwrite,
            self.scoring.version,
            self.scoring.weights.len(),
        )
    }
}
