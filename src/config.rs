//! Configuration file for consolescope
//!
//! Settings are read from `~/.consolescope/config.toml` (or `--config`), and
//! command line flags override them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use chrono::Duration;
use serde::Deserialize;

use consolescope_logs::{CountsSettings, ScopePrefixes};

/// Longest accepted look-back (one year)
const MAX_LOOKBACK_MINUTES: i64 = 366 * 24 * 60;

/// Values from the config file; unset keys fall back to built-in defaults
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Recorded listing to replay when `--replay` is not given
    pub replay: Option<PathBuf>,
    pub topic: Option<String>,
    pub lookback_minutes: Option<i64>,
    pub results_per_pipeline: Option<u32>,
    pub input_path_prefix: Option<String>,
    pub output_path_prefix: Option<String>,
}

/// Command line values that take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub topic: Option<String>,
    pub lookback_minutes: Option<i64>,
    pub results_per_pipeline: Option<u32>,
}

impl Config {
    /// Default config file location
    fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".consolescope").join("config.toml"))
    }

    /// Load an explicit config file, or the default one if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the counting settings, applying command line overrides
    pub fn settings(&self, overrides: &Overrides) -> Result<CountsSettings> {
        let defaults = CountsSettings::default();

        let lookback_minutes = overrides.lookback_minutes.or(self.lookback_minutes);
        let lookback = match lookback_minutes {
            Some(minutes) => {
                ensure!(minutes > 0, "lookback must be at least one minute, got {minutes}");
                ensure!(
                    minutes <= MAX_LOOKBACK_MINUTES,
                    "lookback must be at most {MAX_LOOKBACK_MINUTES} minutes, got {minutes}"
                );
                Duration::try_minutes(minutes)
                    .with_context(|| format!("lookback of {minutes} minutes is out of range"))?
            }
            None => defaults.lookback,
        };

        let results_per_pipeline = overrides
            .results_per_pipeline
            .or(self.results_per_pipeline)
            .unwrap_or(defaults.results_per_pipeline);
        ensure!(results_per_pipeline > 0, "results per pipeline must be positive");

        let prefixes = ScopePrefixes {
            input: self
                .input_path_prefix
                .clone()
                .unwrap_or(defaults.prefixes.input),
            output: self
                .output_path_prefix
                .clone()
                .unwrap_or(defaults.prefixes.output),
        };

        Ok(CountsSettings {
            topic: overrides
                .topic
                .clone()
                .or_else(|| self.topic.clone())
                .unwrap_or(defaults.topic),
            lookback,
            results_per_pipeline,
            prefixes,
        })
    }
}
