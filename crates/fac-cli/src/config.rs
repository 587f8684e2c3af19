//! # CLI Configuration
//!
//! Settings come from, in increasing precedence:
//!
//! 1. built-in defaults,
//! 2. the YAML file named by `--config`, or `./fac.yaml` when present,
//! 3. the `FAC_STATE_DIR` and `FAC_SINKS` environment variables.
//!
//! ```yaml
//! state_dir: .fac
//! sinks: [legacy, audit]
//! data_source: GSAFAC
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fac_state::{to_audit_document, to_legacy_document, SubmissionRecord};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fac.yaml";

/// A storage representation the lifecycle writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Flat row with parallel transition arrays.
    Legacy,
    /// Nested document with unwrapped sections.
    Audit,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Audit => "audit",
        }
    }

    /// The document renderer for this representation.
    pub fn render(&self) -> fn(&SubmissionRecord) -> Value {
        match self {
            Self::Legacy => to_legacy_document,
            Self::Audit => to_audit_document,
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "audit" => Ok(Self::Audit),
            other => bail!("unknown sink {other:?} (expected legacy or audit)"),
        }
    }
}

/// Resolved CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacConfig {
    /// Root of the state directory. Relative paths resolve against the
    /// working directory.
    pub state_dir: PathBuf,
    /// Sinks in write order. The first is primary.
    pub sinks: Vec<SinkKind>,
    /// Source tag stamped on newly created records.
    pub data_source: String,
}

impl Default for FacConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".fac"),
            sinks: vec![SinkKind::Legacy, SinkKind::Audit],
            data_source: "GSAFAC".to_string(),
        }
    }
}

impl FacConfig {
    /// Load settings for a run rooted at `cwd`.
    ///
    /// An explicit `--config` path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = cwd.join(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(
            std::env::var("FAC_STATE_DIR").ok(),
            std::env::var("FAC_SINKS").ok(),
        )?;
        if config.state_dir.is_relative() {
            config.state_dir = cwd.join(&config.state_dir);
        }
        tracing::debug!(state_dir = %config.state_dir.display(), sinks = ?config.sinks, "configuration loaded");
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse YAML text. Missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. `sinks` is a comma-separated list.
    pub fn apply_overrides(&mut self, state_dir: Option<String>, sinks: Option<String>) -> Result<()> {
        if let Some(dir) = state_dir.filter(|d| !d.trim().is_empty()) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(list) = sinks {
            self.sinks = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<_>>()
                .context("invalid FAC_SINKS")?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.sinks.is_empty() {
            bail!("at least one sink must be configured");
        }
        for (i, sink) in self.sinks.iter().enumerate() {
            if self.sinks[..i].contains(sink) {
                bail!("sink {} listed twice", sink.as_str());
            }
        }
        if self.data_source.trim().is_empty() {
            bail!("data_source must not be empty");
        }
        Ok(())
    }
}
