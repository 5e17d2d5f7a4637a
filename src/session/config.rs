//! Engine Configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proof::ProofMode;

use super::retry::Backoff;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config I/O: {0}")]
    Io(String),

    /// File is not valid config JSON.
    #[error("config parse: {0}")]
    Parse(String),

    /// Values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Orchestrator and prover settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total submission attempts per action, the first included.
    pub max_attempts: u32,
    /// First retry delay (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound on any retry delay (milliseconds).
    pub backoff_cap_ms: u64,
    /// Interval between auto-reveal polls (milliseconds).
    pub poll_interval_ms: u64,
    /// Seed proof mode for new sessions.
    pub default_proof_mode: ProofMode,
    /// Commit card plays with ZK proofs.
    pub zk_plays: bool,
    /// Directory for persisted secrets; in-memory when unset.
    pub store_dir: Option<PathBuf>,
    /// Compiled seed circuit JSON.
    pub circuit_artifact: Option<PathBuf>,
    /// Noir project the artifact was compiled from.
    pub circuit_project_dir: Option<PathBuf>,
    /// `bb` prover binary.
    pub bb_binary: PathBuf,
    /// `nargo` binary.
    pub nargo_binary: PathBuf,
    /// Scratch directory for prover jobs.
    pub prover_work_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base_ms: 250,
            backoff_cap_ms: 4_000,
            poll_interval_ms: 3_000,
            default_proof_mode: ProofMode::default(),
            zk_plays: true,
            store_dir: None,
            circuit_artifact: None,
            circuit_project_dir: None,
            bb_binary: PathBuf::from("bb"),
            nargo_binary: PathBuf::from("nargo"),
            prover_work_dir: std::env::temp_dir().join("cangkulan-prover"),
        }
    }
}

impl EngineConfig {
    /// Parse JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid("backoff_cap_ms is below backoff_base_ms".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Retry schedule.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_cap_ms),
        )
    }

    /// Auto-reveal poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
