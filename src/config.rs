//! Ledger configuration.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Leading zero hex digits required of every block hash.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Longest achievable target: a SHA-256 hex digest has 64 digits.
pub const MAX_DIFFICULTY: usize = 64;

/// Longest a single mutation may spend mining before it is cancelled.
pub const DEFAULT_MINING_TIMEOUT_MS: u64 = 30_000;

/// Ledger configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Proof-of-work difficulty applied to every new chain
    pub difficulty: usize,
    /// Departments created by [`Registry::with_defaults`](crate::ledger::Registry::with_defaults)
    pub default_departments: Vec<String>,
    /// Mining budget per mutation through [`SharedLedger`](crate::service::SharedLedger);
    /// `None` mines until a nonce is found
    pub mining_timeout_ms: Option<u64>,
}

impl LedgerConfig {
    /// Configuration with a custom difficulty.
    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Replace the seeded departments.
    pub fn with_default_departments(mut self, names: &[&str]) -> Self {
        self.default_departments = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set or clear the per-mutation mining budget.
    pub fn with_mining_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mining_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Per-mutation mining budget.
    pub fn mining_timeout(&self) -> Option<Duration> {
        self.mining_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidConfig(format!(
                "difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }
        if self.default_departments.iter().any(|n| n.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "default department names must not be empty".into(),
            ));
        }
        if self.mining_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "mining timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            default_departments: vec![
                "School of Computing".to_string(),
                "School of Software Engineering".to_string(),
            ],
            mining_timeout_ms: Some(DEFAULT_MINING_TIMEOUT_MS),
        }
    }
}
