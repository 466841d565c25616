// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration surface for the curation core.
//!
//! Loaded from TOML with defaults for every field; the apply kill switch is
//! additionally overridable from the environment so an operator can disable
//! writes without a config rollout.

use crate::patch::PathAllowlist;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Environment variable for the process-wide apply kill switch.
/// `"1"` or `"true"` enables mutation; anything else disables it.
pub const APPLY_ENABLED_ENV: &str = "CURATOR_APPLY_ENABLED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("renewal margin {margin_secs}s must be below lease duration {lease_secs}s")]
    MarginExceedsLease { margin_secs: u64, lease_secs: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CuratorConfig {
    /// Queue lane names workers may poll.
    pub queue_lanes: Vec<String>,
    /// How long a lease covers a single attempt before the watchdog may
    /// reclaim it.
    pub lease_duration_secs: u64,
    /// Heartbeat renews when remaining lease/lock TTL drops below this.
    pub renewal_margin_secs: u64,
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    /// Hard limit on operations per plan.
    pub max_operations: usize,
    /// Hard limit on distinct targets per plan.
    pub max_distinct_targets: usize,
    /// Process-wide apply switch; both this and the job's mode must allow
    /// mutation before anything is written.
    pub apply_enabled: bool,
    pub idempotency_ttl_days: u64,
    pub journal_retention_days: u64,
    /// Retention for terminal jobs before pruning.
    pub job_retention_days: u64,
    /// Worker poll delay when the queue is empty.
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Patchable-path allowlist enforced by the validator.
    pub allowlist: PathAllowlist,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            queue_lanes: vec!["default".to_string()],
            lease_duration_secs: 300,
            renewal_margin_secs: 120,
            max_attempts: 4,
            retry: RetryPolicy::default(),
            max_operations: 50,
            max_distinct_targets: 25,
            apply_enabled: false,
            idempotency_ttl_days: 14,
            journal_retention_days: 90,
            job_retention_days: 7,
            poll_interval_ms: 1_000,
            heartbeat_interval_ms: 15_000,
            allowlist: PathAllowlist::catalog_default(),
        }
    }
}

impl CuratorConfig {
    /// Parse from TOML, apply environment overrides, and sanity-check.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: CuratorConfig = toml::from_str(raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read the kill switch from the environment, when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(APPLY_ENABLED_ENV) {
            self.apply_enabled = matches!(raw.as_str(), "1" | "true");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.renewal_margin_secs >= self.lease_duration_secs {
            return Err(ConfigError::MarginExceedsLease {
                margin_secs: self.renewal_margin_secs,
                lease_secs: self.lease_duration_secs,
            });
        }
        Ok(())
    }

    pub fn lease_duration_ms(&self) -> u64 {
        self.lease_duration_secs * 1_000
    }

    pub fn renewal_margin_ms(&self) -> u64 {
        self.renewal_margin_secs * 1_000
    }

    pub fn idempotency_ttl_ms(&self) -> u64 {
        self.idempotency_ttl_days * 86_400_000
    }

    pub fn journal_retention_ms(&self) -> u64 {
        self.journal_retention_days * 86_400_000
    }

    pub fn job_retention_ms(&self) -> u64 {
        self.job_retention_days * 86_400_000
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
