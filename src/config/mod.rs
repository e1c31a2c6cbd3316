use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path};

pub mod consts;

use consts::*;

/// Gas estimation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Buffer applied to a successful estimate, in percent.
    pub buffer_percent: u64,
    /// Ceiling increase per submission retry, in percent.
    pub escalation_percent: u64,
    /// Ceiling used when estimation fails for a non-deterministic reason.
    pub fallback_ceiling: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            buffer_percent: DEFAULT_GAS_BUFFER_PERCENT,
            escalation_percent: DEFAULT_GAS_ESCALATION_PERCENT,
            fallback_ceiling: DEFAULT_FALLBACK_GAS_CEILING,
        }
    }
}

/// Submission retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SUBMIT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_SUBMIT_RETRY_DELAY_SECS,
        }
    }
}

/// Receipt polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub timeout_ms: u64,
    pub poll_base_ms: u64,
    pub poll_step_ms: u64,
    pub poll_step_every_ms: u64,
    pub poll_max_ms: u64,
    pub confirmation_depth: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT_MS,
            poll_base_ms: DEFAULT_POLL_BASE_MS,
            poll_step_ms: DEFAULT_POLL_STEP_MS,
            poll_step_every_ms: DEFAULT_POLL_STEP_EVERY_MS,
            poll_max_ms: DEFAULT_POLL_MAX_MS,
            confirmation_depth: DEFAULT_CONFIRMATION_DEPTH,
        }
    }
}

impl MonitorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval after `elapsed` time: base plus one step per window, capped.
    pub fn poll_interval(&self, elapsed: Duration) -> Duration {
        let windows = if self.poll_step_every_ms == 0 {
            0
        } else {
            elapsed.as_millis() as u64 / self.poll_step_every_ms
        };
        let interval = self
            .poll_base_ms
            .saturating_add(windows.saturating_mul(self.poll_step_ms));
        Duration::from_millis(interval.min(self.poll_max_ms))
    }
}

/// Post-confirmation state verification settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_VERIFY_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_VERIFY_RETRY_DELAY_SECS,
        }
    }
}

/// Complete engine configuration. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gas: GasConfig,
    pub submit: SubmitConfig,
    pub monitor: MonitorConfig,
    pub verify: VerifyConfig,
}

/// Load configuration from a TOML file.
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<EngineConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg: EngineConfig = toml::from_str(&s)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.gas.buffer_percent, 130);
        assert_eq!(config.gas.escalation_percent, 120);
        assert_eq!(config.submit.max_attempts, 2);
        assert_eq!(config.monitor.timeout_ms, 120_000);
        assert_eq!(config.verify.max_attempts, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [monitor]
            timeout_ms = 30000

            [gas]
            fallback_ceiling = 5000000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.monitor.timeout_ms, 30_000);
        assert_eq!(cfg.monitor.poll_base_ms, DEFAULT_POLL_BASE_MS);
        assert_eq!(cfg.gas.fallback_ceiling, 5_000_000);
        assert_eq!(cfg.gas.buffer_percent, DEFAULT_GAS_BUFFER_PERCENT);
        assert_eq!(cfg.submit, SubmitConfig::default());
    }

    #[test]
    fn test_poll_interval_grows_and_caps() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.poll_interval(Duration::ZERO), Duration::from_secs(2));
        assert_eq!(cfg.poll_interval(Duration::from_secs(9)), Duration::from_secs(2));
        assert_eq!(cfg.poll_interval(Duration::from_secs(10)), Duration::from_secs(3));
        assert_eq!(cfg.poll_interval(Duration::from_secs(35)), Duration::from_secs(5));
        assert_eq!(cfg.poll_interval(Duration::from_secs(80)), Duration::from_secs(10));
        assert_eq!(cfg.poll_interval(Duration::from_secs(600)), Duration::from_secs(10));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config_from_path("/nonexistent/engine.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
