//! Pipeline configuration.

use chainledger_observability::LogConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{RetryConfig, RetryPolicy};

/// Retry knobs as they appear in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 100 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_jitter_fraction() -> f64 { 0.1 }

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
            jitter_fraction: self.jitter_fraction,
        })
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub retry: RetrySettings,
    /// Decode workers in the pool
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded job queue capacity; `submit` waits when full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-transaction deadline (None = no deadline)
    #[serde(default)]
    pub decode_timeout_ms: Option<u64>,
    /// Attach historical prices during enrichment
    #[serde(default = "bool_true")]
    pub attach_prices: bool,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_workers() -> usize { 4 }
fn default_queue_capacity() -> usize { 256 }
fn bool_true() -> bool { true }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetrySettings::default(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            decode_timeout_ms: None,
            attach_prices: true,
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms.map(Duration::from_millis)
    }
}
