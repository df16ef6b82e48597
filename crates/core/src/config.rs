// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration.
//!
//! Loaded from a TOML file; every option has a default so an empty file
//! (or no file) yields a working server. Durations are humanized strings
//! ("500ms", "30s", "5m", "24h").

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a duration string like "500ms", "30s", "5m", "1h" into a Duration.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Serde adapter for humanized duration strings.
mod duration_str {
    use super::parse_duration;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("{}ms", d.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(de)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Agent-selection policy applied by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    #[default]
    RoundRobin,
    LeastConnections,
    Random,
    Weighted,
}

crate::simple_display! {
    RoutingPolicy {
        RoundRobin => "round_robin",
        LeastConnections => "least_connections",
        Random => "random",
        Weighted => "weighted",
    }
}

/// Work-item processor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Number of dispatch workers; the channel capacity is twice this.
    pub max_concurrency: usize,
    #[serde(with = "duration_str")]
    pub polling_interval: Duration,
    #[serde(with = "duration_str")]
    pub retry_delay: Duration,
    pub max_dispatch_retries: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            polling_interval: Duration::from_secs(1),
            retry_delay: Duration::from_secs(5),
            max_dispatch_retries: 3,
        }
    }
}

/// Timeout monitor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "duration_str")]
    pub check_interval: Duration,
    /// Execution deadline for jobs that do not carry their own.
    #[serde(with = "duration_str")]
    pub default_job_timeout: Duration,
    /// Assigned → Running deadline.
    #[serde(with = "duration_str")]
    pub ack_timeout: Duration,
    pub max_timeout_retries: u32,
    /// Agents silent for longer are marked disconnected.
    #[serde(with = "duration_str")]
    pub heartbeat_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            default_job_timeout: Duration::from_secs(300),
            ack_timeout: Duration::from_secs(30),
            max_timeout_retries: 3,
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    pub policy: RoutingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(24 * 3600) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Ring-buffer capacity per job.
    pub max_history: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    pub processor: ProcessorConfig,
    pub timeout: TimeoutConfig,
    pub router: RouterConfig,
    pub idempotency: IdempotencyConfig,
    pub progress: ProgressConfig,
}

impl MeshConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
