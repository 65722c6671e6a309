//! Configuration -- TOML file with defaults for every knob.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Bind address for `serve`.
    pub bind: String,
    pub speedtest: SpeedTestConfig,
    pub scan: ScanConfig,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "data/speedfinder.db".to_string(),
            bind: "0.0.0.0:8080".to_string(),
            speedtest: SpeedTestConfig::default(),
            scan: ScanConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTestConfig {
    /// Download endpoint serving a large synthetic payload.
    pub url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Reporting window between samples.
    pub window_ms: u64,
    /// Wall-clock ceiling for the whole test.
    pub ceiling_secs: u64,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            // Cloudflare's speed endpoint, 20 MB payload.
            url: "https://speed.cloudflare.com/__down?bytes=20000000".to_string(),
            connect_timeout_secs: 15,
            read_timeout_secs: 15,
            window_ms: 200,
            ceiling_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMechanism {
    /// Shell-invoked `ping -c 1`. Works unprivileged.
    Ping,
    /// Raw-socket ICMP echo via surge-ping. Needs CAP_NET_RAW, much
    /// tighter timeout.
    Icmp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub probe: ProbeMechanism,
    pub ping_timeout_secs: u64,
    pub icmp_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe: ProbeMechanism::Ping,
            ping_timeout_secs: 1,
            icmp_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    /// Check the daily limit every Nth tick rather than every second.
    pub limit_check_every: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            limit_check_every: 10,
        }
    }
}

/// Load configuration from `path`, or defaults when the file is absent.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if p.exists() => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            let cfg = toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", p.display()))?;
            Ok(cfg)
        }
        Some(p) => {
            tracing::warn!(path = %p.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.speedtest.window_ms, 200);
        assert_eq!(cfg.speedtest.ceiling_secs, 15);
        assert_eq!(cfg.scan.probe, ProbeMechanism::Ping);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            db_path = "/tmp/x.db"

            [scan]
            probe = "icmp"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db_path, "/tmp/x.db");
        assert_eq!(cfg.scan.probe, ProbeMechanism::Icmp);
        assert_eq!(cfg.scan.icmp_timeout_ms, 100);
        assert_eq!(cfg.speedtest.window_ms, 200);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let cfg = load(Some(Path::new("/nonexistent/speedfinder.toml"))).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:8080");
    }
}
