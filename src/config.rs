//! Process configuration.
//!
//! Resolved from the environment once at startup and passed explicitly into
//! the engine and the notifier; the core never reads ambient state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when unset or
/// unparseable.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Numeric knobs of the scan orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Universe size cap after liquidity ranking.
    pub limit_symbols: usize,
    /// Minimum 24h quote volume (USDT) for universe membership.
    pub min_quote_volume: f64,
    /// Concurrent scan workers.
    pub concurrency: usize,
    /// Candidates wanted per side before the search stops.
    pub min_per_side: usize,
    /// Base log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log output format: "pretty" or "json".
    pub log_format: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            limit_symbols: 260,
            min_quote_volume: 90_000_000.0,
            concurrency: 4,
            min_per_side: 1,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ScanConfig {
    /// Build from environment variables, with defaults for anything unset.
    ///
    /// Recognized: `LIMIT_SYMBOLS`, `MIN_QVOL`, `CONCURRENCY`,
    /// `MIN_PER_SIDE`, `LOG_LEVEL`, `LOG_FORMAT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            limit_symbols: env_parse("LIMIT_SYMBOLS", defaults.limit_symbols),
            min_quote_volume: env_parse("MIN_QVOL", defaults.min_quote_volume),
            concurrency: env_parse("CONCURRENCY", defaults.concurrency).max(1),
            min_per_side: env_parse("MIN_PER_SIDE", defaults.min_per_side).max(1),
            log_level: env_parse("LOG_LEVEL", defaults.log_level),
            log_format: env_parse("LOG_FORMAT", defaults.log_format),
        }
    }
}

// ============================================================================
// Mail Configuration
// ============================================================================

/// SMTP delivery settings for the candidate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl MailConfig {
    /// Build from environment variables.
    ///
    /// `SMTP_USER` and `SMTP_PASSWORD` are required; `SMTP_HOST` defaults to
    /// Gmail, `SMTP_PORT` to 587, `MAIL_TO` to the sending account. Missing
    /// credentials are a configuration error, surfaced only when a send is
    /// actually attempted.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var("SMTP_USER").context("SMTP_USER not set")?;
        let password = std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?;
        let to = std::env::var("MAIL_TO").unwrap_or_else(|_| username.clone());

        Ok(Self {
            smtp_host: env_parse("SMTP_HOST", "smtp.gmail.com".to_string()),
            smtp_port: env_parse("SMTP_PORT", 587),
            from: username.clone(),
            username,
            password,
            to,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
