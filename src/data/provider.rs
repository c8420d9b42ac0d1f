//! Market-data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the scan engine consumes, so the
//! orchestrator can be exercised against mock data in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CandleSeries, Timeframe};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised at the provider boundary.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Authentication error (invalid or missing credentials)
    Auth(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// The symbol has too little or degenerate data for analysis
    DataNotAvailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
    /// Internal provider error (unexpected status or payload)
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is transient (worth retrying on a later pass).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }

    /// Check if the error means "no signal for this symbol" rather than a
    /// transport failure.
    pub fn is_data_insufficiency(&self) -> bool {
        matches!(self, Self::DataNotAvailable(_))
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// 24-hour ticker statistics for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerStats {
    pub symbol: String,
    /// 24h traded volume in the quote currency.
    pub quote_volume: f64,
}

/// Trait for perpetual-futures market data sources.
///
/// The scan engine only consumes these five operations; the wire format is
/// owned by the implementation.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging (e.g. "binance-futures").
    fn name(&self) -> &'static str;

    /// List symbols of actively trading USDT-margined perpetual contracts.
    async fn list_perpetuals(&self) -> Result<Vec<String>, ProviderError>;

    /// 24-hour ticker snapshot for all symbols, used for universe ranking.
    async fn tickers_24h(&self) -> Result<Vec<TickerStats>, ProviderError>;

    /// OHLCV history for a symbol, oldest bar first, at most `limit` bars.
    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, ProviderError>;

    /// Last funding rate for a symbol, as a fraction (not percent).
    async fn funding_rate(&self, symbol: &str) -> Result<f64, ProviderError>;

    /// Open-interest history for a symbol, oldest first, at most `limit`
    /// points at the given period (e.g. "15m").
    async fn open_interest_hist(
        &self,
        symbol: &str,
        period: &str,
        limit: usize,
    ) -> Result<Vec<f64>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::RateLimited { retry_after_secs: Some(2) }.is_recoverable());
        assert!(!ProviderError::Auth("bad key".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("thin book".into()).is_recoverable());
    }

    #[test]
    fn test_provider_error_insufficiency() {
        assert!(ProviderError::DataNotAvailable("short history".into()).is_data_insufficiency());
        assert!(!ProviderError::Internal("oops".into()).is_data_insufficiency());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited { retry_after_secs: Some(30) };
        assert!(err.to_string().contains("30 seconds"));

        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
