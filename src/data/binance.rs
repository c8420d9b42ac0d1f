//! Binance USDT-M futures REST adapter.
//!
//! # Endpoints
//! - `/fapi/v1/exchangeInfo` — tradable instruments
//! - `/fapi/v1/ticker/24hr` — 24h ticker statistics
//! - `/fapi/v1/klines` — OHLCV candles
//! - `/fapi/v1/premiumIndex` — mark price / funding rate
//! - `/futures/data/openInterestHist` — open-interest history
//!
//! Kline rows arrive as heterogeneous JSON arrays with string-encoded
//! prices; columns 1-5 are open/high/low/close/volume.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{MarketDataProvider, ProviderError, TickerStats};
use super::rate_limit::RequestPacer;
use super::{CandleSeries, Timeframe};

// ============================================================================
// Constants
// ============================================================================

/// Binance USDT-M futures API base URL.
const API_BASE: &str = "https://fapi.binance.com";

/// Default request budget. The futures API allows 2400 weight per minute;
/// scanner requests are weight 1-10, so stay well under it.
const DEFAULT_RATE_LIMIT_RPM: u32 = 1100;

/// Retry hint handed back on HTTP 429.
const RATE_LIMIT_RETRY_SECS: u64 = 5;

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<InstrumentInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    symbol: String,
    #[serde(default)]
    contract_type: String,
    #[serde(default)]
    quote_asset: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    #[serde(default)]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    #[serde(default)]
    last_funding_rate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestPoint {
    #[serde(default)]
    sum_open_interest: String,
}

// ============================================================================
// Adapter
// ============================================================================

/// Binance USDT-M futures market data adapter.
pub struct BinanceFutures {
    base_url: String,
    client: reqwest::Client,
    pacer: RequestPacer,
}

impl BinanceFutures {
    /// Create an adapter against the production API.
    pub fn new() -> Self {
        Self::with_base_url(API_BASE)
    }

    /// Create an adapter against a custom base URL (tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into(),
            client,
            pacer: RequestPacer::new("binance-futures", DEFAULT_RATE_LIMIT_RPM),
        }
    }

    /// GET a JSON payload, mapping transport and status failures onto
    /// [`ProviderError`].
    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ProviderError> {
        self.pacer.acquire().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, "Fetching from Binance futures");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Network("Request timeout".into())
            } else if e.is_connect() {
                ProviderError::Network("Connection failed".into())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ProviderError::Internal(format!("HTTP {}: {}", status, snippet)));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse response: {}", e)))
    }
}

impl Default for BinanceFutures {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a kline column that may be a JSON string or number.
fn kline_field(row: &[serde_json::Value], idx: usize) -> Option<f64> {
    let v = row.get(idx)?;
    if let Some(s) = v.as_str() {
        return s.parse().ok();
    }
    v.as_f64()
}

/// Parse a string-encoded decimal, defaulting to 0 on empty/invalid input.
fn parse_decimal(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for BinanceFutures {
    fn name(&self) -> &'static str {
        "binance-futures"
    }

    async fn list_perpetuals(&self) -> Result<Vec<String>, ProviderError> {
        let info: ExchangeInfo = self.get_json("/fapi/v1/exchangeInfo").await?;

        let symbols: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.contract_type == "PERPETUAL" && s.quote_asset == "USDT" && s.status == "TRADING"
            })
            .map(|s| s.symbol)
            .collect();

        debug!(count = symbols.len(), "Listed tradable USDT perpetuals");
        Ok(symbols)
    }

    async fn tickers_24h(&self) -> Result<Vec<TickerStats>, ProviderError> {
        let tickers: Vec<Ticker24h> = self.get_json("/fapi/v1/ticker/24hr").await?;

        Ok(tickers
            .into_iter()
            .map(|t| TickerStats {
                symbol: t.symbol,
                quote_volume: parse_decimal(&t.quote_volume),
            })
            .collect())
    }

    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, ProviderError> {
        let path = format!(
            "/fapi/v1/klines?symbol={}&interval={}&limit={}",
            symbol,
            timeframe.interval(),
            limit.min(1500) // API maximum
        );

        let rows: Vec<Vec<serde_json::Value>> = self.get_json(&path).await?;
        let mut series = CandleSeries::with_capacity(rows.len());

        for row in &rows {
            let (open, high, low, close, volume) = match (
                kline_field(row, 1),
                kline_field(row, 2),
                kline_field(row, 3),
                kline_field(row, 4),
                kline_field(row, 5),
            ) {
                (Some(o), Some(h), Some(l), Some(c), Some(v)) => (o, h, l, c, v),
                _ => {
                    return Err(ProviderError::Internal(format!(
                        "Malformed kline row for {}",
                        symbol
                    )))
                }
            };
            series.push_bar(open, high, low, close, volume);
        }

        Ok(series)
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, ProviderError> {
        let path = format!("/fapi/v1/premiumIndex?symbol={}", symbol);
        let prem: PremiumIndex = self.get_json(&path).await?;
        Ok(parse_decimal(&prem.last_funding_rate))
    }

    async fn open_interest_hist(
        &self,
        symbol: &str,
        period: &str,
        limit: usize,
    ) -> Result<Vec<f64>, ProviderError> {
        let path = format!(
            "/futures/data/openInterestHist?symbol={}&period={}&limit={}",
            symbol, period, limit
        );

        let points: Vec<OpenInterestPoint> = self.get_json(&path).await?;
        Ok(points
            .iter()
            .map(|p| parse_decimal(&p.sum_open_interest))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kline_field_handles_strings_and_numbers() {
        let row = vec![json!(1700000000000_u64), json!("101.5"), json!(102.25)];
        assert_eq!(kline_field(&row, 1), Some(101.5));
        assert_eq!(kline_field(&row, 2), Some(102.25));
        assert_eq!(kline_field(&row, 9), None);
    }

    #[test]
    fn test_parse_decimal_defaults_to_zero() {
        assert_eq!(parse_decimal(""), 0.0);
        assert_eq!(parse_decimal("not a number"), 0.0);
        assert_eq!(parse_decimal("0.000125"), 0.000125);
    }

    #[test]
    fn test_exchange_info_filtering_shape() {
        let raw = json!({
            "symbols": [
                {"symbol": "BTCUSDT", "contractType": "PERPETUAL", "quoteAsset": "USDT", "status": "TRADING"},
                {"symbol": "BTCUSDT_240628", "contractType": "CURRENT_QUARTER", "quoteAsset": "USDT", "status": "TRADING"},
                {"symbol": "ETHBTC", "contractType": "PERPETUAL", "quoteAsset": "BTC", "status": "TRADING"},
                {"symbol": "OLDUSDT", "contractType": "PERPETUAL", "quoteAsset": "USDT", "status": "SETTLING"}
            ]
        });

        let info: ExchangeInfo = serde_json::from_value(raw).unwrap();
        let kept: Vec<_> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.contract_type == "PERPETUAL" && s.quote_asset == "USDT" && s.status == "TRADING"
            })
            .map(|s| s.symbol)
            .collect();

        assert_eq!(kept, vec!["BTCUSDT".to_string()]);
    }

    #[test]
    fn test_premium_index_parsing() {
        let raw = json!({"symbol": "BTCUSDT", "lastFundingRate": "0.00010000", "markPrice": "65000.1"});
        let prem: PremiumIndex = serde_json::from_value(raw).unwrap();
        assert_eq!(parse_decimal(&prem.last_funding_rate), 0.0001);
    }
}
