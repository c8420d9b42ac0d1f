//! Market data types and acquisition for the scanner.
//!
//! Provides the provider abstraction, the Binance USDT-M futures adapter,
//! and the per-run snapshot cache shared by scan workers.

mod binance;
mod cache;
mod provider;
mod rate_limit;

pub use binance::BinanceFutures;
pub use cache::SnapshotCache;
pub use provider::{MarketDataProvider, ProviderError, TickerStats};
pub use rate_limit::RequestPacer;

use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Candle timeframe used by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 15-minute candles
    M15,
    /// 1-hour candles
    H1,
    /// 4-hour candles
    H4,
    /// Daily candles
    D1,
}

impl Timeframe {
    /// Provider interval string ("15m", "1h", "4h", "1d").
    pub fn interval(&self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }

    /// History depth (bar count) fetched for this timeframe on each scan.
    pub fn scan_depth(&self) -> usize {
        match self {
            Self::M15 => 720,
            Self::H1 => 520,
            Self::H4 => 420,
            Self::D1 => 340,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.interval())
    }
}

/// OHLCV history as parallel column vectors, oldest bar first.
///
/// All five columns always have identical length. The final element is the
/// still-forming bar; analysis reads index `len - 2` as the last closed bar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandleSeries {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleSeries {
    /// Create an empty series with room for `n` bars.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    /// Append one bar, keeping the columns aligned.
    pub fn push_bar(&mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(volume);
    }

    /// Number of bars, including the still-forming last bar.
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Index of the last closed bar, if at least two bars exist.
    pub fn last_closed_index(&self) -> Option<usize> {
        self.close.len().checked_sub(2)
    }
}

/// Per-symbol data bundle assembled once per scan run.
///
/// Immutable after creation; owned by the shared [`SnapshotCache`] and
/// handed to workers as `Arc<SymbolSnapshot>`.
#[derive(Debug, Clone)]
pub struct SymbolSnapshot {
    pub symbol: String,
    /// Last funding rate, in percent.
    pub funding_pct: f64,
    /// 15-minute open-interest change, in percent.
    pub oi_chg_pct: f64,
    pub k15: CandleSeries,
    pub k1h: CandleSeries,
    pub k4h: CandleSeries,
    pub k1d: CandleSeries,
    /// Close of the last closed 15m bar.
    pub price: f64,
    /// 24-hour quote volume (USDT).
    pub qv24: f64,
}

/// One entry of the ranked scan universe: symbol plus its 24h quote volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    pub qv24: f64,
}

// ============================================================================
// Tests
// ============================================================================
