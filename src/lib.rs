//! perpscan — perpetual-futures market scanner.
//!
//! Ranks a liquidity-filtered universe of USDT-margined perpetuals, then
//! hunts each side (LONG/SHORT) for breakout/pullback momentum setups that
//! survive a staged filter chain and a historical TP/SL backtest.
//!
//! # Pipeline
//!
//! ```text
//! universe ranking (24h quote volume)
//!   └─ pass 1 (strict) ── worker pool ── snapshot cache
//!        └─ per side: OI Δ → price Δ → RSI → funding → ATR band
//!             → trend score → trigger → backtest thresholds
//!   └─ pass 2 (relaxed, deficient sides only, cache reused)
//!   └─ composite ranking → top 10 → HTML report → SMTP
//! ```
//!
//! The scan engine is generic over [`data::MarketDataProvider`], so the
//! whole orchestration runs against mock data in tests.

#![warn(clippy::all)]

pub mod backtest;
pub mod config;
pub mod data;
pub mod indicators;
pub mod logging;
pub mod report;
pub mod scanner;
pub mod signal;
