//! Threshold settings for the two scan passes.
//!
//! Pass 1 is deliberately extreme; pass 2 relaxes a subset of fields very
//! slightly when a side came up short, while keeping the win-rate filters
//! intact. Both variants are plain immutable values derived from one base
//! via struct-update overrides.

use serde::{Deserialize, Serialize};

/// Which scan pass produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    P1,
    P2,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P1 => f.write_str("P1"),
            Self::P2 => f.write_str("P2"),
        }
    }
}

/// All numeric thresholds consumed by the evaluator, trigger and backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    // === Symbol-level filters ===
    /// Minimum 15m open-interest change, percent.
    pub min_oi_chg_pct: f64,
    /// Minimum absolute 15m price change, percent.
    pub min_abs_px_chg_pct: f64,

    // === Trigger candle shape ===
    /// Minimum candle body as percent of range.
    pub min_body_pct: f64,
    /// Minimum absolute bar return, percent.
    pub min_abs_ret_pct: f64,
    /// Minimum volume vs the trailing 20-bar average.
    pub min_vol_spike: f64,
    /// Minimum close-location value for longs.
    pub min_clv_long: f64,
    /// Maximum close-location value for shorts.
    pub max_clv_short: f64,
    /// Maximum opposite-side wick as percent of range.
    pub max_opp_wick_pct: f64,
    /// Trailing bars a breakout must clear.
    pub break_n: usize,
    /// Trailing bars searched for a 20-EMA pullback touch.
    pub pullback_lookback: usize,
    /// Pullback band around the 20-EMA, basis points.
    pub pullback_band_bp: f64,

    // === Momentum bounds ===
    /// RSI ceiling for longs (no chasing overbought).
    pub max_rsi_long: f64,
    /// RSI floor for shorts (no chasing oversold).
    pub min_rsi_short: f64,

    // === Funding bands, percent, asymmetric per side ===
    pub min_funding_long: f64,
    pub max_funding_long: f64,
    pub min_funding_short: f64,
    pub max_funding_short: f64,

    // === Volatility band ===
    /// Minimum ATR as percent of price.
    pub min_atr_pct: f64,
    /// Maximum ATR as percent of price.
    pub max_atr_pct: f64,

    // === Exit levels ===
    /// Take-profit distance, ATR multiples.
    pub tp_atr_mult: f64,
    /// Stop-loss distance, ATR multiples.
    pub sl_atr_mult: f64,

    // === Backtest thresholds ===
    /// Bars walked forward per simulated trade.
    pub bt_lookahead: usize,
    /// Most recent signals retained per backtest.
    pub bt_max_signals: usize,
    /// Minimum decided trades.
    pub bt_min_trades: u32,
    /// Minimum win rate, percent.
    pub bt_min_winrate: f64,
    /// Minimum recent-half win rate, percent.
    pub bt_min_wr_half: f64,
    /// Maximum tolerated consecutive-loss run.
    pub bt_max_consec_loss: u32,
    /// Minimum expectancy, reward multiples per trade.
    pub min_expectancy: f64,

    // === Trend ===
    /// Minimum multi-timeframe trend score.
    pub min_trend_score: f64,
}

impl ScanSettings {
    /// Strict pass-1 thresholds.
    pub fn pass1() -> Self {
        Self {
            min_oi_chg_pct: 0.70,
            min_abs_px_chg_pct: 0.25,

            min_body_pct: 70.0,
            min_abs_ret_pct: 0.60,
            min_vol_spike: 2.6,
            min_clv_long: 0.72,
            max_clv_short: 0.28,
            max_opp_wick_pct: 22.0,
            break_n: 26,
            pullback_lookback: 10,
            pullback_band_bp: 28.0,

            max_rsi_long: 64.0,
            min_rsi_short: 36.0,

            min_funding_long: -0.030,
            max_funding_long: 0.005,
            min_funding_short: -0.004,
            max_funding_short: 0.035,

            min_atr_pct: 0.22,
            max_atr_pct: 1.70,

            tp_atr_mult: 0.80,
            sl_atr_mult: 1.30,

            bt_lookahead: 22,
            bt_max_signals: 160,
            bt_min_trades: 85,
            bt_min_winrate: 78.0,
            bt_min_wr_half: 76.0,
            bt_max_consec_loss: 2,
            min_expectancy: 0.03,

            min_trend_score: 82.0,
        }
    }

    /// Relaxed pass-2 thresholds: a small override set on top of pass 1.
    pub fn pass2() -> Self {
        Self {
            min_oi_chg_pct: 0.60,
            min_abs_px_chg_pct: 0.20,
            min_body_pct: 66.0,
            min_abs_ret_pct: 0.50,
            min_vol_spike: 2.2,
            break_n: 22,
            max_opp_wick_pct: 26.0,
            max_rsi_long: 66.0,
            min_rsi_short: 34.0,
            max_atr_pct: 2.05,
            min_trend_score: 80.0,
            ..Self::pass1()
        }
    }

    /// Settings variant for a pass.
    pub fn for_pass(pass: Pass) -> Self {
        match pass {
            Pass::P1 => Self::pass1(),
            Pass::P2 => Self::pass2(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass2_relaxes_entry_filters() {
        let p1 = ScanSettings::pass1();
        let p2 = ScanSettings::pass2();

        assert!(p2.min_oi_chg_pct < p1.min_oi_chg_pct);
        assert!(p2.min_body_pct < p1.min_body_pct);
        assert!(p2.min_vol_spike < p1.min_vol_spike);
        assert!(p2.break_n < p1.break_n);
        assert!(p2.max_rsi_long > p1.max_rsi_long);
        assert!(p2.max_atr_pct > p1.max_atr_pct);
        assert!(p2.min_trend_score < p1.min_trend_score);
    }

    #[test]
    fn test_pass2_keeps_backtest_filters() {
        let p1 = ScanSettings::pass1();
        let p2 = ScanSettings::pass2();

        assert_eq!(p2.bt_min_trades, p1.bt_min_trades);
        assert_eq!(p2.bt_min_winrate, p1.bt_min_winrate);
        assert_eq!(p2.bt_min_wr_half, p1.bt_min_wr_half);
        assert_eq!(p2.bt_max_consec_loss, p1.bt_max_consec_loss);
        assert_eq!(p2.min_expectancy, p1.min_expectancy);
        assert_eq!(p2.tp_atr_mult, p1.tp_atr_mult);
        assert_eq!(p2.sl_atr_mult, p1.sl_atr_mult);
    }

    #[test]
    fn test_pass_display() {
        assert_eq!(Pass::P1.to_string(), "P1");
        assert_eq!(Pass::P2.to_string(), "P2");
    }
}
