//! Historical TP/SL outcome simulation for a trigger rule.
//!
//! Replays a trigger predicate over the 15m history, enters each signal at
//! the next bar's open (no lookahead), and walks forward until take-profit
//! or stop-loss is touched. When one bar touches both levels the trade is
//! counted as a loss; true intrabar sequencing is unknowable from OHLC data,
//! so the ambiguous case resolves against the position.

use serde::{Deserialize, Serialize};

use crate::data::CandleSeries;
use crate::indicators::atr;
use crate::signal::Side;

/// Bars of history required before any simulation runs.
const MIN_HISTORY_BARS: usize = 320;

/// First candidate signal index; earlier bars are indicator warmup.
const FIRST_SIGNAL_INDEX: usize = 90;

/// ATR period used for entry/exit levels.
const ATR_PERIOD: usize = 14;

/// Sentinel consecutive-loss count for a series too short to simulate.
const FAILING_CONSEC_LOSS: u32 = 999;

/// Aggregated result of one backtest run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Win rate over the full retained sample, percent.
    pub win_rate: f64,
    /// Decided trades (wins + losses); skipped signals are not counted.
    pub trades: u32,
    /// Win rate over the most recent half of the sample, percent.
    pub wr_half: f64,
    /// Longest run of consecutive losses, reset only by a win.
    pub max_consec_loss: u32,
    /// Mean reward multiple per decided trade (+tp_mult win, -sl_mult loss).
    pub expectancy: f64,
}

impl BacktestSummary {
    /// The summary produced when the history is too short to simulate;
    /// fails every downstream threshold.
    pub fn failing() -> Self {
        Self {
            win_rate: 0.0,
            trades: 0,
            wr_half: 0.0,
            max_consec_loss: FAILING_CONSEC_LOSS,
            expectancy: 0.0,
        }
    }
}

struct SampleStats {
    win_rate: f64,
    trades: u32,
    max_consec_loss: u32,
    expectancy: f64,
}

/// Simulate the trigger rule over `k15` history.
///
/// Collects every index in `90..len-2` satisfying `trigger`, keeps the most
/// recent `max_signals` (recency bias by design), and evaluates each with
/// TP/SL at `entry +/- ATR * mult` over at most `lookahead` bars. A second
/// evaluation restricted to the most recent half of the sample yields
/// `wr_half`, catching rules whose edge has decayed.
pub fn simulate<F>(
    k15: &CandleSeries,
    tp_mult: f64,
    sl_mult: f64,
    lookahead: usize,
    max_signals: usize,
    side: Side,
    trigger: F,
) -> BacktestSummary
where
    F: Fn(usize) -> bool,
{
    let n = k15.len();
    if n < MIN_HISTORY_BARS {
        return BacktestSummary::failing();
    }

    let atr14 = atr(&k15.high, &k15.low, &k15.close, ATR_PERIOD);

    let mut signals = Vec::new();
    for i in FIRST_SIGNAL_INDEX..n - 2 {
        if trigger(i) {
            signals.push(i);
        }
    }

    let picked: &[usize] = if signals.len() > max_signals {
        &signals[signals.len() - max_signals..]
    } else {
        &signals
    };

    let all = eval_signals(k15, &atr14, picked, tp_mult, sl_mult, lookahead, side);

    let half_count = (picked.len() / 2).max(1);
    let half_slice = &picked[picked.len().saturating_sub(half_count)..];
    let half = eval_signals(k15, &atr14, half_slice, tp_mult, sl_mult, lookahead, side);

    BacktestSummary {
        win_rate: all.win_rate,
        trades: all.trades,
        wr_half: half.win_rate,
        max_consec_loss: all.max_consec_loss,
        expectancy: all.expectancy,
    }
}

fn eval_signals(
    k15: &CandleSeries,
    atr14: &[f64],
    list: &[usize],
    tp_mult: f64,
    sl_mult: f64,
    lookahead: usize,
    side: Side,
) -> SampleStats {
    let n = k15.len();

    let mut wins = 0u32;
    let mut losses = 0u32;
    let mut consec_loss = 0u32;
    let mut max_consec_loss = 0u32;
    let mut sum_r = 0.0;

    for &i in list {
        let entry_idx = i + 1;
        if entry_idx >= n {
            continue;
        }

        let entry = k15.open[entry_idx];
        let atr_at = atr14[i];
        if atr_at <= 0.0 {
            continue;
        }

        let (tp, sl) = match side {
            Side::Long => (entry + atr_at * tp_mult, entry - atr_at * sl_mult),
            Side::Short => (entry - atr_at * tp_mult, entry + atr_at * sl_mult),
        };

        let mut outcome = 0i8;

        for j in entry_idx..n.min(entry_idx + lookahead) {
            let hh = k15.high[j];
            let ll = k15.low[j];

            let hit_tp = if side.is_long() { hh >= tp } else { ll <= tp };
            let hit_sl = if side.is_long() { ll <= sl } else { hh >= sl };

            // Both levels in one bar: the stop takes priority.
            if hit_tp && hit_sl {
                outcome = -1;
                break;
            }
            if hit_sl {
                outcome = -1;
                break;
            }
            if hit_tp {
                outcome = 1;
                break;
            }
        }

        if outcome == 1 {
            wins += 1;
            consec_loss = 0;
            sum_r += tp_mult;
        } else if outcome == -1 {
            losses += 1;
            consec_loss += 1;
            max_consec_loss = max_consec_loss.max(consec_loss);
            sum_r -= sl_mult;
        }
    }

    let trades = wins + losses;
    let win_rate = if trades > 0 {
        f64::from(wins) / f64::from(trades) * 100.0
    } else {
        0.0
    };
    let expectancy = if trades > 0 { sum_r / f64::from(trades) } else { 0.0 };

    SampleStats {
        win_rate,
        trades,
        max_consec_loss,
        expectancy,
    }
}

// ============================================================================
// Tests
// ============================================================================
