//! Breakout + pullback entry trigger.
//!
//! A stateless predicate over a single candle index. Checks run in a fixed
//! rejection order and short-circuit on the first failure: candle body,
//! bar return, direction/shape, volume spike, structural breakout, and
//! finally pullback confirmation against the 20-EMA.

use crate::data::CandleSeries;
use crate::indicators::{candle_quality, ema, pct};
use crate::scanner::ScanSettings;

use super::Side;

/// Trailing bars averaged for the volume-spike baseline.
const VOLUME_BASELINE_BARS: usize = 20;

/// Warmup bars required before an index can trigger.
const MIN_TRIGGER_INDEX: usize = 60;

/// Evaluate the entry trigger at candle index `i` for one side.
///
/// Requires `60 <= i < len - 2`: the bar must be closed with headroom for
/// outcome evaluation after it.
pub fn trigger_at_index(k15: &CandleSeries, i: usize, side: Side, s: &ScanSettings) -> bool {
    if i < MIN_TRIGGER_INDEX || i + 2 >= k15.len() {
        return false;
    }

    let oo = k15.open[i];
    let hh = k15.high[i];
    let ll = k15.low[i];
    let cc = k15.close[i];

    let q = candle_quality(oo, hh, ll, cc);
    let ret_pct = pct(cc, oo);

    if q.body_pct < s.min_body_pct {
        return false;
    }
    if ret_pct.abs() < s.min_abs_ret_pct {
        return false;
    }

    match side {
        Side::Long => {
            if !(cc > oo && ret_pct > 0.0) {
                return false;
            }
            if q.clv < s.min_clv_long {
                return false;
            }
            if q.upper_pct > s.max_opp_wick_pct {
                return false;
            }
        }
        Side::Short => {
            if !(cc < oo && ret_pct < 0.0) {
                return false;
            }
            if q.clv > s.max_clv_short {
                return false;
            }
            if q.lower_pct > s.max_opp_wick_pct {
                return false;
            }
        }
    }

    // Volume spike vs the trailing baseline.
    let vol_start = i.saturating_sub(VOLUME_BASELINE_BARS);
    let vol_count = i - vol_start;
    let vol_sum: f64 = k15.volume[vol_start..i].iter().sum();
    let vol_avg = if vol_count > 0 { vol_sum / vol_count as f64 } else { 0.0 };
    let vol_spike = if vol_avg > 0.0 { k15.volume[i] / vol_avg } else { 0.0 };
    if vol_spike < s.min_vol_spike {
        return false;
    }

    // Structural breakout of the trailing window.
    let break_start = i.saturating_sub(s.break_n);
    match side {
        Side::Long => {
            let prev_max = k15.high[break_start..i]
                .iter()
                .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            if !(hh > prev_max) {
                return false;
            }
        }
        Side::Short => {
            let prev_min = k15.low[break_start..i]
                .iter()
                .fold(f64::INFINITY, |a, &b| a.min(b));
            if !(ll < prev_min) {
                return false;
            }
        }
    }

    // Pullback confirmation: price touched the 20-EMA band recently and the
    // trigger bar closed back on the correct side of it.
    let e20 = ema(&k15.close, 20);
    let ema_now = e20[i];
    let band = ema_now * (s.pullback_band_bp / 10_000.0);

    let pull_start = i.saturating_sub(s.pullback_lookback);
    match side {
        Side::Long => {
            let touched = (pull_start..i).any(|j| k15.low[j] <= e20[j] + band);
            touched && cc > ema_now
        }
        Side::Short => {
            let touched = (pull_start..i).any(|j| k15.high[j] >= e20[j] - band);
            touched && cc < ema_now
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanSettings;

    /// Flat tape with a scripted breakout bar at `signal_idx`: strong body,
    /// +1% return, 5x volume, new high, pullback lows already touching the
    /// EMA band.
    fn breakout_series(bars: usize, signal_idx: usize) -> CandleSeries {
        let mut series = CandleSeries::with_capacity(bars);
        for i in 0..bars {
            if i == signal_idx {
                series.push_bar(100.0, 101.1, 99.9, 101.0, 5000.0);
            } else {
                series.push_bar(100.0, 100.05, 99.95, 100.0, 1000.0);
            }
        }
        series
    }

    /// Mirror of `breakout_series` for the short side.
    fn breakdown_series(bars: usize, signal_idx: usize) -> CandleSeries {
        let mut series = CandleSeries::with_capacity(bars);
        for i in 0..bars {
            if i == signal_idx {
                series.push_bar(100.0, 100.1, 98.9, 99.0, 5000.0);
            } else {
                series.push_bar(100.0, 100.05, 99.95, 100.0, 1000.0);
            }
        }
        series
    }

    #[test]
    fn test_scripted_breakout_triggers_only_at_signal_index() {
        let series = breakout_series(400, 120);
        let s = ScanSettings::pass1();

        assert!(trigger_at_index(&series, 120, Side::Long, &s));
        assert!(!trigger_at_index(&series, 119, Side::Long, &s));
        assert!(!trigger_at_index(&series, 121, Side::Long, &s));
    }

    #[test]
    fn test_scripted_breakdown_triggers_short() {
        let series = breakdown_series(400, 120);
        let s = ScanSettings::pass1();

        assert!(trigger_at_index(&series, 120, Side::Short, &s));
        assert!(!trigger_at_index(&series, 120, Side::Long, &s));
    }

    #[test]
    fn test_relaxing_thresholds_preserves_a_pass() {
        let series = breakout_series(400, 120);

        let mut relaxed = ScanSettings::pass1();
        relaxed.min_body_pct = 0.0;
        relaxed.min_abs_ret_pct = 0.0;
        relaxed.min_vol_spike = 0.0;

        // Monotonicity: what passes strict settings must pass relaxed ones.
        assert!(trigger_at_index(&series, 120, Side::Long, &relaxed));
    }

    #[test]
    fn test_warmup_and_headroom_bounds() {
        let series = breakout_series(400, 30);
        let s = ScanSettings::pass1();
        // Signal bar before index 60 can never trigger.
        assert!(!trigger_at_index(&series, 30, Side::Long, &s));

        let tail = breakout_series(400, 398);
        // No closed-bar headroom at the end of the tape.
        assert!(!trigger_at_index(&tail, 398, Side::Long, &s));
        assert!(!trigger_at_index(&tail, 399, Side::Long, &s));
    }

    #[test]
    fn test_weak_body_is_rejected() {
        let mut series = breakout_series(400, 120);
        // Same range, tiny body: open ~ close near the middle of the bar.
        series.open[120] = 100.4;
        series.close[120] = 100.55;
        let s = ScanSettings::pass1();
        assert!(!trigger_at_index(&series, 120, Side::Long, &s));
    }

    #[test]
    fn test_no_volume_spike_is_rejected() {
        let mut series = breakout_series(400, 120);
        series.volume[120] = 1100.0;
        let s = ScanSettings::pass1();
        assert!(!trigger_at_index(&series, 120, Side::Long, &s));
    }

    #[test]
    fn test_no_breakout_is_rejected() {
        let mut series = breakout_series(400, 120);
        // Cap the signal bar below the prior highs while keeping its shape.
        series.open[120] = 99.0;
        series.high[120] = 100.04;
        series.low[120] = 98.9;
        series.close[120] = 99.99;
        let s = ScanSettings::pass1();
        assert!(!trigger_at_index(&series, 120, Side::Long, &s));
    }
}
