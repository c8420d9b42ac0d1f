//! Pure technical-indicator functions over raw price/volume series.
//!
//! No state, no I/O, no lookahead: every output index depends only on
//! inputs at the same or earlier indices.

/// Floor applied to denominators so zero-range bars and zero prices never
/// divide by zero.
pub const EPS: f64 = 1e-12;

/// Clamp `x` into `[lo, hi]`.
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Percent change of `a` relative to `b`: `(a / b - 1) * 100`.
///
/// Returns 0 when either input is non-finite or `b` is zero.
pub fn pct(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() || b == 0.0 {
        return 0.0;
    }
    (a / b - 1.0) * 100.0
}

/// Exponential moving average with multiplier `k = 2 / (period + 1)`.
///
/// Seeded with the first input value (not an SMA seed), so the output has
/// the same length as the input and is defined from index 0.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);

    for &v in &values[1..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Average true range.
///
/// True range at index 0 is defined as 0 (no previous close). The average
/// is a running-sum hybrid: below `period` bars it divides by the number of
/// true ranges seen so far, from `period` on it is an exact rolling window
/// divided by `period`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut tr = vec![0.0; n];

    for i in 1..n {
        let h = high[i];
        let l = low[i];
        let pc = close[i - 1];
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }

    let mut out = vec![0.0; n];
    let mut sum = 0.0;

    for i in 1..n {
        sum += tr[i];
        if i >= period {
            sum -= tr[i - period];
            out[i] = sum / period as f64;
        } else {
            out[i] = sum / i.max(1) as f64;
        }
    }
    out
}

/// Relative strength index with Wilder's smoothing.
///
/// Output has the input length; indices before the first computable value
/// (and the whole series when fewer than `period + 2` bars exist) default
/// to the neutral 50. A zero average loss forces 100 regardless of gains.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![50.0; n];

    if n < period + 2 {
        return out;
    }

    let mut gain = 0.0;
    let mut loss = 0.0;

    for i in 1..=period {
        let d = close[i] - close[i - 1];
        if d >= 0.0 {
            gain += d;
        } else {
            loss -= d;
        }
    }

    let mut avg_gain = gain / period as f64;
    let mut avg_loss = loss / period as f64;

    out[period] = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    for i in period + 1..n {
        let d = close[i] - close[i - 1];
        let g = if d > 0.0 { d } else { 0.0 };
        let l = if d < 0.0 { -d } else { 0.0 };

        avg_gain = (avg_gain * (period as f64 - 1.0) + g) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + l) / period as f64;

        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }

    out
}

/// Shape decomposition of a single bar.
#[derive(Debug, Clone, Copy)]
pub struct CandleQuality {
    /// Body size as a percentage of the bar range.
    pub body_pct: f64,
    /// Upper wick as a percentage of the bar range.
    pub upper_pct: f64,
    /// Lower wick as a percentage of the bar range.
    pub lower_pct: f64,
    /// Close location value: 0 = close at the low, 1 = close at the high.
    pub clv: f64,
}

/// Decompose one bar into body/wick percentages and close location.
///
/// The range is floored at [`EPS`] so zero-range bars are well defined.
pub fn candle_quality(open: f64, high: f64, low: f64, close: f64) -> CandleQuality {
    let range = (high - low).max(EPS);
    let body = (close - open).abs();
    let upper = high - open.max(close);
    let lower = open.min(close) - low;

    CandleQuality {
        body_pct: body / range * 100.0,
        upper_pct: upper / range * 100.0,
        lower_pct: lower / range * 100.0,
        clv: (close - low) / range,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_constant_series_is_identity() {
        let values = vec![42.0; 50];
        let out = ema(&values, 20);
        assert_eq!(out.len(), values.len());
        for v in out {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ema_empty_input() {
        assert!(ema(&[], 20).is_empty());
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let out = ema(&[10.0, 20.0], 9);
        assert!((out[0] - 10.0).abs() < 1e-12);
        // k = 0.2: 20 * 0.2 + 10 * 0.8 = 12
        assert!((out[1] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_non_negative_and_zero_at_origin() {
        let high = vec![10.0, 12.0, 11.0, 14.0, 9.0];
        let low = vec![9.0, 10.5, 9.5, 11.0, 8.0];
        let close = vec![9.5, 11.0, 10.0, 13.0, 8.5];

        let out = atr(&high, &low, &close, 3);
        assert_eq!(out[0], 0.0);
        for v in out {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn test_atr_partial_window_average() {
        // tr[1] = max(2, |12-9.5|, |10.5-9.5|) = 2.5
        let high = vec![10.0, 12.0];
        let low = vec![9.0, 10.0];
        let close = vec![9.5, 11.0];

        let out = atr(&high, &low, &close, 14);
        assert!((out[1] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_bounds() {
        let close: Vec<f64> = (0..60).map(|i| 100.0 + ((i * 7) % 13) as f64).collect();
        for v in rsi(&close, 14) {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let close: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&close, 14);
        assert!((out[14] - 100.0).abs() < 1e-9);
        assert!((out[39] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_short_series_defaults_to_neutral() {
        let out = rsi(&[100.0, 101.0, 102.0], 14);
        assert!(out.iter().all(|&v| (v - 50.0).abs() < 1e-12));
    }

    #[test]
    fn test_candle_quality_bullish_bar() {
        // open 100, high 101.2, low 99.8, close 101.0
        let q = candle_quality(100.0, 101.2, 99.8, 101.0);
        assert!((q.body_pct - (1.0 / 1.4 * 100.0)).abs() < 1e-6);
        assert!((q.upper_pct - (0.2 / 1.4 * 100.0)).abs() < 1e-6);
        assert!((q.lower_pct - (0.2 / 1.4 * 100.0)).abs() < 1e-6);
        assert!((q.clv - (1.2 / 1.4)).abs() < 1e-9);
    }

    #[test]
    fn test_candle_quality_zero_range_bar() {
        let q = candle_quality(100.0, 100.0, 100.0, 100.0);
        assert_eq!(q.body_pct, 0.0);
        assert_eq!(q.clv, 0.0);
    }

    #[test]
    fn test_pct_guards() {
        assert_eq!(pct(10.0, 0.0), 0.0);
        assert_eq!(pct(f64::NAN, 10.0), 0.0);
        assert!((pct(110.0, 100.0) - 10.0).abs() < 1e-9);
    }
}
