//! Multi-timeframe trend scoring.
//!
//! Blends 20/50 EMA alignment and EMA slope across the daily, 4h and 1h
//! timeframes into a directional confidence score in [0, 100], with a
//! proximity penalty when price has already extended past the 1h EMA20.

use crate::data::CandleSeries;
use crate::indicators::{clamp, ema, EPS};

use super::Side;

/// Closed bars required per timeframe before a score is computed at all.
const MIN_CLOSED_BARS: usize = 80;

/// Result of trend scoring: the score plus a compact human-readable
/// breakdown reused in candidate rationales.
#[derive(Debug, Clone)]
pub struct TrendScore {
    pub score: f64,
    pub detail: String,
}

impl TrendScore {
    fn not_enough() -> Self {
        Self {
            score: 0.0,
            detail: "not enough".to_string(),
        }
    }
}

fn slope_up(arr: &[f64], idx: usize, back: usize) -> bool {
    idx >= back && arr[idx] > arr[idx - back]
}

fn slope_down(arr: &[f64], idx: usize, back: usize) -> bool {
    idx >= back && arr[idx] < arr[idx - back]
}

/// Score trend alignment for one side at the last closed bar of each
/// timeframe.
///
/// Weights: daily alignment 38, 4h alignment 30, 1h alignment 22, then
/// slope confirmations 4/3/3. A penalty of up to 22 points is subtracted
/// when price sits more than 1% beyond the 1h EMA20 (an already-extended
/// move is a worse entry). Fewer than 80 closed bars on any timeframe is a
/// hard precondition failure, not a soft penalty.
pub fn trend_score(
    k1d: &CandleSeries,
    k4h: &CandleSeries,
    k1h: &CandleSeries,
    price: f64,
    side: Side,
) -> TrendScore {
    let (Some(i1d), Some(i4h), Some(i1h)) = (
        k1d.last_closed_index(),
        k4h.last_closed_index(),
        k1h.last_closed_index(),
    ) else {
        return TrendScore::not_enough();
    };

    if i1d < MIN_CLOSED_BARS || i4h < MIN_CLOSED_BARS || i1h < MIN_CLOSED_BARS {
        return TrendScore::not_enough();
    }

    let e1d20 = ema(&k1d.close, 20);
    let e1d50 = ema(&k1d.close, 50);
    let e4h20 = ema(&k4h.close, 20);
    let e4h50 = ema(&k4h.close, 50);
    let e1h20 = ema(&k1h.close, 20);
    let e1h50 = ema(&k1h.close, 50);

    let (ok_1d, ok_4h, ok_1h, s_1d, s_4h, s_1h) = match side {
        Side::Long => (
            e1d20[i1d] > e1d50[i1d] && price > e1d20[i1d],
            e4h20[i4h] > e4h50[i4h] && price > e4h20[i4h],
            e1h20[i1h] > e1h50[i1h] && price > e1h20[i1h],
            slope_up(&e1d20, i1d, 6),
            slope_up(&e4h20, i4h, 6),
            slope_up(&e1h20, i1h, 10),
        ),
        Side::Short => (
            e1d20[i1d] < e1d50[i1d] && price < e1d20[i1d],
            e4h20[i4h] < e4h50[i4h] && price < e4h20[i4h],
            e1h20[i1h] < e1h50[i1h] && price < e1h20[i1h],
            slope_down(&e1d20, i1d, 6),
            slope_down(&e4h20, i4h, 6),
            slope_down(&e1h20, i1h, 10),
        ),
    };

    let dist_1h = ((price - e1h20[i1h]) / e1h20[i1h].max(EPS)).abs();
    let over = (dist_1h - 0.010).max(0.0);
    let penalty = clamp(over * 3000.0, 0.0, 22.0);

    let mut score = 0.0;
    score += if ok_1d { 38.0 } else { 0.0 };
    score += if ok_4h { 30.0 } else { 0.0 };
    score += if ok_1h { 22.0 } else { 0.0 };
    score += if s_1d { 4.0 } else { 0.0 };
    score += if s_4h { 3.0 } else { 0.0 };
    score += if s_1h { 3.0 } else { 0.0 };
    score -= penalty;

    let detail = format!(
        "{} {} {} {} slope:{}",
        side,
        if ok_1d { "1D\u{2713}" } else { "1D\u{00d7}" },
        if ok_4h { "4H\u{2713}" } else { "4H\u{00d7}" },
        if ok_1h { "1H\u{2713}" } else { "1H\u{00d7}" },
        if s_1d && s_4h && s_1h { "OK" } else { "mix" },
    );

    TrendScore {
        score: clamp(score, 0.0, 100.0),
        detail,
    }
}

// ============================================================================
// Tests
// ============================================================================
