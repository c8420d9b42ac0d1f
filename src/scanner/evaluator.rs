//! Per-symbol, per-side candidate evaluation.
//!
//! Applies the staged filter funnel in strict order, short-circuiting on the
//! first failure: OI change, price change, RSI bound, funding band,
//! volatility band, trend score, entry trigger, then backtest thresholds.
//! Only a symbol surviving every stage becomes a [`Candidate`].

use serde::{Deserialize, Serialize};

use crate::backtest::{simulate, BacktestSummary};
use crate::data::{CandleSeries, SymbolSnapshot};
use crate::indicators::{atr, clamp, pct, rsi, EPS};
use crate::signal::{trend_score, trigger_at_index, Side};

use super::score::composite_score;
use super::settings::{Pass, ScanSettings};

/// Default safety buffer added to the stop distance when capping leverage,
/// percent.
const LEVERAGE_BUFFER_PCT: f64 = 0.35;

/// Hard leverage cap, the exchange maximum.
const LEVERAGE_HARD_CAP: u32 = 125;

/// A fully-vetted trade candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Composite ranking score in [0, 100].
    pub score: f64,
    pub side: Side,
    pub symbol: String,
    /// Which pass produced this row.
    pub pass: Pass,

    // === Backtest ===
    pub win_rate: f64,
    pub trades: u32,
    pub wr_half: f64,
    pub max_consec_loss: u32,
    pub expectancy: f64,

    // === Price levels ===
    pub entry: f64,
    pub tp: f64,
    pub sl: f64,
    pub profit_pct: f64,
    pub loss_pct: f64,
    /// Conservative leverage ceiling derived from the stop distance.
    pub max_lev_safe: u32,

    // === Context ===
    pub price: f64,
    pub funding_pct: f64,
    pub oi_chg_pct: f64,
    pub px_chg_pct: f64,
    pub rsi: f64,
    pub atr_pct: f64,
    pub trend_score: f64,
    pub qv24: f64,
    /// Human-readable rationale listing every contributing metric.
    pub why: String,
}

/// Conservative "liquidation avoidance" leverage cap.
///
/// The liquidation band is roughly `100 / leverage` percent wide, so the cap
/// is the largest integer leverage whose band still clears the stop distance
/// plus a safety buffer. This is an estimate only; the real liquidation
/// price depends on maintenance margin, fees, margin mode and mark price.
pub fn max_safe_leverage(loss_pct: f64, extra_buffer_pct: f64, hard_cap: u32) -> u32 {
    let d = (loss_pct + extra_buffer_pct).max(0.01);
    let lev = (100.0 / d).floor();
    clamp(lev, 1.0, f64::from(hard_cap)) as u32
}

/// Expected profit and loss percentages for the proposed levels.
fn profit_loss_pct(entry: f64, tp: f64, sl: f64, side: Side) -> (f64, f64) {
    if !entry.is_finite() || entry <= 0.0 {
        return (0.0, 0.0);
    }

    match side {
        Side::Long => ((tp / entry - 1.0) * 100.0, (1.0 - sl / entry) * 100.0),
        Side::Short => ((1.0 - tp / entry) * 100.0, (sl / entry - 1.0) * 100.0),
    }
}

/// TP/SL levels from the ATR at the last closed bar.
fn propose_tp_sl(k15: &CandleSeries, tp_mult: f64, sl_mult: f64, entry: f64, side: Side) -> (f64, f64, f64) {
    let atr14 = atr(&k15.high, &k15.low, &k15.close, 14);
    let atr15 = k15
        .last_closed_index()
        .and_then(|i| atr14.get(i).copied())
        .unwrap_or(0.0);

    match side {
        Side::Long => (atr15, entry + atr15 * tp_mult, entry - atr15 * sl_mult),
        Side::Short => (atr15, entry - atr15 * tp_mult, entry + atr15 * sl_mult),
    }
}

/// Evaluate one side of one symbol against the full filter chain.
///
/// Returns `None` as soon as any stage fails.
pub fn evaluate_side(
    snap: &SymbolSnapshot,
    side: Side,
    s: &ScanSettings,
    pass: Pass,
) -> Option<Candidate> {
    if snap.oi_chg_pct < s.min_oi_chg_pct {
        return None;
    }

    let k15 = &snap.k15;
    let i15 = k15.last_closed_index()?;

    let px_chg_pct = pct(k15.close[i15], k15.open[i15]);
    if px_chg_pct.abs() < s.min_abs_px_chg_pct {
        return None;
    }

    let rsi_now = rsi(&k15.close, 14).get(i15).copied().unwrap_or(50.0);
    match side {
        Side::Long if rsi_now > s.max_rsi_long => return None,
        Side::Short if rsi_now < s.min_rsi_short => return None,
        _ => {}
    }

    match side {
        Side::Long => {
            if snap.funding_pct < s.min_funding_long || snap.funding_pct > s.max_funding_long {
                return None;
            }
        }
        Side::Short => {
            if snap.funding_pct < s.min_funding_short || snap.funding_pct > s.max_funding_short {
                return None;
            }
        }
    }

    let atr14 = atr(&k15.high, &k15.low, &k15.close, 14);
    let atr15 = atr14.get(i15).copied().unwrap_or(0.0);
    let atr_pct = atr15 / snap.price.max(EPS) * 100.0;
    if atr_pct < s.min_atr_pct || atr_pct > s.max_atr_pct {
        return None;
    }

    let tr = trend_score(&snap.k1d, &snap.k4h, &snap.k1h, snap.price, side);
    if tr.score < s.min_trend_score {
        return None;
    }

    if !trigger_at_index(k15, i15, side, s) {
        return None;
    }

    let bt = simulate(
        k15,
        s.tp_atr_mult,
        s.sl_atr_mult,
        s.bt_lookahead,
        s.bt_max_signals,
        side,
        |i| trigger_at_index(k15, i, side, s),
    );

    if bt.trades < s.bt_min_trades
        || bt.win_rate < s.bt_min_winrate
        || bt.wr_half < s.bt_min_wr_half
        || bt.max_consec_loss > s.bt_max_consec_loss
        || bt.expectancy < s.min_expectancy
    {
        return None;
    }

    // The signal is assumed executable at market immediately, so the entry
    // is the last closed price rather than a yet-unknown next open.
    let entry = snap.price;
    let (_, tp, sl) = propose_tp_sl(k15, s.tp_atr_mult, s.sl_atr_mult, entry, side);
    let (profit_pct, loss_pct) = profit_loss_pct(entry, tp, sl, side);
    let max_lev_safe = max_safe_leverage(loss_pct, LEVERAGE_BUFFER_PCT, LEVERAGE_HARD_CAP);
    let score = composite_score(tr.score, &bt);

    let why = build_rationale(&tr.detail, snap, px_chg_pct, rsi_now, atr_pct, &bt);

    Some(Candidate {
        score,
        side,
        symbol: snap.symbol.clone(),
        pass,

        win_rate: bt.win_rate,
        trades: bt.trades,
        wr_half: bt.wr_half,
        max_consec_loss: bt.max_consec_loss,
        expectancy: bt.expectancy,

        entry,
        tp,
        sl,
        profit_pct,
        loss_pct,
        max_lev_safe,

        price: snap.price,
        funding_pct: snap.funding_pct,
        oi_chg_pct: snap.oi_chg_pct,
        px_chg_pct,
        rsi: rsi_now,
        atr_pct,
        trend_score: tr.score,
        qv24: snap.qv24,
        why,
    })
}

fn build_rationale(
    trend_detail: &str,
    snap: &SymbolSnapshot,
    px_chg_pct: f64,
    rsi_now: f64,
    atr_pct: f64,
    bt: &BacktestSummary,
) -> String {
    format!(
        "Trend {} \u{00b7} Funding {:.3}% \u{00b7} OI15m {:.2}% \u{00b7} Px15m {:.2}% \u{00b7} RSI {:.1} \u{00b7} ATR% {:.2} \u{00b7} BT Win {:.1}% (N={}) \u{00b7} Half {:.1}% \u{00b7} MaxCL {} \u{00b7} Exp {:.3}",
        trend_detail,
        snap.funding_pct,
        snap.oi_chg_pct,
        px_chg_pct,
        rsi_now,
        atr_pct,
        bt.win_rate,
        bt.trades,
        bt.wr_half,
        bt.max_consec_loss,
        bt.expectancy,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CandleSeries;

    fn flat_series(bars: usize, price: f64) -> CandleSeries {
        let mut series = CandleSeries::with_capacity(bars);
        for _ in 0..bars {
            series.push_bar(price, price * 1.001, price * 0.999, price, 1000.0);
        }
        series
    }

    fn quiet_snapshot() -> SymbolSnapshot {
        SymbolSnapshot {
            symbol: "TESTUSDT".to_string(),
            funding_pct: 0.001,
            oi_chg_pct: 1.0,
            k15: flat_series(400, 100.0),
            k1h: flat_series(200, 100.0),
            k4h: flat_series(200, 100.0),
            k1d: flat_series(200, 100.0),
            price: 100.0,
            qv24: 150_000_000.0,
        }
    }

    #[test]
    fn test_max_safe_leverage_zero_loss_hits_hard_cap() {
        // 100 / 0.35 = 285, clamped to the hard cap.
        assert_eq!(max_safe_leverage(0.0, 0.35, 125), 125);
    }

    #[test]
    fn test_max_safe_leverage_monotone_non_increasing() {
        let mut prev = max_safe_leverage(0.0, 0.35, 125);
        for step in 1..200 {
            let loss_pct = step as f64 * 0.05;
            let lev = max_safe_leverage(loss_pct, 0.35, 125);
            assert!(lev <= prev, "leverage increased at loss_pct {}", loss_pct);
            assert!((1..=125).contains(&lev));
            prev = lev;
        }
    }

    #[test]
    fn test_max_safe_leverage_floor_is_one() {
        assert_eq!(max_safe_leverage(1000.0, 0.35, 125), 1);
    }

    #[test]
    fn test_profit_loss_pct_long() {
        let (profit, loss) = profit_loss_pct(100.0, 102.0, 98.7, Side::Long);
        assert!((profit - 2.0).abs() < 1e-9);
        assert!((loss - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_profit_loss_pct_short() {
        let (profit, loss) = profit_loss_pct(100.0, 98.0, 101.3, Side::Short);
        assert!((profit - 2.0).abs() < 1e-9);
        assert!((loss - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_profit_loss_pct_degenerate_entry() {
        assert_eq!(profit_loss_pct(0.0, 1.0, 2.0, Side::Long), (0.0, 0.0));
        assert_eq!(profit_loss_pct(f64::NAN, 1.0, 2.0, Side::Short), (0.0, 0.0));
    }

    #[test]
    fn test_oi_stage_rejects_first() {
        let mut snap = quiet_snapshot();
        snap.oi_chg_pct = 0.1; // below every pass-1/pass-2 threshold
        assert!(evaluate_side(&snap, Side::Long, &ScanSettings::pass1(), Pass::P1).is_none());
        assert!(evaluate_side(&snap, Side::Short, &ScanSettings::pass2(), Pass::P2).is_none());
    }

    #[test]
    fn test_quiet_tape_never_passes() {
        // A flat tape fails at the price-change stage whatever the side.
        let snap = quiet_snapshot();
        assert!(evaluate_side(&snap, Side::Long, &ScanSettings::pass1(), Pass::P1).is_none());
        assert!(evaluate_side(&snap, Side::Short, &ScanSettings::pass1(), Pass::P1).is_none());
    }

    #[test]
    fn test_tightening_thresholds_is_monotone() {
        // Whatever stage currently rejects a snapshot, tightening any single
        // filter must never turn the rejection into an acceptance.
        let snap = quiet_snapshot();
        let base = ScanSettings::pass1();
        assert!(evaluate_side(&snap, Side::Long, &base, Pass::P1).is_none());

        let mut tighter = base.clone();
        tighter.min_oi_chg_pct += 1.0;
        tighter.min_abs_px_chg_pct += 1.0;
        tighter.min_body_pct += 5.0;
        tighter.min_vol_spike += 1.0;
        tighter.min_trend_score += 5.0;
        tighter.bt_min_trades += 50;
        assert!(evaluate_side(&snap, Side::Long, &tighter, Pass::P1).is_none());
    }

    #[test]
    fn test_rationale_lists_metrics() {
        let snap = quiet_snapshot();
        let bt = BacktestSummary {
            win_rate: 81.3,
            trades: 96,
            wr_half: 79.2,
            max_consec_loss: 2,
            expectancy: 0.41,
        };
        let why = build_rationale("LONG 1D\u{2713} 4H\u{2713} 1H\u{2713} slope:OK", &snap, 0.52, 58.3, 0.64, &bt);

        assert!(why.contains("BT Win 81.3% (N=96)"));
        assert!(why.contains("Half 79.2%"));
        assert!(why.contains("MaxCL 2"));
        assert!(why.contains("OI15m 1.00%"));
        assert!(why.contains("RSI 58.3"));
    }
}
