//! Two-pass scan orchestration over a ranked symbol universe.
//!
//! A fixed-size pool of cooperative workers shares one advancing cursor;
//! each worker memoizes symbol snapshots through the shared cache and
//! evaluates both sides until the per-side candidate targets are met.
//! A second, slightly relaxed pass runs only for the side(s) still short.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::data::{
    MarketDataProvider, ProviderError, SnapshotCache, SymbolSnapshot, Timeframe, UniverseEntry,
};
use crate::indicators::pct;
use crate::signal::Side;

use super::evaluator::{evaluate_side, Candidate};
use super::settings::{Pass, ScanSettings};

/// Pacing delay after a successfully processed symbol, milliseconds.
const PACE_OK_MS: u64 = 55;
/// Pacing delay after a symbol skipped for insufficient data.
const PACE_SKIP_MS: u64 = 70;
/// Backoff delay after a fetch failure.
const PACE_ERR_MS: u64 = 120;

/// Universe floor: even a smaller configured limit scans this many symbols.
const UNIVERSE_FLOOR: usize = 20;

/// Candidates kept for the final report.
const REPORT_TOP_N: usize = 10;

// ============================================================================
// Scan Results
// ============================================================================

/// Which sides a pass is still hunting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassNeeds {
    pub need_long: bool,
    pub need_short: bool,
}

impl PassNeeds {
    pub fn both() -> Self {
        Self {
            need_long: true,
            need_short: true,
        }
    }

    /// Decision gate after a pass: which targets are still unmet.
    pub fn unmet(long_count: usize, short_count: usize, min_per_side: usize) -> Self {
        Self {
            need_long: long_count < min_per_side,
            need_short: short_count < min_per_side,
        }
    }

    pub fn any(&self) -> bool {
        self.need_long || self.need_short
    }
}

/// Run-level aggregate of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Symbols in the ranked universe.
    pub universe: usize,
    /// Candidates found in pass 1.
    pub pass1_candidates: usize,
    /// LONG candidates across both passes.
    pub long_count: usize,
    /// SHORT candidates across both passes.
    pub short_count: usize,
    /// Candidates across both passes, before truncation.
    pub total: usize,
    /// Candidates kept for reporting.
    pub reported: usize,
    /// The sides pass 2 hunted for, if it ran at all.
    pub pass2: Option<PassNeeds>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Final result of `scan_once`: the ranked candidate rows plus the summary.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Top candidates, sorted descending by composite score.
    pub candidates: Vec<Candidate>,
    pub summary: ScanSummary,
}

struct PassResult {
    candidates: Vec<Candidate>,
    long_count: usize,
    short_count: usize,
}

// ============================================================================
// Scan Engine
// ============================================================================

/// The scan orchestrator.
///
/// Owns the configuration and the provider handle; one fresh snapshot cache
/// is created per `scan_once` invocation and shared across both passes.
pub struct ScanEngine<P: MarketDataProvider> {
    config: ScanConfig,
    provider: P,
}

impl<P: MarketDataProvider> ScanEngine<P> {
    pub fn new(config: ScanConfig, provider: P) -> Self {
        Self { config, provider }
    }

    /// Run one full scan: universe build, pass 1, optional pass 2, ranking.
    ///
    /// Per-symbol failures are contained inside the worker loop; only a
    /// failure to produce the universe at all surfaces as an error.
    pub async fn scan_once(&self) -> Result<ScanOutcome, ProviderError> {
        let started_at = Utc::now();

        let universe = self.build_universe().await?;
        info!(universe = universe.len(), "Universe ranked");

        if universe.is_empty() {
            let completed_at = Utc::now();
            return Ok(ScanOutcome {
                candidates: Vec::new(),
                summary: ScanSummary {
                    universe: 0,
                    pass1_candidates: 0,
                    long_count: 0,
                    short_count: 0,
                    total: 0,
                    reported: 0,
                    pass2: None,
                    started_at,
                    completed_at,
                    duration_secs: duration_secs(started_at, completed_at),
                },
            });
        }

        let cache = SnapshotCache::new();

        let p1 = self
            .scan_pass(Pass::P1, &universe, &cache, PassNeeds::both())
            .await;
        info!(
            candidates = p1.candidates.len(),
            long = p1.long_count,
            short = p1.short_count,
            "Pass 1 complete"
        );

        let pass1_candidates = p1.candidates.len();
        let mut all = p1.candidates;
        let mut long_count = p1.long_count;
        let mut short_count = p1.short_count;

        let needs2 = PassNeeds::unmet(long_count, short_count, self.config.min_per_side);
        let pass2 = if needs2.any() {
            let p2 = self.scan_pass(Pass::P2, &universe, &cache, needs2).await;
            info!(
                candidates = p2.candidates.len(),
                need_long = needs2.need_long,
                need_short = needs2.need_short,
                "Pass 2 complete"
            );

            all.extend(p2.candidates);
            long_count += p2.long_count;
            short_count += p2.short_count;
            Some(needs2)
        } else {
            None
        };

        all.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let total = all.len();
        all.truncate(REPORT_TOP_N);

        let completed_at = Utc::now();
        let summary = ScanSummary {
            universe: universe.len(),
            pass1_candidates,
            long_count,
            short_count,
            total,
            reported: all.len(),
            pass2,
            started_at,
            completed_at,
            duration_secs: duration_secs(started_at, completed_at),
        };

        info!(
            universe = summary.universe,
            long = summary.long_count,
            short = summary.short_count,
            total = summary.total,
            reported = summary.reported,
            duration = format!("{:.1}s", summary.duration_secs),
            "Scan complete"
        );

        Ok(ScanOutcome { candidates: all, summary })
    }

    // ========================================================================
    // Universe
    // ========================================================================

    /// Rank tradable perpetuals by 24h quote volume and truncate.
    async fn build_universe(&self) -> Result<Vec<UniverseEntry>, ProviderError> {
        let symbols = self.provider.list_perpetuals().await?;
        let tickers = self.provider.tickers_24h().await?;

        let volumes: HashMap<&str, f64> = tickers
            .iter()
            .map(|t| (t.symbol.as_str(), t.quote_volume))
            .collect();

        let mut ranked: Vec<UniverseEntry> = symbols
            .into_iter()
            .filter_map(|symbol| {
                let qv24 = volumes.get(symbol.as_str()).copied().unwrap_or(0.0);
                (qv24 >= self.config.min_quote_volume).then_some(UniverseEntry { symbol, qv24 })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.qv24
                .partial_cmp(&a.qv24)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.config.limit_symbols.max(UNIVERSE_FLOOR));

        Ok(ranked)
    }

    // ========================================================================
    // Pass Execution
    // ========================================================================

    /// Run one pass with a pool of cooperative workers over a shared cursor.
    async fn scan_pass(
        &self,
        pass: Pass,
        universe: &[UniverseEntry],
        cache: &SnapshotCache,
        needs: PassNeeds,
    ) -> PassResult {
        let settings = ScanSettings::for_pass(pass);
        let cursor = AtomicUsize::new(0);
        let long_count = AtomicUsize::new(0);
        let short_count = AtomicUsize::new(0);
        let candidates: Mutex<Vec<Candidate>> = Mutex::new(Vec::new());

        let worker = |worker_id: usize| {
            let settings = &settings;
            let cursor = &cursor;
            let long_count = &long_count;
            let short_count = &short_count;
            let candidates = &candidates;

            async move {
                loop {
                    let my = cursor.fetch_add(1, Ordering::SeqCst);
                    if my >= universe.len() {
                        break;
                    }

                    // Re-checked before every unit of work: once both side
                    // targets are met the worker retires.
                    let need_long =
                        needs.need_long && long_count.load(Ordering::SeqCst) < self.config.min_per_side;
                    let need_short = needs.need_short
                        && short_count.load(Ordering::SeqCst) < self.config.min_per_side;
                    if !need_long && !need_short {
                        debug!(worker_id, "Side targets met, worker retiring");
                        break;
                    }

                    let entry = &universe[my];

                    match self.load_snapshot(cache, entry).await {
                        Ok(snap) => {
                            if need_long {
                                if let Some(row) = evaluate_side(&snap, Side::Long, settings, pass) {
                                    info!(symbol = %row.symbol, score = row.score, "LONG candidate");
                                    push_candidate(candidates, row);
                                    long_count.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                            if need_short {
                                if let Some(row) = evaluate_side(&snap, Side::Short, settings, pass) {
                                    info!(symbol = %row.symbol, score = row.score, "SHORT candidate");
                                    push_candidate(candidates, row);
                                    short_count.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                            tokio::time::sleep(Duration::from_millis(PACE_OK_MS)).await;
                        }
                        Err(err) if err.is_data_insufficiency() => {
                            debug!(symbol = %entry.symbol, reason = %err, "Symbol skipped");
                            tokio::time::sleep(Duration::from_millis(PACE_SKIP_MS)).await;
                        }
                        Err(err) => {
                            warn!(symbol = %entry.symbol, error = %err, "Symbol fetch failed");
                            tokio::time::sleep(Duration::from_millis(PACE_ERR_MS)).await;
                        }
                    }
                }
            }
        };

        let pool_size = self.config.concurrency.max(1);
        futures::future::join_all((0..pool_size).map(worker)).await;

        PassResult {
            candidates: candidates
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            long_count: long_count.into_inner(),
            short_count: short_count.into_inner(),
        }
    }

    // ========================================================================
    // Snapshot Assembly
    // ========================================================================

    /// Fetch-or-reuse the snapshot for one universe entry.
    async fn load_snapshot(
        &self,
        cache: &SnapshotCache,
        entry: &UniverseEntry,
    ) -> Result<std::sync::Arc<SymbolSnapshot>, ProviderError> {
        cache
            .get_or_fetch(&entry.symbol, || {
                self.fetch_snapshot(&entry.symbol, entry.qv24)
            })
            .await
    }

    /// Assemble a fresh snapshot from the provider.
    async fn fetch_snapshot(
        &self,
        symbol: &str,
        qv24: f64,
    ) -> Result<SymbolSnapshot, ProviderError> {
        let funding_pct = self.provider.funding_rate(symbol).await? * 100.0;

        let oi = self.provider.open_interest_hist(symbol, "15m", 3).await?;
        if oi.len() < 2 {
            return Err(ProviderError::DataNotAvailable(
                "open-interest history too short".into(),
            ));
        }
        let oi_prev = oi[oi.len() - 2];
        let oi_now = oi[oi.len() - 1];
        if !(oi_prev > 0.0 && oi_now > 0.0) {
            return Err(ProviderError::DataNotAvailable(
                "non-positive open interest".into(),
            ));
        }
        let oi_chg_pct = pct(oi_now, oi_prev);

        let k15 = self
            .provider
            .klines(symbol, Timeframe::M15, Timeframe::M15.scan_depth())
            .await?;
        let k1h = self
            .provider
            .klines(symbol, Timeframe::H1, Timeframe::H1.scan_depth())
            .await?;
        let k4h = self
            .provider
            .klines(symbol, Timeframe::H4, Timeframe::H4.scan_depth())
            .await?;
        let k1d = self
            .provider
            .klines(symbol, Timeframe::D1, Timeframe::D1.scan_depth())
            .await?;

        let i15 = k15.last_closed_index().ok_or_else(|| {
            ProviderError::DataNotAvailable("not enough 15m bars".into())
        })?;
        let price = k15.close[i15];
        if !price.is_finite() || price <= 0.0 {
            return Err(ProviderError::DataNotAvailable(
                "non-positive last closed price".into(),
            ));
        }

        Ok(SymbolSnapshot {
            symbol: symbol.to_string(),
            funding_pct,
            oi_chg_pct,
            k15,
            k1h,
            k4h,
            k1d,
            price,
            qv24,
        })
    }
}

fn push_candidate(candidates: &Mutex<Vec<Candidate>>, row: Candidate) {
    candidates
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(row);
}

fn duration_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_needs_gate() {
        // 0 LONG and 1 SHORT against a target of 1 per side: pass 2 must
        // hunt longs only.
        let needs = PassNeeds::unmet(0, 1, 1);
        assert!(needs.need_long);
        assert!(!needs.need_short);
        assert!(needs.any());

        let satisfied = PassNeeds::unmet(1, 1, 1);
        assert!(!satisfied.any());

        let both = PassNeeds::unmet(0, 0, 2);
        assert_eq!(both, PassNeeds::both());
    }

    #[test]
    fn test_duration_secs() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(1500);
        assert!((duration_secs(start, end) - 1.5).abs() < 1e-9);
    }
}
