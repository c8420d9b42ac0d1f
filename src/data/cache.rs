//! Per-run snapshot cache shared by scan workers.
//!
//! Memoizes one [`SymbolSnapshot`] per symbol with single-flight fetch
//! semantics: concurrent requests for the same symbol perform at most one
//! fetch, later callers await and observe the first result. Failed fetches
//! are not cached, so a later pass may retry the symbol.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

use super::provider::ProviderError;
use super::SymbolSnapshot;

type Slot = Arc<OnceCell<Arc<SymbolSnapshot>>>;

/// Concurrent-safe memoizing snapshot cache, keyed by symbol.
#[derive(Default)]
pub struct SnapshotCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached snapshot for `symbol`, or run `fetch` to produce it.
    ///
    /// At most one fetch is in flight per symbol; concurrent callers await
    /// the winner's result. An `Err` leaves the slot empty.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        symbol: &str,
        fetch: F,
    ) -> Result<Arc<SymbolSnapshot>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SymbolSnapshot, ProviderError>>,
    {
        let slot = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            entries.entry(symbol.to_string()).or_default().clone()
        };

        slot.get_or_try_init(|| async move { fetch().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Number of symbols with a resolved snapshot.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CandleSeries;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_snapshot(symbol: &str) -> SymbolSnapshot {
        SymbolSnapshot {
            symbol: symbol.to_string(),
            funding_pct: 0.01,
            oi_chg_pct: 1.0,
            k15: CandleSeries::default(),
            k1h: CandleSeries::default(),
            k4h: CandleSeries::default(),
            k1d: CandleSeries::default(),
            price: 100.0,
            qv24: 1_000_000.0,
        }
    }

    #[tokio::test]
    async fn test_second_call_is_memoized() {
        let cache = SnapshotCache::new();
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let snap = cache
                .get_or_fetch("BTCUSDT", || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(make_snapshot("BTCUSDT"))
                })
                .await
                .unwrap();
            assert_eq!(snap.symbol, "BTCUSDT");
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = Arc::new(SnapshotCache::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        let slow_fetch = |fetches: Arc<AtomicUsize>| async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(make_snapshot("ETHUSDT"))
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("ETHUSDT", || slow_fetch(fetches.clone())),
            cache.get_or_fetch("ETHUSDT", || slow_fetch(fetches.clone())),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = SnapshotCache::new();
        let fetches = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch("XRPUSDT", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Network("down".into()))
            })
            .await;
        assert!(first.is_err());
        assert_eq!(cache.len(), 0);

        let second = cache
            .get_or_fetch("XRPUSDT", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(make_snapshot("XRPUSDT"))
            })
            .await;
        assert!(second.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_symbols_have_distinct_slots() {
        let cache = SnapshotCache::new();

        cache
            .get_or_fetch("AUSDT", || async { Ok(make_snapshot("AUSDT")) })
            .await
            .unwrap();
        cache
            .get_or_fetch("BUSDT", || async { Ok(make_snapshot("BUSDT")) })
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
    }
}
