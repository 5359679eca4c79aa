//! Run orchestration: ensure roster fresh, ensure liquidity table fresh,
//! rank, sample, report.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use time::Duration;
use tracing::{debug, info, warn};

use crate::sampler::{select_above_median, InsufficientLiquidPool};
use crate::source::{OpenInterestSource, RosterFetchError, RosterSource};
use crate::store::{LiquidityStore, RosterStore, StoreError};
use crate::{
    median_open_interest, rank_and_score, LiquidityRecord, LiquidityTable, Roster, RosterDiff,
    UtcDateTime, DEFAULT_MAX_CACHE_AGE,
};

/// Tunables for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of tickers to select from the above-median pool.
    pub sample_size: usize,
    /// When set, the sole source of randomness for the draw.
    pub seed: Option<u64>,
    /// Treat both caches as stale regardless of age.
    pub force_refresh: bool,
    /// Age at which a cache must be rebuilt (inclusive boundary).
    pub max_cache_age: Duration,
    /// Bound on concurrent in-flight open-interest fetches.
    pub fetch_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_size: 5,
            seed: None,
            force_refresh: false,
            max_cache_age: DEFAULT_MAX_CACHE_AGE,
            fetch_concurrency: 8,
        }
    }
}

/// Run-level failures. Per-symbol liquidity failures never surface here;
/// they degrade to unmeasured records inside the refresh.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    RosterFetch(#[from] RosterFetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sampling(#[from] InsufficientLiquidPool),
}

/// What one run did and what it selected.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub roster_refreshed: bool,
    pub roster_size: usize,
    pub diff: RosterDiff,
    pub table_refreshed: bool,
    pub unmeasured: usize,
    pub median_open_interest: f64,
    pub selection: Vec<LiquidityRecord>,
}

/// Composes the stores and collaborator sources into the sequential
/// roster -> table -> sample protocol. Owns the in-memory roster and table
/// for the duration of one run; the stores own the on-disk state.
pub struct Engine {
    roster_store: Arc<dyn RosterStore>,
    liquidity_store: Arc<dyn LiquidityStore>,
    roster_source: Arc<dyn RosterSource>,
    open_interest_source: Arc<dyn OpenInterestSource>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        roster_store: Arc<dyn RosterStore>,
        liquidity_store: Arc<dyn LiquidityStore>,
        roster_source: Arc<dyn RosterSource>,
        open_interest_source: Arc<dyn OpenInterestSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            roster_store,
            liquidity_store,
            roster_source,
            open_interest_source,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunReport, EngineError> {
        self.run_at(UtcDateTime::now()).await
    }

    /// Run the protocol against an explicit clock.
    pub async fn run_at(&self, now: UtcDateTime) -> Result<RunReport, EngineError> {
        let max_age = self.config.max_cache_age;

        let (roster, diff, roster_refreshed) = match self.roster_store.load() {
            Some(cached)
                if !self.config.force_refresh && !cached.is_stale(now, max_age) =>
            {
                debug!(symbols = cached.len(), "roster cache is fresh");
                (cached, RosterDiff::default(), false)
            }
            old => {
                info!(forced = self.config.force_refresh, "refreshing roster");
                let symbols = self.roster_source.fetch_roster().await?;
                let fresh = Roster::new(symbols, now)
                    .map_err(|_| RosterFetchError::new("roster source returned no symbols"))?;
                let diff = RosterDiff::between(old.as_ref(), &fresh);
                self.roster_store.save(&fresh)?;
                info!(symbols = fresh.len(), added = diff.added.len(), removed = diff.removed.len(), "roster cached");
                (fresh, diff, true)
            }
        };

        let (table, table_refreshed) = match self.liquidity_store.load() {
            Some(cached)
                if !self.config.force_refresh && !cached.is_stale(&roster, now, max_age) =>
            {
                debug!(rows = cached.records.len(), "liquidity table cache is fresh");
                (cached, false)
            }
            _ => {
                info!(symbols = roster.len(), "rebuilding liquidity table");
                let table = self.refresh_table(&roster, now).await;
                self.liquidity_store.save(&table)?;
                (table, true)
            }
        };

        let mut rng = match self.config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let selection = select_above_median(&table.records, self.config.sample_size, &mut rng)?;

        Ok(RunReport {
            roster_refreshed,
            roster_size: roster.len(),
            diff,
            table_refreshed,
            unmeasured: table.unmeasured_count(),
            median_open_interest: median_open_interest(&table.records),
            selection,
        })
    }

    /// Measure every roster symbol through a bounded concurrent fan-out.
    /// A failed fetch degrades that symbol to an unmeasured zero; ranking
    /// after collection makes the result independent of completion order.
    async fn refresh_table(&self, roster: &Roster, now: UtcDateTime) -> LiquidityTable {
        let bound = self.config.fetch_concurrency.max(1);
        let source = &self.open_interest_source;

        let measurements = stream::iter(roster.symbols().iter().cloned())
            .map(|symbol| async move {
                match source.fetch_open_interest(&symbol).await {
                    Ok(open_interest) => LiquidityRecord::measured(symbol, open_interest),
                    Err(error) => {
                        warn!(symbol = %error.symbol, reason = %error.reason, "recording symbol as unmeasured");
                        LiquidityRecord::unmeasured(symbol)
                    }
                }
            })
            .buffer_unordered(bound)
            .collect::<Vec<_>>()
            .await;

        LiquidityTable {
            records: rank_and_score(measurements),
            fetched_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataUnavailable;
    use crate::store::{MemoryLiquidityStore, MemoryRosterStore};
    use crate::Symbol;
    use std::collections::{BTreeMap, BTreeSet};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRosterSource {
        symbols: Result<Vec<&'static str>, &'static str>,
        calls: AtomicUsize,
    }

    impl StubRosterSource {
        fn ok(symbols: &'static [&'static str]) -> Self {
            Self {
                symbols: Ok(symbols.to_vec()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &'static str) -> Self {
            Self {
                symbols: Err(message),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RosterSource for StubRosterSource {
        fn fetch_roster<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<BTreeSet<Symbol>, RosterFetchError>> + Send + 'a>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.symbols.clone();
            Box::pin(async move {
                let raw = result.map_err(RosterFetchError::new)?;
                Ok(raw
                    .iter()
                    .map(|s| Symbol::parse(s).expect("stub symbols are valid"))
                    .collect())
            })
        }
    }

    struct StubOpenInterestSource {
        table: BTreeMap<&'static str, u64>,
        failing: BTreeSet<&'static str>,
        calls: AtomicUsize,
    }

    impl StubOpenInterestSource {
        fn new(table: &[(&'static str, u64)]) -> Self {
            Self {
                table: table.iter().copied().collect(),
                failing: BTreeSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_failures(mut self, failing: &[&'static str]) -> Self {
            self.failing = failing.iter().copied().collect();
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OpenInterestSource for StubOpenInterestSource {
        fn fetch_open_interest<'a>(
            &'a self,
            symbol: &'a Symbol,
        ) -> Pin<Box<dyn Future<Output = Result<u64, DataUnavailable>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.failing.contains(symbol.as_str()) {
                    return Err(DataUnavailable::new(symbol.clone(), "stub outage"));
                }
                Ok(self.table.get(symbol.as_str()).copied().unwrap_or(0))
            })
        }
    }

    fn engine(
        roster_store: Arc<MemoryRosterStore>,
        liquidity_store: Arc<MemoryLiquidityStore>,
        roster_source: Arc<StubRosterSource>,
        oi_source: Arc<StubOpenInterestSource>,
        config: EngineConfig,
    ) -> Engine {
        Engine::new(roster_store, liquidity_store, roster_source, oi_source, config)
    }

    fn at(timestamp: &str) -> UtcDateTime {
        UtcDateTime::parse(timestamp).expect("valid timestamp")
    }

    #[tokio::test]
    async fn first_run_refreshes_both_caches_without_diff() {
        let roster_store = Arc::new(MemoryRosterStore::new());
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::ok(&["A", "B", "C", "D", "E"]));
        let oi_source = Arc::new(StubOpenInterestSource::new(&[
            ("A", 100),
            ("B", 50),
            ("C", 50),
            ("D", 10),
            ("E", 5),
        ]));

        let engine = engine(
            roster_store.clone(),
            liquidity_store.clone(),
            roster_source,
            oi_source,
            EngineConfig {
                sample_size: 1,
                ..EngineConfig::default()
            },
        );

        let report = engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("run should succeed");

        assert!(report.roster_refreshed);
        assert!(report.table_refreshed);
        assert!(report.diff.is_empty());
        assert_eq!(report.median_open_interest, 50.0);
        assert_eq!(report.selection.len(), 1);
        assert_eq!(report.selection[0].symbol.as_str(), "A");
        assert!(roster_store.load().is_some());
        assert!(liquidity_store.load().is_some());
    }

    #[tokio::test]
    async fn fresh_caches_skip_the_collaborators() {
        let roster_store = Arc::new(MemoryRosterStore::new());
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::ok(&["A", "B", "C"]));
        let oi_source = Arc::new(StubOpenInterestSource::new(&[("A", 30), ("B", 20), ("C", 10)]));

        let engine = engine(
            roster_store,
            liquidity_store,
            roster_source.clone(),
            oi_source.clone(),
            EngineConfig {
                sample_size: 1,
                ..EngineConfig::default()
            },
        );

        engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("first run");
        let report = engine
            .run_at(at("2024-01-03T00:00:00Z"))
            .await
            .expect("second run");

        assert!(!report.roster_refreshed);
        assert!(!report.table_refreshed);
        assert_eq!(roster_source.call_count(), 1);
        assert_eq!(oi_source.call_count(), 3);
    }

    #[tokio::test]
    async fn forced_refresh_hits_both_paths_regardless_of_age() {
        let roster_store = Arc::new(MemoryRosterStore::new());
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::ok(&["A", "B", "C"]));
        let oi_source = Arc::new(StubOpenInterestSource::new(&[("A", 30), ("B", 20), ("C", 10)]));

        let engine = engine(
            roster_store,
            liquidity_store,
            roster_source.clone(),
            oi_source.clone(),
            EngineConfig {
                sample_size: 1,
                force_refresh: true,
                ..EngineConfig::default()
            },
        );

        engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("first run");
        let report = engine
            .run_at(at("2024-01-01T01:00:00Z"))
            .await
            .expect("second run");

        assert!(report.roster_refreshed);
        assert!(report.table_refreshed);
        assert_eq!(roster_source.call_count(), 2);
        assert_eq!(oi_source.call_count(), 6);
    }

    #[tokio::test]
    async fn roster_fetch_failure_leaves_cached_roster_untouched() {
        let cached = Roster::new(
            [Symbol::parse("AAPL").expect("valid")].into_iter().collect(),
            at("2023-12-01T00:00:00Z"),
        )
        .expect("non-empty");
        let roster_store = Arc::new(MemoryRosterStore::seeded(cached.clone()));
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::failing("roster host unreachable"));
        let oi_source = Arc::new(StubOpenInterestSource::new(&[]));

        let engine = engine(
            roster_store.clone(),
            liquidity_store.clone(),
            roster_source,
            oi_source,
            EngineConfig::default(),
        );

        // Cache is past max age, so the run must attempt a refresh and fail.
        let err = engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect_err("run must fail");
        assert!(matches!(err, EngineError::RosterFetch(_)));
        assert_eq!(roster_store.load(), Some(cached));
        assert!(liquidity_store.load().is_none());
    }

    #[tokio::test]
    async fn failed_symbol_degrades_to_unmeasured_record() {
        let roster_store = Arc::new(MemoryRosterStore::new());
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::ok(&["A", "B", "C", "D"]));
        let oi_source = Arc::new(
            StubOpenInterestSource::new(&[("A", 40), ("B", 30), ("C", 20)]).with_failures(&["D"]),
        );

        let engine = engine(
            roster_store,
            liquidity_store.clone(),
            roster_source,
            oi_source,
            EngineConfig {
                sample_size: 1,
                ..EngineConfig::default()
            },
        );

        let report = engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("run should survive one outage");

        assert_eq!(report.unmeasured, 1);
        let table = liquidity_store.load().expect("table cached");
        assert_eq!(table.records.len(), 4);
        let degraded = table
            .records
            .iter()
            .find(|r| r.symbol.as_str() == "D")
            .expect("D is present");
        assert_eq!(degraded.open_interest, 0);
        assert!(!degraded.measured);
    }

    #[tokio::test]
    async fn roster_membership_change_forces_table_rebuild() {
        let roster_store = Arc::new(MemoryRosterStore::new());
        let liquidity_store = Arc::new(MemoryLiquidityStore::new());
        let roster_source = Arc::new(StubRosterSource::ok(&["A", "B"]));
        let oi_source = Arc::new(StubOpenInterestSource::new(&[("A", 30), ("B", 20), ("C", 10)]));

        // Seed a fresh-aged table whose symbol set does not match the roster.
        let stale_shape = LiquidityTable {
            records: rank_and_score(vec![
                LiquidityRecord::measured(Symbol::parse("A").expect("valid"), 30),
                LiquidityRecord::measured(Symbol::parse("C").expect("valid"), 10),
            ]),
            fetched_at: at("2024-01-01T00:00:00Z"),
        };
        liquidity_store
            .save(&stale_shape)
            .expect("seeding the store");

        let engine = engine(
            roster_store,
            liquidity_store.clone(),
            roster_source,
            oi_source,
            EngineConfig {
                sample_size: 1,
                ..EngineConfig::default()
            },
        );

        let report = engine
            .run_at(at("2024-01-01T06:00:00Z"))
            .await
            .expect("run should succeed");

        assert!(report.table_refreshed);
        let table = liquidity_store.load().expect("table cached");
        let symbols: Vec<&str> = table.records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn seeded_runs_reproduce_the_selection() {
        let make_engine = || {
            engine(
                Arc::new(MemoryRosterStore::new()),
                Arc::new(MemoryLiquidityStore::new()),
                Arc::new(StubRosterSource::ok(&["A", "B", "C", "D", "E", "F", "G", "H"])),
                Arc::new(StubOpenInterestSource::new(&[
                    ("A", 80),
                    ("B", 70),
                    ("C", 60),
                    ("D", 50),
                    ("E", 40),
                    ("F", 30),
                    ("G", 20),
                    ("H", 10),
                ])),
                EngineConfig {
                    sample_size: 2,
                    seed: Some(1234),
                    ..EngineConfig::default()
                },
            )
        };

        let first = make_engine()
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("first run");
        let second = make_engine()
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect("second run");

        assert_eq!(first.selection, second.selection);
    }

    #[tokio::test]
    async fn empty_above_median_pool_aborts_the_run() {
        let engine = engine(
            Arc::new(MemoryRosterStore::new()),
            Arc::new(MemoryLiquidityStore::new()),
            Arc::new(StubRosterSource::ok(&["A", "B"])),
            Arc::new(StubOpenInterestSource::new(&[("A", 10), ("B", 10)])),
            EngineConfig {
                sample_size: 1,
                ..EngineConfig::default()
            },
        );

        let err = engine
            .run_at(at("2024-01-01T00:00:00Z"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::Sampling(_)));
    }
}
