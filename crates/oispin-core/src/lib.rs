//! # Oispin Core
//!
//! Cache-and-rank engine behind the `oispin` CLI: keep a cached ticker
//! roster and a cached per-symbol option open-interest table, rebuild either
//! when stale, rank by open interest, and sample tickers from the
//! strictly-above-median pool.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Production collaborators (Wikipedia roster, Yahoo option chains) |
//! | [`domain`] | Domain models (Symbol, Roster, LiquidityTable, UtcDateTime) |
//! | [`engine`] | Run orchestration (refresh, rank, sample, report) |
//! | [`error`] | Validation errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`sampler`] | Above-median selection |
//! | [`source`] | Collaborator traits and their error contracts |
//! | [`store`] | Cache persistence (JSON roster, CSV liquidity table) |
//!
//! ## Freshness rules
//!
//! A cached roster is stale once its age reaches the configured maximum
//! (default 7 days, boundary inclusive). The liquidity table is stale on the
//! same age rule, and additionally whenever its symbol set no longer equals
//! the roster's: membership changes force recomputation regardless of age.
//! Corrupt or missing cache files read as absent and trigger a refresh; they
//! never fail a run.
//!
//! ## Failure policy
//!
//! A roster fetch failure aborts the run before any cache mutation. A
//! per-symbol open-interest failure degrades that symbol to an unmeasured
//! zero-row so the table keeps one auditable row per roster symbol. Cache
//! writes are atomic: a fully constructed file is renamed over the previous
//! one, so no reader ever observes a partial cache.

pub mod adapters;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod sampler;
pub mod source;
pub mod store;

// Re-export commonly used types at crate root for convenience

pub use adapters::{WikipediaRosterSource, YahooOpenInterestSource};

pub use domain::{
    median_open_interest, rank_and_score, LiquidityRecord, LiquidityTable, Roster, RosterDiff,
    Symbol, UtcDateTime, DEFAULT_MAX_CACHE_AGE,
};

pub use engine::{Engine, EngineConfig, EngineError, RunReport};

pub use error::ValidationError;

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use sampler::{select_above_median, InsufficientLiquidPool};

pub use source::{DataUnavailable, OpenInterestSource, RosterFetchError, RosterSource};

pub use store::{
    CsvLiquidityStore, JsonRosterStore, LiquidityStore, MemoryLiquidityStore, MemoryRosterStore,
    RosterStore, StoreError,
};
