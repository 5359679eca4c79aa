//! Collaborator contracts consumed by the engine.
//!
//! The engine never names a concrete transport or provider; it sees exactly
//! two injected capabilities:
//!
//! | Trait | Yields | Failure |
//! |-------|--------|---------|
//! | [`RosterSource`] | current ticker set | [`RosterFetchError`] (fatal for the run) |
//! | [`OpenInterestSource`] | nearest-expiry open interest for one symbol | [`DataUnavailable`] (absorbed per symbol) |

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::Symbol;

/// Whole-roster acquisition failure. Aborts the run before any cache
/// mutation; the previously cached roster stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("roster fetch failed: {message}")]
pub struct RosterFetchError {
    message: String,
}

impl RosterFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Per-symbol liquidity measurement failure. Never fatal: the engine records
/// the symbol as an unmeasured zero instead of dropping it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no option data for {symbol}: {reason}")]
pub struct DataUnavailable {
    pub symbol: Symbol,
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(symbol: Symbol, reason: impl Into<String>) -> Self {
        Self {
            symbol,
            reason: reason.into(),
        }
    }
}

/// Provider of the current ticker universe.
pub trait RosterSource: Send + Sync {
    fn fetch_roster<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BTreeSet<Symbol>, RosterFetchError>> + Send + 'a>>;
}

/// Provider of the nearest-expiry option open interest for one symbol.
pub trait OpenInterestSource: Send + Sync {
    fn fetch_open_interest<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<u64, DataUnavailable>> + Send + 'a>>;
}
