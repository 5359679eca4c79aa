//! Cache persistence.
//!
//! The engine talks to stores through the two traits below so tests can run
//! against in-memory implementations; the file-backed implementations are
//! the sole writers of the on-disk caches. Both write a fully constructed
//! temp file and rename it over the target, so a reader never observes a
//! partially written cache. A missing or unparseable cache loads as `None`
//! (must-refresh), never as an error.

mod liquidity;
mod memory;
mod roster;

use std::io;

use thiserror::Error;

pub use liquidity::CsvLiquidityStore;
pub use memory::{MemoryLiquidityStore, MemoryRosterStore};
pub use roster::JsonRosterStore;

use crate::{LiquidityTable, Roster};

/// Failure to persist a freshly built cache. The previous cache file is
/// untouched when this is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Persistence seam for the ticker roster.
pub trait RosterStore: Send + Sync {
    /// `None` when the cache is absent or corrupt.
    fn load(&self) -> Option<Roster>;
    fn save(&self, roster: &Roster) -> Result<(), StoreError>;
}

/// Persistence seam for the per-symbol liquidity table.
pub trait LiquidityStore: Send + Sync {
    /// `None` when the cache is absent or corrupt.
    fn load(&self) -> Option<LiquidityTable>;
    fn save(&self, table: &LiquidityTable) -> Result<(), StoreError>;
}
