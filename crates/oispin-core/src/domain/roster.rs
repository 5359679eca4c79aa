use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{Symbol, UtcDateTime, ValidationError};

/// Default age after which a cached roster or liquidity table must be rebuilt.
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::days(7);

/// The tracked ticker universe as of one fetch.
///
/// Symbols are held in a `BTreeSet`, so iteration order is lexicographic and
/// diff output is deterministic without extra sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    symbols: BTreeSet<Symbol>,
    fetched_at: UtcDateTime,
}

impl Roster {
    /// Wrap a fetched symbol set. An empty set is rejected: a successful
    /// roster fetch always yields members.
    pub fn new(symbols: BTreeSet<Symbol>, fetched_at: UtcDateTime) -> Result<Self, ValidationError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptyRoster);
        }
        Ok(Self {
            symbols,
            fetched_at,
        })
    }

    pub fn symbols(&self) -> &BTreeSet<Symbol> {
        &self.symbols
    }

    pub fn fetched_at(&self) -> UtcDateTime {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// True once the roster's age reaches `max_age`. The boundary is
    /// inclusive: a roster aged exactly `max_age` is stale.
    pub fn is_stale(&self, now: UtcDateTime, max_age: Duration) -> bool {
        now.elapsed_since(self.fetched_at) >= max_age
    }
}

/// Membership changes between two rosters, both sides lexicographically
/// sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub added: Vec<Symbol>,
    pub removed: Vec<Symbol>,
}

impl RosterDiff {
    /// Set difference of `new` against `old`. With no prior roster there is
    /// nothing to report: both sides are empty on a first run.
    pub fn between(old: Option<&Roster>, new: &Roster) -> Self {
        let Some(old) = old else {
            return Self::default();
        };

        let added = new
            .symbols
            .difference(&old.symbols)
            .cloned()
            .collect::<Vec<_>>();
        let removed = old
            .symbols
            .difference(&new.symbols)
            .cloned()
            .collect::<Vec<_>>();

        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
