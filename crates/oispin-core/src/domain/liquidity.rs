use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{Roster, Symbol, UtcDateTime};

/// One ranked liquidity measurement.
///
/// `open_interest = 0` with `measured = true` means the symbol was measured
/// and is illiquid; `measured = false` marks a symbol whose fetch failed and
/// was degraded to zero so that the table keeps one row per roster symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRecord {
    pub symbol: Symbol,
    pub open_interest: u64,
    pub rank: u32,
    pub pct_of_max: f64,
    pub measured: bool,
}

impl LiquidityRecord {
    /// An unranked measurement; `rank_and_score` fills rank and pct_of_max.
    pub fn measured(symbol: Symbol, open_interest: u64) -> Self {
        Self {
            symbol,
            open_interest,
            rank: 0,
            pct_of_max: 0.0,
            measured: true,
        }
    }

    /// Placeholder row for a symbol whose measurement failed.
    pub fn unmeasured(symbol: Symbol) -> Self {
        Self {
            symbol,
            open_interest: 0,
            rank: 0,
            pct_of_max: 0.0,
            measured: false,
        }
    }
}

/// Ranked per-symbol liquidity table, held in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityTable {
    pub records: Vec<LiquidityRecord>,
    pub fetched_at: UtcDateTime,
}

impl LiquidityTable {
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.records
            .iter()
            .map(|record| record.symbol.clone())
            .collect()
    }

    /// A table is stale once its age reaches `max_age` (inclusive boundary),
    /// or whenever its symbol set no longer matches the roster: membership
    /// changes force recomputation regardless of age.
    pub fn is_stale(&self, roster: &Roster, now: UtcDateTime, max_age: Duration) -> bool {
        if now.elapsed_since(self.fetched_at) >= max_age {
            return true;
        }
        self.symbols() != *roster.symbols()
    }

    pub fn unmeasured_count(&self) -> usize {
        self.records.iter().filter(|r| !r.measured).count()
    }
}

/// Sort by descending open interest (symbol breaks ties), assign contiguous
/// 1-based ranks, and score each record against the maximum.
///
/// Pure and idempotent; an empty input yields an empty output and the caller
/// is expected to guard against sampling from it.
pub fn rank_and_score(mut records: Vec<LiquidityRecord>) -> Vec<LiquidityRecord> {
    records.sort_by(|a, b| {
        (Reverse(a.open_interest), &a.symbol).cmp(&(Reverse(b.open_interest), &b.symbol))
    });

    let max = records.first().map_or(0, |r| r.open_interest);
    for (index, record) in records.iter_mut().enumerate() {
        record.rank = (index + 1) as u32;
        record.pct_of_max = if max == 0 {
            0.0
        } else {
            round2(record.open_interest as f64 / max as f64 * 100.0)
        };
    }

    records
}

/// Standard median of the open-interest values; an even count averages the
/// two central values. Returns 0 for an empty slice.
pub fn median_open_interest(records: &[LiquidityRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }

    let mut values: Vec<u64> = records.iter().map(|r| r.open_interest).collect();
    values.sort_unstable();

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid] as f64
    } else {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
