//! Above-median selection.

use thiserror::Error;

use crate::{median_open_interest, LiquidityRecord};

/// The above-median candidate pool is empty. Fatal for the run and
/// user-visible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no symbols strictly above the median open interest (requested {needed})")]
pub struct InsufficientLiquidPool {
    pub needed: usize,
}

/// Select up to `n` records whose open interest is strictly above the median
/// of `records`.
///
/// A record exactly at the median is excluded: the median is the boundary,
/// not the floor. When `n` covers the whole pool the pool is returned in
/// rank-ascending order without consulting the generator, so the result is
/// deterministic and seed-independent. Otherwise `n` distinct records are
/// drawn uniformly without replacement; the same seed over the same pool
/// reproduces the same selection.
pub fn select_above_median(
    records: &[LiquidityRecord],
    n: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<LiquidityRecord>, InsufficientLiquidPool> {
    let median = median_open_interest(records);

    let mut pool: Vec<LiquidityRecord> = records
        .iter()
        .filter(|record| record.open_interest as f64 > median)
        .cloned()
        .collect();
    pool.sort_by_key(|record| record.rank);

    if pool.is_empty() {
        return Err(InsufficientLiquidPool { needed: n.max(1) });
    }

    if n >= pool.len() {
        return Ok(pool);
    }

    // Partial Fisher-Yates: after i swaps the prefix holds i uniform draws
    // without replacement.
    for i in 0..n {
        let j = rng.usize(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(n);

    Ok(pool)
}
