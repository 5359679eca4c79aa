//! CLI argument definitions for oispin.
//!
//! Single-purpose binary: one invocation refreshes whatever is stale, ranks
//! the roster by nearest-expiry option open interest, and prints a random
//! above-median pick.
//!
//! # Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `-n, --count` | `5` | Number of tickers to select (>= 1) |
//! | `--seed` | none | RNG seed for reproducible sampling |
//! | `--refresh` | `false` | Force both caches stale regardless of age |
//! | `--cache-dir` | `$OISPIN_HOME` | Cache directory override |
//! | `--max-age-days` | `7` | Cache staleness window |
//! | `--concurrency` | `8` | Bound on in-flight open-interest fetches |
//! | `--timeout-ms` | `10000` | Per-request HTTP timeout |

use std::path::PathBuf;

use clap::Parser;

/// Pick N above-median-liquidity S&P 500 tickers.
///
/// Open interest on the nearest option expiry is the liquidity proxy. The
/// roster and the liquidity table are cached on disk and rebuilt when stale.
#[derive(Debug, Parser)]
#[command(
    name = "oispin",
    version,
    about = "Pick N above-median-liquidity S&P 500 tickers"
)]
pub struct Cli {
    /// Number of random tickers to output.
    #[arg(short = 'n', long = "count", default_value_t = 5, value_parser = parse_count)]
    pub count: usize,

    /// RNG seed for reproducibility; same seed, same caches, same picks.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Force refresh of roster and liquidity caches regardless of age.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,

    /// Directory holding the cache files (default: $OISPIN_HOME, else
    /// ~/.oispin).
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Cache age in days at which a refresh is forced (boundary inclusive).
    #[arg(long, default_value_t = 7, value_parser = parse_days)]
    pub max_age_days: i64,

    /// Bound on concurrent open-interest fetches.
    #[arg(long, default_value_t = 8, value_parser = parse_count)]
    pub concurrency: usize,

    /// Per-request HTTP timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

fn parse_count(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| String::from("expected a positive integer"))?;
    if value == 0 {
        return Err(String::from("must be at least 1"));
    }
    Ok(value)
}

fn parse_days(raw: &str) -> Result<i64, String> {
    let value: i64 = raw
        .parse()
        .map_err(|_| String::from("expected a number of days"))?;
    if value < 0 {
        return Err(String::from("must not be negative"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = Cli::parse_from(["oispin"]);
        assert_eq!(cli.count, 5);
        assert_eq!(cli.seed, None);
        assert!(!cli.refresh);
        assert_eq!(cli.max_age_days, 7);
    }

    #[test]
    fn rejects_zero_count() {
        assert!(Cli::try_parse_from(["oispin", "-n", "0"]).is_err());
    }

    #[test]
    fn accepts_seed_and_refresh() {
        let cli = Cli::parse_from(["oispin", "-n", "3", "--seed", "42", "--refresh"]);
        assert_eq!(cli.count, 3);
        assert_eq!(cli.seed, Some(42));
        assert!(cli.refresh);
    }
}
