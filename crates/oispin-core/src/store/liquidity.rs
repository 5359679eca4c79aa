use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LiquidityStore, StoreError};
use crate::{LiquidityRecord, LiquidityTable, UtcDateTime};

pub const LIQUIDITY_CACHE_FILE: &str = "sp500_option_liquidity.csv";
pub const LIQUIDITY_STAMP_FILE: &str = "sp500_option_liquidity.meta.json";

/// The CSV carries the table rows; the stamp file carries `fetched_at`.
#[derive(Debug, Serialize, Deserialize)]
struct CacheStamp {
    fetched_at: UtcDateTime,
}

/// File-backed liquidity store: a CSV table
/// (`symbol,open_interest,rank,pct_of_max,measured`) keyed by symbol, plus a
/// JSON stamp alongside it.
///
/// On save the CSV is renamed into place before the stamp; a load requires
/// both files, so a crash between the renames either reads back as absent
/// (first save) or keeps the previous stamp and reads as stale. The stamp is
/// never newer than the rows it describes.
pub struct CsvLiquidityStore {
    csv_path: PathBuf,
    stamp_path: PathBuf,
}

impl CsvLiquidityStore {
    /// Store rooted at `dir`, using the conventional cache file names.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            csv_path: dir.join(LIQUIDITY_CACHE_FILE),
            stamp_path: dir.join(LIQUIDITY_STAMP_FILE),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn read_records(&self) -> Result<Vec<LiquidityRecord>, StoreError> {
        let mut reader = csv::Reader::from_path(&self.csv_path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<LiquidityRecord>() {
            records.push(row?);
        }
        Ok(records)
    }
}

impl LiquidityStore for CsvLiquidityStore {
    fn load(&self) -> Option<LiquidityTable> {
        if !self.csv_path.exists() || !self.stamp_path.exists() {
            return None;
        }

        let stamp = match fs::read_to_string(&self.stamp_path)
            .map_err(StoreError::from)
            .and_then(|raw| serde_json::from_str::<CacheStamp>(&raw).map_err(StoreError::from))
        {
            Ok(stamp) => stamp,
            Err(error) => {
                warn!(path = %self.stamp_path.display(), %error, "liquidity stamp corrupt; treating cache as absent");
                return None;
            }
        };

        match self.read_records() {
            Ok(records) if !records.is_empty() => Some(LiquidityTable {
                records,
                fetched_at: stamp.fetched_at,
            }),
            Ok(_) => {
                warn!(path = %self.csv_path.display(), "liquidity cache is empty; treating as absent");
                None
            }
            Err(error) => {
                warn!(path = %self.csv_path.display(), %error, "liquidity cache corrupt; treating as absent");
                None
            }
        }
    }

    fn save(&self, table: &LiquidityTable) -> Result<(), StoreError> {
        if let Some(parent) = self.csv_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stamp = serde_json::to_string_pretty(&CacheStamp {
            fetched_at: table.fetched_at,
        })?;

        let csv_tmp = self.csv_path.with_extension("csv.tmp");
        let stamp_tmp = self.stamp_path.with_extension("json.tmp");

        let mut writer = csv::Writer::from_path(&csv_tmp)?;
        for record in &table.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        drop(writer);

        fs::write(&stamp_tmp, stamp)?;
        fs::rename(&csv_tmp, &self.csv_path)?;
        fs::rename(&stamp_tmp, &self.stamp_path)?;
        Ok(())
    }
}
