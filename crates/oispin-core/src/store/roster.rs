use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{RosterStore, StoreError};
use crate::Roster;

pub const ROSTER_CACHE_FILE: &str = "sp500_members.json";

/// File-backed roster store: one JSON document holding the symbol set and
/// its fetch timestamp.
pub struct JsonRosterStore {
    path: PathBuf,
}

impl JsonRosterStore {
    /// Store rooted at `dir`, using the conventional cache file name.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(ROSTER_CACHE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RosterStore for JsonRosterStore {
    fn load(&self) -> Option<Roster> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), %error, "roster cache unreadable; treating as absent");
                }
                return None;
            }
        };

        match serde_json::from_str::<Roster>(&raw) {
            Ok(roster) if !roster.is_empty() => Some(roster),
            Ok(_) => {
                warn!(path = %self.path.display(), "roster cache is empty; treating as absent");
                None
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "roster cache corrupt; treating as absent");
                None
            }
        }
    }

    fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_string_pretty(roster)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
