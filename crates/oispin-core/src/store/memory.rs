use std::sync::Mutex;

use super::{LiquidityStore, RosterStore, StoreError};
use crate::{LiquidityTable, Roster};

/// In-memory roster store for exercising the engine without disk I/O.
#[derive(Default)]
pub struct MemoryRosterStore {
    roster: Mutex<Option<Roster>>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(roster: Roster) -> Self {
        Self {
            roster: Mutex::new(Some(roster)),
        }
    }
}

impl RosterStore for MemoryRosterStore {
    fn load(&self) -> Option<Roster> {
        self.roster.lock().expect("roster lock").clone()
    }

    fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        *self.roster.lock().expect("roster lock") = Some(roster.clone());
        Ok(())
    }
}

/// In-memory liquidity store for exercising the engine without disk I/O.
#[derive(Default)]
pub struct MemoryLiquidityStore {
    table: Mutex<Option<LiquidityTable>>,
}

impl MemoryLiquidityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(table: LiquidityTable) -> Self {
        Self {
            table: Mutex::new(Some(table)),
        }
    }
}

impl LiquidityStore for MemoryLiquidityStore {
    fn load(&self) -> Option<LiquidityTable> {
        self.table.lock().expect("table lock").clone()
    }

    fn save(&self, table: &LiquidityTable) -> Result<(), StoreError> {
        *self.table.lock().expect("table lock") = Some(table.clone());
        Ok(())
    }
}
