use thiserror::Error;

use oispin_core::EngineError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Engine(EngineError::Sampling(_)) => 3,
            Self::Engine(EngineError::RosterFetch(_)) => 6,
            Self::Engine(EngineError::Store(_)) => 10,
        }
    }
}
