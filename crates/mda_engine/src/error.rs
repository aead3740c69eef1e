//! Engine error types

use contracts::ContractError;
use thiserror::Error;

use crate::RunPhase;

/// Acquisition engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Object offered as image generator does not implement `ImageGenerator`
    #[error("incompatible image generator: object does not implement ImageGenerator")]
    IncompatibleGenerator,

    /// Host core call failed
    #[error("host failed during {phase}: {source}")]
    Host {
        phase: RunPhase,
        #[source]
        source: ContractError,
    },

    /// Image generator failed
    #[error("image generator failed: {0}")]
    Generator(#[source] ContractError),
}

impl EngineError {
    pub fn host(phase: RunPhase, source: ContractError) -> Self {
        Self::Host { phase, source }
    }

    /// Registration / configuration mistakes, as opposed to runtime failures
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::IncompatibleGenerator)
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, EngineError>;
