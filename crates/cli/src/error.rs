//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// The blocking engine task did not return normally
    #[error("Engine task failed: {message}")]
    EngineTask { message: String },

    /// Dispatcher did not drain its sinks in time
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn engine_task(message: impl Into<String>) -> Self {
        Self::EngineTask {
            message: message.into(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}

/// Fail with [`CliError::ConfigNotFound`] unless `path` exists
pub fn ensure_config_exists(path: &std::path::Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path.display().to_string()))
    }
}
