//! Errors raised while wiring sinks; write failures stay inside each worker

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A file sink could not create its output root
    #[error("file sink '{sink}' cannot create {}: {source}", path.display())]
    OutputDir {
        sink: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two sinks share a name (stats and logs are keyed by name)
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },
}

impl DispatcherError {
    pub fn output_dir(
        sink: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::OutputDir {
            sink: sink.into(),
            path: path.into(),
            source,
        }
    }

    /// Name of the sink the error is about
    pub fn sink(&self) -> &str {
        match self {
            Self::OutputDir { sink, .. } => sink,
            Self::DuplicateSink { name } => name,
        }
    }
}
