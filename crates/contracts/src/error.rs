//! Layered error definitions
//!
//! Categorized by source: config / hardware / camera / generator / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Host Core Errors =====
    /// Stage, shutter or filter movement failed
    #[error("hardware error on '{device}': {message}")]
    Hardware { device: String, message: String },

    /// Camera snap / readout failed
    #[error("camera error: {message}")]
    Camera { message: String },

    // ===== Image Generator Errors =====
    /// Synthetic image could not be produced
    #[error("image generator error: {message}")]
    Generator { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create hardware error
    pub fn hardware(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hardware {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create camera error
    pub fn camera(message: impl Into<String>) -> Self {
        Self::Camera {
            message: message.into(),
        }
    }

    /// Create image generator error
    pub fn generator(message: impl Into<String>) -> Self {
        Self::Generator {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
