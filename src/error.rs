// src/error.rs
//! Error types for the plugin listing service

use thiserror::Error;

/// Errors that can occur while aggregating or serving plugin metadata
#[derive(Error, Debug)]
pub enum Error {
    /// Network/transport failure while talking to an origin or GitHub
    #[error("Fetch from '{source_id}' failed: {reason}")]
    Fetch { source_id: String, reason: String },

    /// Malformed manifest or release payload
    #[error("Failed to decode payload from '{source_id}': {reason}")]
    Decode { source_id: String, reason: String },

    /// Serializing or writing cached state failed
    #[error("Persistence failure for '{path}': {reason}")]
    Persist { path: String, reason: String },

    /// Invalid configuration or registration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
