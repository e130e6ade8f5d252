//! Common error types for Flexion

use thiserror::Error;

/// Common result type for Flexion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the engine's boundary operations
///
/// Engine reads (tree building, resolution, composition) degrade gracefully on
/// malformed data and never produce these. Decoding, store writes, file
/// loading, configuration and lookups of unknown motions return errors.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog snapshot could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config could not be parsed
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML config could not be serialized
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested motion, muscle or axis row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input at the write boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-finite score or delta offered to a store
    #[error("Invalid score for muscle '{muscle_id}': {value}")]
    InvalidScore { muscle_id: String, value: f64 },
}
