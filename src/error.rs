//! Error types.
//!
//! Only conditions that stop the registry from starting are errors. Per-entry
//! parse anomalies and per-device construction failures are logged and
//! absorbed where they happen.

use std::path::PathBuf;

/// Failure to load the mapping document.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// The file exists but could not be read.
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("malformed mapping document at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The root element is missing or is not `<peripherals>`.
    #[error("mapping document root is {found:?}, expected <peripherals>")]
    InvalidRoot { found: Option<String> },
}

/// Failure to load a [`RegistryConfig`](crate::config::RegistryConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure to start the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
}
