//! services/studio/src/error.rs
//!
//! Defines the primary error type for the studio service.

use crate::config::ConfigError;
use curriculum_core::ports::PortError;
use curriculum_core::store::StoreError;

/// The primary error type for the `studio` service.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error reported by the draft store.
    #[error("Draft Store Error: {0}")]
    Store(#[from] StoreError),

    /// Represents an error from the local cache database.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the embedded cache migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents an error while building an HTTP client.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
