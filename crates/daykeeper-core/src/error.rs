//! Core error types for daykeeper-core.
//!
//! This module defines the error hierarchy using thiserror. Failures local
//! to one user or one external source are surfaced as values and never
//! abort the scheduler loop; only storage-level unavailability is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for daykeeper-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar source errors
    #[error("Calendar source error: {0}")]
    Source(#[from] SourceError),

    /// Message delivery errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Task service errors
    #[error("Task service error: {0}")]
    Task(#[from] TaskServiceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown IANA timezone name
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Calendar-source errors. One broken feed degrades to an empty
/// contribution plus a warning; it never fails a whole rebuild.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source could not be reached or returned an error status
    #[error("Source '{label}' unavailable: {message}")]
    Unavailable { label: String, message: String },

    /// Source returned data that could not be interpreted
    #[error("Source '{label}' returned malformed data: {message}")]
    Malformed { label: String, message: String },

    /// Call exceeded the per-source timeout
    #[error("Source '{label}' timed out after {timeout_secs}s")]
    Timeout { label: String, timeout_secs: u64 },
}

/// Message-delivery errors. A failed delivery is logged and the fired
/// check-in record stands; the prompt is never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Transport is not configured (e.g. missing bot token)
    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    /// The chat API rejected the message
    #[error("Delivery rejected: HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// Request-level failure (connect, TLS, ...)
    #[error("Delivery request failed: {0}")]
    Request(String),
}

/// Task-service errors.
#[derive(Error, Debug)]
pub enum TaskServiceError {
    /// Service is not configured (e.g. missing API token)
    #[error("Task service not configured: {0}")]
    NotConfigured(String),

    /// The task API returned an error status
    #[error("Task API call '{context}' failed: HTTP {status}: {detail}")]
    Api {
        context: String,
        status: u16,
        detail: String,
    },

    /// Request-level failure
    #[error("Task request failed: {0}")]
    Request(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

impl From<reqwest::Error> for TaskServiceError {
    fn from(err: reqwest::Error) -> Self {
        TaskServiceError::Request(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
