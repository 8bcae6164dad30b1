//! Core error types for purrfocus-core.
//!
//! This module defines the error hierarchy using thiserror. Authentication
//! and store failures are kept apart so callers can decide which ones are
//! shown on the sign-in form and which ones only mean local and remote state
//! may have diverged.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for purrfocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Identity provider errors
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The companion died; only adopting a new one is allowed.
    #[error("{name} is gone. Adopt a new companion before starting another session")]
    CompanionLost { name: String },

    /// An operation that needs a signed-in user was called without one.
    #[error("Not signed in")]
    NotSignedIn,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity provider errors.
///
/// The `Display` output is what the auth form shows the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    EmailTaken,

    #[error("Unable to validate email address: invalid format")]
    InvalidEmail,

    #[error("Password should be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    /// Message reported by the provider, passed through verbatim.
    #[error("{0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Identity storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Message for the auth form, with a generic fallback for empty provider
    /// messages.
    pub fn user_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            "An error occurred".to_string()
        } else {
            msg
        }
    }
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered but refused the operation.
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// No record matched the id for the owning user.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Transport-level failure talking to a remote store.
    #[error("Network error: {0}")]
    Network(String),

    /// Local store failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Response body could not be decoded.
    #[error("Unexpected response: {0}")]
    Decode(String),
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

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field that must not be blank was blank
    #[error("'{field}' must not be empty")]
    Empty { field: &'static str },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
