//! Unified error handling for the level-evaluation workspace
//!
//! This crate provides the single error type shared by the check engine, the
//! agent protocol and the special agent. Built on thiserror so every variant
//! carries a proper Display and Error impl.

use std::io;
use std::path::PathBuf;

/// Result type alias using CheckmkError
pub type Result<T> = std::result::Result<T, CheckmkError>;

/// Unified error type for all check and agent operations
#[derive(thiserror::Error, Debug)]
pub enum CheckmkError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration and Parameter Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid parameter value for {field}: {reason}")]
    InvalidParams {
        field: String,
        reason: String,
    },

    #[error("Invalid levels for {field}: warn {warn} / crit {crit} ({reason})")]
    InvalidLevels {
        field: String,
        warn: f64,
        crit: f64,
        reason: String,
    },

    #[error("Unknown temperature unit: {0}")]
    UnknownUnit(String),

    // ============================================================================
    // Check Evaluation Errors
    // ============================================================================
    /// The check cannot produce a meaningful result in this cycle (e.g. a
    /// counter was just initialized). The host skips the cycle.
    #[error("Ignore results: {0}")]
    IgnoreResults(String),

    #[error("Value store error: {0}")]
    ValueStore(String),

    // ============================================================================
    // Agent Protocol Errors
    // ============================================================================
    #[error("Invalid section name: {0}")]
    InvalidSectionName(String),

    #[error("Invalid section header: {0}")]
    InvalidSectionHeader(String),

    // ============================================================================
    // Special Agent Errors
    // ============================================================================
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("API returned status {status} for {url}")]
    ApiStatus {
        status: u16,
        url: String,
    },

    #[error("Unexpected API response: {0}")]
    ApiResponse(String),

    #[error("Pagination aborted after {pages} pages: {reason}")]
    Pagination {
        pages: usize,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl CheckmkError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_params(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an "ignore results" error for the current check cycle
    pub fn ignore_results(msg: impl Into<String>) -> Self {
        Self::IgnoreResults(msg.into())
    }

    /// Whether the host should silently skip this cycle instead of reporting a failure
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::IgnoreResults(_))
    }
}

// Allow converting from String to CheckmkError
impl From<String> for CheckmkError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to CheckmkError
impl From<&str> for CheckmkError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
