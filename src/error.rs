//! Error handling for the activity analysis engine
//!
//! Centralized error types shared by the services and storage layers.

use thiserror::Error;

use crate::config::ConfigError;
use crate::database::StoreError;
use crate::services::timezone_service::TimezoneError;

/// Analysis error types
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Goal lookup failed: {0}")]
    GoalLookup(String),

    #[error("Message dispatch failed: {0}")]
    Messaging(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timezone error: {0}")]
    Timezone(#[from] TimezoneError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Get error code for callers that surface errors to clients
    pub fn error_code(&self) -> &'static str {
        match self {
            AnalysisError::Storage(_) => "StorageError",
            AnalysisError::GoalLookup(_) => "GoalLookupError",
            AnalysisError::Messaging(_) => "MessagingError",
            AnalysisError::InvalidInput(_) => "InvalidInput",
            AnalysisError::Timezone(_) => "TimezoneError",
            AnalysisError::InvariantViolation(_) => "InternalError",
            AnalysisError::Config(_) => "ConfigurationError",
        }
    }

    /// Check if this error should be logged as an error vs warning
    pub fn is_server_error(&self) -> bool {
        !matches!(
            self,
            AnalysisError::InvalidInput(_) | AnalysisError::Timezone(_)
        )
    }

    pub fn invalid_input(message: &str) -> Self {
        AnalysisError::InvalidInput(message.to_string())
    }

    /// Report a broken internal invariant.
    ///
    /// Debug builds fail loudly; release builds hand back an internal error so
    /// the enclosing request fails without taking the process down.
    pub fn invariant_violation(message: &str) -> Self {
        tracing::error!(violation = %message, "Invariant violation detected");
        if cfg!(debug_assertions) {
            panic!("invariant violation: {message}");
        }
        AnalysisError::InvariantViolation(message.to_string())
    }

    pub fn goal_lookup(error: &anyhow::Error) -> Self {
        AnalysisError::GoalLookup(format!("{error:#}"))
    }

    pub fn messaging(error: &anyhow::Error) -> Self {
        AnalysisError::Messaging(format!("{error:#}"))
    }
}

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
