//! Error types for the headless runner.

use colony_core::error::SimError;
use thiserror::Error;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Failures while loading inputs or writing results.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// Scenario or replay failure from the core.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// File could not be read or written.
    #[error("Failed to access '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Plan RON could not be parsed.
    #[error("Failed to parse plan '{path}': {message}")]
    PlanParse {
        /// Path (or label) of the plan.
        path: String,
        /// Parser message.
        message: String,
    },

    /// Plan parsed but is unusable.
    #[error("Invalid plan '{name}': {reason}")]
    InvalidPlan {
        /// Plan name.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// Metrics could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HeadlessError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
