//! Error types for the settlement simulation.
//!
//! Steady-state operations (ticks, commands, queries) report outcomes through
//! `bool`, `Option` and counts. These errors only surface while loading data
//! and validating scenarios or replays.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for loading and validation failures.
#[derive(Debug, Error)]
pub enum SimError {
    /// Data file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// RON data could not be parsed.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Scenario content is inconsistent.
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    /// Replay data could not be encoded or decoded.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Replay finished with a different state hash than recorded.
    #[error("Replay diverged at tick {tick}: expected hash {expected}, got {actual}")]
    ReplayDiverged {
        /// Tick where the mismatch was detected.
        tick: u64,
        /// Recorded hash.
        expected: u64,
        /// Recomputed hash.
        actual: u64,
    },
}
