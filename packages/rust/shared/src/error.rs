//! Error types for ProfileCrawl.
//!
//! Library crates use [`ProfileCrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ProfileCrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileCrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error raised by an agent action.
    #[error("network error: {0}")]
    Network(String),

    /// The session pool could not be built. Fatal: no task may start.
    #[error("session pool error: {0}")]
    SessionPool(String),

    /// A single session failed to reset, run or tear down.
    #[error("session error: {0}")]
    Session(String),

    /// The session pool was shut down while a task was waiting on it.
    #[error("session pool is closed")]
    PoolClosed,

    /// The extraction agent reported an internal error.
    #[error("agent error: {0}")]
    Agent(String),

    /// The agent ran out of steps without producing a result.
    #[error("step budget exhausted after {steps} steps")]
    StepBudgetExhausted { steps: u32 },

    /// Agent bridge subprocess or protocol error.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid subject, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProfileCrawlError>;

impl ProfileCrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
