//! Error types for Quizsmith.
//!
//! Library crates use [`QuizsmithError`] via `thiserror`.
//! The binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Quizsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum QuizsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the source article.
    #[error("Scraping failed: {0}")]
    Fetch(String),

    /// The document was fetched but holds no recognizable article content.
    #[error("Scraping failed: {message}")]
    Parse { message: String },

    /// The generative model call itself failed (quota, network, auth).
    #[error("LLM Generation failed: {0}")]
    Generation(String),

    /// The model answered but its output is not a well-formed quiz.
    #[error("LLM Generation failed: invalid quiz output: {message}")]
    Schema { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Caller-supplied input is unusable (empty URL, bad id, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizsmithError>;

impl QuizsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a schema error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
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

    /// The caller supplied a bad or unreachable URL; retrying it blindly won't help.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_) | Self::Parse { .. } | Self::Validation { .. }
        )
    }

    /// Model output varies per attempt, so these may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::Schema { .. })
    }
}
