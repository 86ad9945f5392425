//! Error types for the engine.
//!
//! Pure logic failure (unification failure, a suspended constraint that
//! decides `null`) is never surfaced as an `Err` -- it collapses the
//! substitution stream to empty. Only infrastructure failures (a bad SQL
//! statement, a malformed query built at construction time) become `Err`.
// krelation 2024

use thiserror::Error;

/// An infrastructure-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The underlying SQL database rejected a query.
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    /// Raised synchronously while composing a query: no `where()` call, a
    /// non-goal passed where a goal was expected, a malformed selector.
    #[error("query build error: {0}")]
    BuildError(String),

    /// The consuming subscriber unsubscribed; production was abandoned.
    #[error("stream cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
