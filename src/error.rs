use std::time::Duration;
use thiserror::Error;

use crate::sources::SourceId;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Call-level failures. These reach the caller of `search()`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A critical selector chain (the search input) never resolved.
    #[error("{site}: no {role} element matched any candidate selector")]
    ElementNotFound { site: SourceId, role: &'static str },

    /// The browsing session or the driver behind it could not be created or used.
    #[error("session error: {0}")]
    Session(String),

    /// A caller-supplied budget ran out before the stage finished.
    #[error("{stage} exceeded its {budget:?} budget")]
    Timeout { stage: &'static str, budget: Duration },

    /// `search()` was called on an adapter that has no driver bound.
    #[error("driver not initialised or already closed")]
    DriverUnavailable,
}

impl ScrapeError {
    pub fn session(err: impl std::fmt::Display) -> Self {
        ScrapeError::Session(err.to_string())
    }

    /// Short machine-readable tag, used as the article of diagnostic listings.
    pub fn cause_tag(&self) -> &'static str {
        match self {
            ScrapeError::ElementNotFound { .. } => "SEARCH_INPUT_NOT_FOUND",
            ScrapeError::Session(_) => "SESSION_ERROR",
            ScrapeError::Timeout { .. } => "TIMEOUT",
            ScrapeError::DriverUnavailable => "DRIVER_UNAVAILABLE",
        }
    }
}

/// Row-level failures. Absorbed by the pipeline; the row is skipped and counted.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("row has {found} cells, need at least {needed}")]
    MissingCells { found: usize, needed: usize },

    #[error("row text too short ({0} chars)")]
    TooShort(usize),

    #[error("no price found in row text")]
    NoPrice,

    #[error("row carries none of the expected fields")]
    NoFields,
}
