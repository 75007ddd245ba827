//! Failure taxonomy for the mention pipeline.
//!
//! Service internals propagate `anyhow` errors; the mention handler sorts them into
//! [`RelayError`] categories at each stage boundary and turns them into a user-visible reply.

use std::fmt::Display;

use thiserror::Error;

/// Prefix of every reply produced from a caught failure.
pub const FALLBACK_PREFIX: &str = "Sorry, I encountered an error:";

/// Why an inbound mention event could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("mention event is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("mention text has no `>` address delimiter")]
    MissingAddressDelimiter,
}

/// A categorized pipeline failure.
///
/// `Display` renders only the cause, so it can be embedded directly in [`fallback_reply`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("{0}")]
    StorageUnavailable(String),
    #[error("{0}")]
    BackendFailure(String),
    #[error("{0}")]
    UnexpectedFailure(String),
}

impl RelayError {
    /// Stable category name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Parse(_) => "ParseFailure",
            RelayError::StorageUnavailable(_) => "StorageUnavailable",
            RelayError::BackendFailure(_) => "BackendFailure",
            RelayError::UnexpectedFailure(_) => "UnexpectedFailure",
        }
    }
}

/// Render the user-facing reply for a caught failure.
pub fn fallback_reply(cause: impl Display) -> String {
    format!("{FALLBACK_PREFIX} {cause}")
}
