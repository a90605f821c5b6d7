//! Error types for task validation and value parsing.

use thiserror::Error;

/// Rejections raised before the store mutates anything.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,
}

/// Error returned while parsing a status name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0} (expected todo, inprogress or done)")]
pub struct ParseStatusError(pub String);

/// Error returned while parsing a priority name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task priority: {0} (expected low, medium or high)")]
pub struct ParsePriorityError(pub String);
