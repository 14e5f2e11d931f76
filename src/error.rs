//! Errors raised while reading and indexing the two projects under comparison.
//!
//! Only [`GradeError::MissingProgram`] and [`GradeError::MissingTargets`] stop an
//! evaluation. Target-level errors are absorbed by the engine: the offending
//! target is skipped and the remaining targets are still graded.

use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Engine result alias.
pub type Result<T> = std::result::Result<T, GradeError>;

/// Which of the two documents an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Submitted,
    Reference,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Submitted => write!(f, "submitted"),
            Side::Reference => write!(f, "reference"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GradeError {
    /// The document is absent (`null`) or is not a JSON object.
    #[error("{0} program is missing")]
    MissingProgram(Side),

    /// The document has no `targets` array, or (for the reference) no
    /// target survived parsing and indexing.
    #[error("{0} program has no usable targets")]
    MissingTargets(Side),

    /// A target could not be read at all (not an object, no block map).
    #[error("target #{index} is invalid: {reason}")]
    InvalidTarget { index: usize, reason: String },

    /// A block chain loops back on itself or nests deeper than the cap.
    #[error("target '{target}' has a malformed block graph at '{block}': {reason}")]
    MalformedGraph {
        target: String,
        block: String,
        reason: String,
    },
}

impl GradeError {
    /// True for errors that invalidate the whole evaluation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            GradeError::MissingProgram(_) | GradeError::MissingTargets(_)
        )
    }
}
