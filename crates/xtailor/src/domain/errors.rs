//! Domain-specific errors.

use thiserror::Error;

/// Failure to turn XML text into a [`TailoringDocument`](super::model::TailoringDocument).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("no Profile element found in tailoring document")]
    MissingProfile,
}

/// Rejected edit of the item list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("an idref is required")]
    MissingIdref,
    #[error("a rule with idref {0} already exists")]
    DuplicateRule(String),
}
