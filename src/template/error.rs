//! Template compile errors.

use thiserror::Error;

/// A template failed to compile.
///
/// Raised while a page is set up, never while a request is served. The
/// `listing` holds the compiled program as read so far (one line per piece),
/// which makes unbalanced blocks easy to spot.
#[derive(Debug, Clone, Error)]
#[error("template compile error: {message}")]
pub struct TemplateCompileError {
    pub message: String,
    pub listing: String,
}

impl TemplateCompileError {
    pub fn new(message: impl Into<String>, listing: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            listing: listing.into(),
        }
    }
}
