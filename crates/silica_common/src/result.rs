//! Common result and error types for the Silica toolchain.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Silica), not
/// a user-facing problem. User-facing problems travel as construction
/// errors or verifier diagnostics and still leave the operation `Ok`.
pub type SilicaResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in the toolchain, not a problem
/// with the user's input.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("pass left a dangling use");
        assert_eq!(format!("{err}"), "internal error: pass left a dangling use");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "boom".to_string().into();
        assert_eq!(err.message, "boom");
    }
}
