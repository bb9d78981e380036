use thiserror::Error;

/// A required field was missing or unusable. Raised before any network call
/// on the client and before any write on the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long ({len} characters, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
