// Error types for chunkio

use thiserror::Error;

/// Result type alias for chunkio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chunkio
#[derive(Error, Debug)]
pub enum Error {
    /// No bytes were available when a value was about to start.
    ///
    /// Adapters turn this into "no more chunks/pages" instead of surfacing it.
    #[error("End of stream")]
    EndOfStream,

    /// The stream ran dry partway through a value.
    ///
    /// Counts are bytes for primitives, bits for bit runs and elements for arrays.
    #[error("Truncated data: expected {needed}, got {got}")]
    Truncated { needed: usize, got: usize },

    /// Magic signature or fixed tag did not match
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Caller passed something the encoder cannot represent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Structurally corrupt encoded data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Well-formed input that is not decoded by this crate
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a format mismatch error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::FormatMismatch(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Error::InvalidData(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// True for the expected end-of-stream signal
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Reinterpret an end-of-stream inside an already started value as truncation.
    pub fn into_truncated(self, needed: usize) -> Self {
        match self {
            Error::EndOfStream => Error::Truncated { needed, got: 0 },
            other => other,
        }
    }
}

/// Turn `EndOfStream` into `Ok(None)`, leaving every other outcome untouched.
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::EndOfStream) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Truncated { needed: 4, got: 2 };
        assert!(e.to_string().contains('4'));
        assert!(e.to_string().contains('2'));

        let e = Error::format("Not a PNG file");
        assert!(e.to_string().contains("PNG"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_optional_maps_only_end_of_stream() {
        assert!(matches!(optional::<u8>(Err(Error::EndOfStream)), Ok(None)));
        assert!(matches!(optional(Ok(3u8)), Ok(Some(3))));
        assert!(matches!(
            optional::<u8>(Err(Error::Truncated { needed: 2, got: 1 })),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_into_truncated() {
        assert!(matches!(
            Error::EndOfStream.into_truncated(8),
            Error::Truncated { needed: 8, got: 0 }
        ));
        assert!(Error::format("x").into_truncated(8).to_string().contains("Format"));
    }
}
