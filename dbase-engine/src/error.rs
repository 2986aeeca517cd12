//! Error kinds and error handling for table and memo codecs
//!
//! Structural problems (header, field table) abort a load. Per-record and
//! per-memo problems are recoverable: the loader keeps whatever it decoded
//! before the damage and moves on.

use thiserror::Error;

/// Coarse classification of every failure the engine can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad stream, bad argument or name collision
    InvalidArgument,
    /// Version byte matches no known dialect
    UnsupportedVersion,
    /// Header or field table ended before its fixed size or terminator
    UnexpectedEndOfData,
    /// A record region is shorter than the declared record length
    TruncatedRecord,
    /// An encoded field does not fit the declared field length
    EncodingOverflow,
    /// A memo reference points at a missing or malformed block
    MemoResolutionFailure,
    /// Underlying I/O failure
    Io,
}

impl ErrorKind {
    /// Recoverable kinds never abort a load; the caller keeps a partial result
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TruncatedRecord | ErrorKind::MemoResolutionFailure
        )
    }

    /// Stable short name used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::UnsupportedVersion => "UnsupportedVersion",
            ErrorKind::UnexpectedEndOfData => "UnexpectedEndOfData",
            ErrorKind::TruncatedRecord => "TruncatedRecord",
            ErrorKind::EncodingOverflow => "EncodingOverflow",
            ErrorKind::MemoResolutionFailure => "MemoResolutionFailure",
            ErrorKind::Io => "Io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the dBASE engine
#[derive(Error, Debug)]
pub enum DbfError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported table version byte 0x{0:02X}")]
    UnsupportedVersion(u8),

    #[error("unexpected end of data while reading {0}")]
    UnexpectedEndOfData(&'static str),

    #[error("truncated record: expected {expected} bytes, got {actual}")]
    TruncatedRecord { expected: usize, actual: usize },

    #[error("field {field} encodes to {actual} bytes but is only {length} wide")]
    EncodingOverflow {
        field: String,
        length: usize,
        actual: usize,
    },

    #[error("memo block {offset} could not be resolved: {reason}")]
    MemoResolution { offset: u32, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbfError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbfError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DbfError::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            DbfError::UnexpectedEndOfData(_) => ErrorKind::UnexpectedEndOfData,
            DbfError::TruncatedRecord { .. } => ErrorKind::TruncatedRecord,
            DbfError::EncodingOverflow { .. } => ErrorKind::EncodingOverflow,
            DbfError::MemoResolution { .. } => ErrorKind::MemoResolutionFailure,
            DbfError::Io(_) => ErrorKind::Io,
        }
    }

    /// Shorthand for `self.kind().is_recoverable()`
    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DbfError::InvalidArgument(msg.into())
    }

    /// Map an `UnexpectedEof` from a fixed-size read onto the section name
    pub(crate) fn eof_as(section: &'static str) -> impl FnOnce(std::io::Error) -> DbfError {
        move |e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DbfError::UnexpectedEndOfData(section)
            } else {
                DbfError::Io(e)
            }
        }
    }
}

/// Result type for table operations
pub type DbfResult<T> = Result<T, DbfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::TruncatedRecord.is_recoverable());
        assert!(ErrorKind::MemoResolutionFailure.is_recoverable());
        assert!(!ErrorKind::UnsupportedVersion.is_recoverable());
        assert!(!ErrorKind::UnexpectedEndOfData.is_recoverable());
        assert!(!ErrorKind::EncodingOverflow.is_recoverable());
    }

    #[test]
    fn test_kind_projection() {
        let err = DbfError::TruncatedRecord { expected: 11, actual: 4 };
        assert_eq!(err.kind(), ErrorKind::TruncatedRecord);
        assert!(err.is_recoverable());

        let err = DbfError::UnsupportedVersion(0x42);
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.to_string(), "unsupported table version byte 0x42");
    }

    #[test]
    fn test_eof_mapping() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err = DbfError::eof_as("table header")(eof);
        assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfData);

        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = DbfError::eof_as("table header")(other);
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
