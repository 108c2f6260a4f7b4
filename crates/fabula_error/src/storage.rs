//! Blob storage error types.

/// Kinds of blob storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Bucket or object is not writable (permissions, missing bucket)
    #[display("Storage target not writable: {}", _0)]
    NotWritable(String),
    /// Payload below the minimum size threshold
    #[display("Invalid payload: {} bytes is below the {} byte minimum", size, minimum)]
    InvalidPayload {
        /// Actual payload size in bytes
        size: usize,
        /// Minimum accepted size in bytes
        minimum: usize,
    },
    /// Failed to create a storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write a file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Upload request failed
    #[display("Upload failed: {}", _0)]
    Upload(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::InvalidPayload { size: 12, minimum: 100 });
/// assert!(format!("{}", err).contains("12 bytes"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
