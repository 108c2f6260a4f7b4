//! Repository error types.

/// Repository error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RepositoryErrorKind {
    /// Connection failed
    #[display("Repository connection error: {}", _0)]
    Connection(String),
    /// Query execution failed
    #[display("Repository query error: {}", _0)]
    Query(String),
    /// Serialization/deserialization error
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Record not found
    #[display("Record not found")]
    NotFound,
    /// Unique constraint violation
    #[display("Conflict: {}", _0)]
    Conflict(String),
    /// Status transition not permitted by the state machine
    #[display("Invalid status transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
}

/// Repository error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{RepositoryError, RepositoryErrorKind};
///
/// let err = RepositoryError::new(RepositoryErrorKind::NotFound);
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Repository Error: {} at line {} in {}", kind, line, file)]
pub struct RepositoryError {
    /// The kind of error that occurred
    pub kind: RepositoryErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RepositoryError {
    /// Create a new RepositoryError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RepositoryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the error is a unique-constraint conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, RepositoryErrorKind::Conflict(_))
    }
}

// Diesel error conversions (only available with database feature)
#[cfg(feature = "database")]
impl From<diesel::result::Error> for RepositoryError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind as DieselKind, Error as DieselError};
        match err {
            DieselError::NotFound => RepositoryError::new(RepositoryErrorKind::NotFound),
            DieselError::DatabaseError(DieselKind::UniqueViolation, info) => {
                RepositoryError::new(RepositoryErrorKind::Conflict(info.message().to_string()))
            }
            _ => RepositoryError::new(RepositoryErrorKind::Query(err.to_string())),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for RepositoryError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        RepositoryError::new(RepositoryErrorKind::Connection(err.to_string()))
    }
}
