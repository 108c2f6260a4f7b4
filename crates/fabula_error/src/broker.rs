//! Broker queue error types.

/// Broker error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum BrokerErrorKind {
    /// Connection to the broker failed
    #[display("Broker connection error: {}", _0)]
    Connection(String),
    /// Enqueue operation failed
    #[display("Enqueue failed: {}", _0)]
    Enqueue(String),
    /// Dequeue operation failed
    #[display("Dequeue failed: {}", _0)]
    Dequeue(String),
    /// Acknowledge/negative-acknowledge failed
    #[display("Acknowledge failed: {}", _0)]
    Ack(String),
    /// Job envelope could not be encoded or decoded
    #[display("Envelope serialization error: {}", _0)]
    Serialization(String),
}

/// Broker error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabula_error::{BrokerError, BrokerErrorKind};
///
/// let err = BrokerError::new(BrokerErrorKind::Enqueue("connection reset".into()));
/// assert!(format!("{}", err).contains("Enqueue failed"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Broker Error: {} at line {} in {}", kind, line, file)]
pub struct BrokerError {
    /// The kind of error that occurred
    pub kind: BrokerErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl BrokerError {
    /// Create a new BrokerError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: BrokerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
