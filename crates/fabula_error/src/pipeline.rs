//! Pipeline orchestration error types.

/// Pipeline error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PipelineErrorKind {
    /// A named stage failed; `detail` carries the underlying reason.
    ///
    /// Displays as `<stage>:<detail>` so that the string persisted on a
    /// FAILED story names the failing stage.
    #[display("{}:{}", stage, detail)]
    Stage {
        /// Stage name (plan, visual_profile, base_style, moment, image,
        /// audio, persist), optionally suffixed with a scene index.
        stage: String,
        /// Underlying failure description
        detail: String,
    },
    /// Delivery attempts exhausted
    #[display("attempts exhausted after {}: {}", attempts, last)]
    AttemptsExhausted {
        /// Number of delivery attempts made
        attempts: u32,
        /// Description of the last failure
        last: String,
    },
    /// The per-job soft deadline elapsed
    #[display("job deadline exceeded")]
    DeadlineExceeded,
    /// Another worker currently holds the claim on this story
    #[display("story claim contended")]
    ClaimContended,
}

/// Pipeline error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The kind of error that occurred
    pub kind: PipelineErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create a stage failure error.
    #[track_caller]
    pub fn stage(stage: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::new(PipelineErrorKind::Stage {
            stage: stage.into(),
            detail: detail.to_string(),
        })
    }
}
