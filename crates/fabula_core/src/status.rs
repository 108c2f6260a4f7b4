//! The job status state machine.
//!
//! Every status write in the system goes through [`StoryStatus::can_transition_to`];
//! repositories reject anything the graph does not permit:
//!
//! ```text
//! PENDING    -> PROCESSING   (claim)
//! PENDING    -> FAILED       (enqueue failure, pre-claim fatal error)
//! PROCESSING -> PROCESSING   (redelivery no-op)
//! PROCESSING -> COMPLETED    (all scenes persisted with URLs)
//! PROCESSING -> FAILED       (attempts exhausted or fatal plan error)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle status of a story generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoryStatus {
    /// Created by the dispatcher, not yet claimed by a worker
    Pending,
    /// Claimed by a worker; stages in flight
    Processing,
    /// All scenes persisted with both media URLs
    Completed,
    /// Terminal failure; the story carries a diagnostic
    Failed,
}

impl StoryStatus {
    /// True for statuses a story never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StoryStatus::Completed | StoryStatus::Failed)
    }

    /// Whether the state machine permits a transition to `next`.
    pub fn can_transition_to(&self, next: StoryStatus) -> bool {
        use StoryStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Canonical uppercase name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Pending => "PENDING",
            StoryStatus::Processing => "PROCESSING",
            StoryStatus::Completed => "COMPLETED",
            StoryStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StoryStatus::Pending),
            "PROCESSING" => Ok(StoryStatus::Processing),
            "COMPLETED" => Ok(StoryStatus::Completed),
            "FAILED" => Ok(StoryStatus::Failed),
            other => Err(format!("unknown story status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StoryStatus::*;

    #[test]
    fn terminal_statuses_are_absorbing() {
        for terminal in [Completed, Failed] {
            for next in [Pending, Processing, Completed, Failed] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} -> {next} must be rejected"
                );
            }
        }
    }

    #[test]
    fn claim_and_finalize_paths_are_legal() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn skipping_processing_is_illegal() {
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn round_trips_through_canonical_names() {
        for status in [Pending, Processing, Completed, Failed] {
            assert_eq!(status.as_str().parse::<StoryStatus>().unwrap(), status);
        }
    }
}
