//! Domain model for the Fabula story pipeline.
//!
//! This crate holds the types shared by every other Fabula crate: story and
//! scene aggregates, the job status state machine, the structured outputs of
//! each LLM stage, and the broker job envelope.

#![forbid(unsafe_code)]

mod envelope;
mod ids;
mod plan;
mod scene;
mod status;
mod story;
pub mod telemetry;

pub use envelope::JobEnvelope;
pub use ids::{SceneId, StoryId};
pub use plan::{
    BaseStyle, CharacterAppearance, PlanCharacter, PlanScene, SceneMoment, StoryPlan,
    VisualProfile,
};
pub use scene::Scene;
pub use status::StoryStatus;
pub use story::Story;
