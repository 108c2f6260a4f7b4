//! Structured outputs of the LLM stages.
//!
//! Stage 1 produces a [`StoryPlan`]; stages 2 and 3 produce the shared style
//! anchors ([`VisualProfile`], [`BaseStyle`]) reused across every scene; the
//! per-scene stage produces a [`SceneMoment`].

use serde::{Deserialize, Serialize};

/// A character in the story plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCharacter {
    /// Character name, matched against scene text for prompt composition
    pub name: String,
    /// Narrative role (protagonist, companion, ...)
    pub role: String,
    /// Free-form visual description from the planner
    pub visual_description: String,
}

/// A scene in the story plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanScene {
    /// 0-based position; the parser enforces density
    pub sequence: i32,
    /// Scene title
    pub title: String,
    /// Narrative text, also the narration script
    pub text: String,
    /// Planner-suggested illustration prompt
    pub image_prompt: String,
}

/// The stage-1 plan: title, cast, and ordered scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPlan {
    /// Story title chosen by the planner
    pub title: String,
    /// Cast list; never empty on a valid plan
    pub characters: Vec<PlanCharacter>,
    /// Ordered scenes with sequences 0..N-1
    pub scenes: Vec<PlanScene>,
}

impl StoryPlan {
    /// Number of scenes the plan declares.
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}

/// Canonical appearance of one character, shared across scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAppearance {
    /// Character name, matching the plan's cast list
    pub name: String,
    /// Stable appearance description used in every image prompt
    pub canonical_appearance: String,
}

/// The stage-2 visual profile: one canonical appearance per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualProfile {
    /// Appearance anchors, in plan cast order
    pub characters: Vec<CharacterAppearance>,
}

impl VisualProfile {
    /// Look up the canonical appearance for a character by name.
    pub fn appearance_for(&self, name: &str) -> Option<&CharacterAppearance> {
        self.characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// The stage-3 base style: the shared art direction for every illustration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStyle {
    /// Color palette description
    pub palette: String,
    /// Lighting treatment
    pub lighting: String,
    /// Artistic medium (watercolor, gouache, ...)
    pub medium: String,
    /// Layout and framing guidance
    pub composition_notes: String,
}

/// The per-scene moment description produced in stage 4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMoment {
    /// The single visual moment to illustrate
    pub moment_description: String,
    /// Camera/framing choice
    pub camera: String,
    /// Emotional mood of the frame
    pub mood: String,
}
