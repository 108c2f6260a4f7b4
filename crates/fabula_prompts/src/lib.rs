//! Prompt assembly and response parsing.
//!
//! Each LLM stage pairs a deterministic prompt builder with a parser that
//! turns the model's text output back into a typed structure. Builders are
//! stateless; parsers tolerate prose around the JSON payload and raise
//! `UpstreamMalformed` on schema violations.

#![forbid(unsafe_code)]

mod compose;
mod extraction;
mod moment;
mod plan;
mod style;
mod visual;

pub use compose::{compose_image_prompt, contains_word};
pub use extraction::{extract_json, parse_json};
pub use moment::{parse_scene_moment, render_scene_moment_prompt};
pub use plan::{parse_plan, render_plan_prompt};
pub use style::{parse_base_style, render_base_style_prompt};
pub use visual::{parse_visual_profile, render_visual_profile_prompt};
