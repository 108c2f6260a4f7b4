//! The stage-1 story plan prompt and parser.

use crate::{extract_json, parse_json};
use fabula_core::StoryPlan;
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};

/// Build the story plan prompt.
///
/// The scene count is embedded as a hard requirement; [`parse_plan`] rejects
/// plans that do not honor it.
pub fn render_plan_prompt(
    title: &str,
    prompt: &str,
    style: Option<&str>,
    scene_count: u32,
) -> String {
    let style = style.unwrap_or("engaging");
    format!(
        r#"You are a seasoned children's story writer and data extractor.

TASK:
Write a {style} illustrated story titled "{title}" with exactly {scene_count} scenes, then convert it into structured JSON:
{{
    "title": string,
    "characters": [
        {{"name": string, "role": string, "visual_description": string}}
    ],
    "scenes": [
        {{"sequence": number, "title": string, "text": string, "image_prompt": string}}
    ]
}}

Ensure all fields are present and follow these requirements:
- exactly {scene_count} scenes, with "sequence" starting at 0 and contiguous
- every scene has a non-empty "title", "text" and "image_prompt"
- "text" is the narration script for that scene [80-150 words]
- "image_prompt" describes one illustratable moment of the scene
- at least one character, each with a concrete "visual_description"
- content must be wholesome and age-appropriate

IMPORTANT:
- Each scene must have clear transitions and maintain narrative flow
- Return only raw, valid JSON, with no extra formatting or decoration

USER INPUT:
'''{prompt}'''
"#
    )
}

/// Parse and validate the plan response.
///
/// Scenes are returned sorted by sequence. Validation failures are
/// `UpstreamMalformed`: wrong scene count, non-dense sequences, empty text,
/// title or image prompt, or an empty cast.
pub fn parse_plan(response: &str, expected_scenes: u32) -> FabulaResult<StoryPlan> {
    let json = extract_json(response)?;
    let mut plan: StoryPlan = parse_json(&json)?;

    if plan.characters.is_empty() {
        return Err(malformed("plan has no characters"));
    }
    if plan.characters.iter().any(|c| c.name.trim().is_empty()) {
        return Err(malformed("plan character with empty name"));
    }

    if plan.scenes.len() != expected_scenes as usize {
        return Err(malformed(format!(
            "plan declared {} scenes, expected {}",
            plan.scenes.len(),
            expected_scenes
        )));
    }

    plan.scenes.sort_by_key(|s| s.sequence);
    for (index, scene) in plan.scenes.iter().enumerate() {
        if scene.sequence != index as i32 {
            return Err(malformed(format!(
                "plan scene sequences are not 0..{}: found {}",
                expected_scenes, scene.sequence
            )));
        }
        if scene.title.trim().is_empty() {
            return Err(malformed(format!("scene {} has an empty title", index)));
        }
        if scene.text.trim().is_empty() {
            return Err(malformed(format!("scene {} has empty text", index)));
        }
        if scene.image_prompt.trim().is_empty() {
            return Err(malformed(format!(
                "scene {} has an empty image prompt",
                index
            )));
        }
    }

    Ok(plan)
}

fn malformed(detail: impl Into<String>) -> fabula_error::FabulaError {
    ProviderError::new(ProviderErrorKind::UpstreamMalformed(detail.into())).into()
}
