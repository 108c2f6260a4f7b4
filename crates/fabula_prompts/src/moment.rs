//! The stage-4 scene moment prompt and parser.

use crate::{extract_json, parse_json};
use fabula_core::{BaseStyle, SceneMoment, StoryPlan, VisualProfile};
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};

/// Build the scene moment prompt for one scene.
///
/// The prompt carries the story so far (titles of preceding scenes), the
/// current scene text, and the shared style anchors so the model picks a
/// moment consistent with both.
pub fn render_scene_moment_prompt(
    plan: &StoryPlan,
    scene_index: usize,
    profile: &VisualProfile,
    style: &BaseStyle,
) -> String {
    let story_so_far: Vec<&str> = plan
        .scenes
        .iter()
        .take(scene_index)
        .map(|s| s.title.as_str())
        .collect();
    let story_so_far = if story_so_far.is_empty() {
        "(this is the opening scene)".to_string()
    } else {
        story_so_far.join(" -> ")
    };
    let scene = &plan.scenes[scene_index];
    let cast = serde_json::to_string(&profile.characters).unwrap_or_default();

    format!(
        r#"You are a detailed image prompt writer for illustrated story scenes.

INPUT:
- Story so far: {story_so_far}
- Current scene text: {text}
- Cast appearances: {cast}
- Art direction: {medium}, {palette}, {lighting}

OUTPUT JSON:
{{
    "moment_description": string,
    "camera": string,
    "mood": string
}}

IMPORTANT:
- Pick the single most illustratable moment of the scene
- The moment must logically follow from previous events
- Emotional expressions must match the narrative
- Return only raw, valid JSON, with no extra formatting or decoration
"#,
        text = scene.text,
        medium = style.medium,
        palette = style.palette,
        lighting = style.lighting,
    )
}

/// Parse and validate the scene moment response.
pub fn parse_scene_moment(response: &str) -> FabulaResult<SceneMoment> {
    let json = extract_json(response)?;
    let moment: SceneMoment = parse_json(&json)?;

    if moment.moment_description.trim().is_empty() {
        return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
            "scene moment has an empty description".into(),
        ))
        .into());
    }

    Ok(moment)
}
