//! The stage-2 visual profile prompt and parser.

use crate::{extract_json, parse_json};
use fabula_core::{StoryPlan, VisualProfile};
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};

/// Build the visual profile prompt from the plan's cast list.
///
/// The profile is the shared style anchor: one canonical appearance per
/// character, reused verbatim in every scene's image prompt.
pub fn render_visual_profile_prompt(plan: &StoryPlan) -> String {
    let cast = serde_json::to_string_pretty(&plan.characters).unwrap_or_default();
    format!(
        r#"You are a visual prompt specialist providing detailed visual descriptions for consistent story illustration.

INPUT CHARACTERS:
{cast}

OUTPUT JSON:
{{
    "characters": [
        {{"name": string, "canonical_appearance": string}}
    ]
}}

IMPORTANT:
- One entry per input character, same names, same order
- "canonical_appearance" must stay consistent across every scene
- Descriptions must be age-appropriate
- Return only raw, valid JSON, with no extra formatting or decoration
"#
    )
}

/// Parse and validate the visual profile response.
pub fn parse_visual_profile(response: &str) -> FabulaResult<VisualProfile> {
    let json = extract_json(response)?;
    let profile: VisualProfile = parse_json(&json)?;

    if profile.characters.is_empty() {
        return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
            "visual profile has no characters".into(),
        ))
        .into());
    }
    if profile
        .characters
        .iter()
        .any(|c| c.canonical_appearance.trim().is_empty())
    {
        return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
            "visual profile with empty canonical appearance".into(),
        ))
        .into());
    }

    Ok(profile)
}
