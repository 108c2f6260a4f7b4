//! The stage-3 base style prompt and parser.

use crate::{extract_json, parse_json};
use fabula_core::{BaseStyle, StoryPlan};
use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};

/// Build the base style prompt from the plan.
pub fn render_base_style_prompt(plan: &StoryPlan) -> String {
    let first_scene = plan
        .scenes
        .first()
        .map(|s| s.text.as_str())
        .unwrap_or_default();
    format!(
        r#"You are an expert art director defining the shared look of an illustrated story.

INPUT:
- Story title: {title}
- Opening scene: {first_scene}

OUTPUT JSON:
{{
    "palette": string,
    "lighting": string,
    "medium": string,
    "composition_notes": string
}}

IMPORTANT:
- The style must support emotional storytelling
- Colors must be age-appropriate and engaging
- Return only raw, valid JSON, with no extra formatting or decoration
"#,
        title = plan.title,
    )
}

/// Parse and validate the base style response.
pub fn parse_base_style(response: &str) -> FabulaResult<BaseStyle> {
    let json = extract_json(response)?;
    let style: BaseStyle = parse_json(&json)?;

    let fields = [
        ("palette", &style.palette),
        ("lighting", &style.lighting),
        ("medium", &style.medium),
        ("composition_notes", &style.composition_notes),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(
                format!("base style field '{name}' is empty"),
            ))
            .into());
        }
    }

    Ok(style)
}
