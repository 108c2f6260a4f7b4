//! Deterministic image prompt composition.
//!
//! The final illustration prompt for a scene concatenates, in order: the
//! base style block, the canonical appearances of characters present in the
//! scene, and the scene moment block. Character inclusion is limited to
//! characters whose names appear (case-insensitive, whole-word) in the
//! scene's text or planner image prompt; included characters keep plan cast
//! order. The rule is order-stable: the same inputs always produce the same
//! string.

use fabula_core::{BaseStyle, SceneMoment, StoryPlan, VisualProfile};

/// Compose the final image prompt for the scene at `scene_index`.
pub fn compose_image_prompt(
    style: &BaseStyle,
    profile: &VisualProfile,
    plan: &StoryPlan,
    scene_index: usize,
    moment: &SceneMoment,
) -> String {
    let scene = &plan.scenes[scene_index];
    let mut parts = Vec::new();

    parts.push(format!(
        "Style: {medium}. Palette: {palette}. Lighting: {lighting}. Composition: {notes}",
        medium = style.medium,
        palette = style.palette,
        lighting = style.lighting,
        notes = style.composition_notes,
    ));

    for character in &plan.characters {
        let present = contains_word(&scene.text, &character.name)
            || contains_word(&scene.image_prompt, &character.name);
        if !present {
            continue;
        }
        if let Some(appearance) = profile.appearance_for(&character.name) {
            parts.push(format!(
                "{}: {}",
                appearance.name, appearance.canonical_appearance
            ));
        }
    }

    parts.push(format!(
        "Moment: {moment}. Camera: {camera}. Mood: {mood}",
        moment = moment.moment_description,
        camera = moment.camera,
        mood = moment.mood,
    ));

    parts.join("\n")
}

/// Case-insensitive whole-word containment check.
///
/// A match counts only when the characters adjacent to it are not
/// alphanumeric, so "Ana" does not match inside "banana".
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();

    let mut start = 0;
    while let Some(pos) = hay[start..].find(&needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = hay[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = hay[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}
