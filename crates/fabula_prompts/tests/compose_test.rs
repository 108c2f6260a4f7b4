//! Tests for the deterministic image prompt composition rule.

use fabula_core::{
    BaseStyle, CharacterAppearance, PlanCharacter, PlanScene, SceneMoment, StoryPlan,
    VisualProfile,
};
use fabula_prompts::{
    compose_image_prompt, parse_base_style, parse_scene_moment, parse_visual_profile,
    render_base_style_prompt, render_scene_moment_prompt, render_visual_profile_prompt,
};

fn fixtures() -> (StoryPlan, VisualProfile, BaseStyle, SceneMoment) {
    let plan = StoryPlan {
        title: "The Lantern Fox".to_string(),
        characters: vec![
            PlanCharacter {
                name: "Milo".to_string(),
                role: "protagonist".to_string(),
                visual_description: "a small boy".to_string(),
            },
            PlanCharacter {
                name: "Ember".to_string(),
                role: "companion".to_string(),
                visual_description: "a fox".to_string(),
            },
            PlanCharacter {
                name: "Grandmother Oak".to_string(),
                role: "guide".to_string(),
                visual_description: "an ancient tree".to_string(),
            },
        ],
        scenes: vec![
            PlanScene {
                sequence: 0,
                title: "Into the woods".to_string(),
                text: "Milo steps under the dripping branches.".to_string(),
                image_prompt: "a boy entering a darkening forest".to_string(),
            },
            PlanScene {
                sequence: 1,
                title: "A glowing tail".to_string(),
                text: "A fox appears; Ember's tail lights the path for Milo.".to_string(),
                image_prompt: "Ember the fox glowing beside Milo".to_string(),
            },
        ],
    };
    let profile = VisualProfile {
        characters: vec![
            CharacterAppearance {
                name: "Milo".to_string(),
                canonical_appearance: "small boy, yellow raincoat, red boots".to_string(),
            },
            CharacterAppearance {
                name: "Ember".to_string(),
                canonical_appearance: "slim fox, amber fur, tail tipped with light".to_string(),
            },
            CharacterAppearance {
                name: "Grandmother Oak".to_string(),
                canonical_appearance: "towering oak with a kind bark face".to_string(),
            },
        ],
    };
    let style = BaseStyle {
        palette: "muted greens with amber accents".to_string(),
        lighting: "soft dusk light".to_string(),
        medium: "watercolor".to_string(),
        composition_notes: "low horizon, characters off-center".to_string(),
    };
    let moment = SceneMoment {
        moment_description: "the fox's tail flares as the boy leans closer".to_string(),
        camera: "low angle, close".to_string(),
        mood: "wonder".to_string(),
    };
    (plan, profile, style, moment)
}

#[test]
fn composition_is_deterministic() {
    let (plan, profile, style, moment) = fixtures();
    let first = compose_image_prompt(&style, &profile, &plan, 1, &moment);
    let second = compose_image_prompt(&style, &profile, &plan, 1, &moment);
    assert_eq!(first, second);
}

#[test]
fn composition_orders_style_then_characters_then_moment() {
    let (plan, profile, style, moment) = fixtures();
    let prompt = compose_image_prompt(&style, &profile, &plan, 1, &moment);

    let style_pos = prompt.find("watercolor").unwrap();
    let milo_pos = prompt.find("yellow raincoat").unwrap();
    let ember_pos = prompt.find("amber fur").unwrap();
    let moment_pos = prompt.find("tail flares").unwrap();

    assert!(style_pos < milo_pos);
    assert!(milo_pos < ember_pos);
    assert!(ember_pos < moment_pos);
}

#[test]
fn only_characters_present_in_the_scene_are_included() {
    let (plan, profile, style, moment) = fixtures();

    // Scene 0 mentions only Milo
    let prompt = compose_image_prompt(&style, &profile, &plan, 0, &moment);
    assert!(prompt.contains("yellow raincoat"));
    assert!(!prompt.contains("amber fur"));
    assert!(!prompt.contains("bark face"));

    // Scene 1 mentions Milo and Ember (via text and image_prompt)
    let prompt = compose_image_prompt(&style, &profile, &plan, 1, &moment);
    assert!(prompt.contains("yellow raincoat"));
    assert!(prompt.contains("amber fur"));
    assert!(!prompt.contains("bark face"));
}

#[test]
fn character_match_is_case_insensitive() {
    let (mut plan, profile, style, moment) = fixtures();
    plan.scenes[0].text = "MILO shouts into the dark.".to_string();
    let prompt = compose_image_prompt(&style, &profile, &plan, 0, &moment);
    assert!(prompt.contains("yellow raincoat"));
}

#[test]
fn visual_profile_round_trips() {
    let (_, profile, _, _) = fixtures();
    let body = serde_json::to_string(&profile).unwrap();
    let parsed = parse_visual_profile(&body).unwrap();
    assert_eq!(parsed, profile);
}

#[test]
fn base_style_round_trips() {
    let (_, _, style, _) = fixtures();
    let body = serde_json::to_string(&style).unwrap();
    let parsed = parse_base_style(&body).unwrap();
    assert_eq!(parsed, style);
}

#[test]
fn scene_moment_round_trips() {
    let (_, _, _, moment) = fixtures();
    let body = serde_json::to_string(&moment).unwrap();
    let parsed = parse_scene_moment(&body).unwrap();
    assert_eq!(parsed, moment);
}

#[test]
fn stage_prompts_reference_their_inputs() {
    let (plan, profile, style, _) = fixtures();

    let visual = render_visual_profile_prompt(&plan);
    assert!(visual.contains("Milo"));
    assert!(visual.contains("canonical_appearance"));

    let base = render_base_style_prompt(&plan);
    assert!(base.contains("The Lantern Fox"));
    assert!(base.contains("composition_notes"));

    let moment = render_scene_moment_prompt(&plan, 1, &profile, &style);
    assert!(moment.contains("Into the woods"));
    assert!(moment.contains("watercolor"));
    assert!(moment.contains("moment_description"));
}

#[test]
fn empty_visual_profile_is_rejected() {
    assert!(parse_visual_profile(r#"{"characters": []}"#).is_err());
}

#[test]
fn base_style_with_empty_field_is_rejected() {
    let body = r#"{"palette": "greens", "lighting": "", "medium": "ink", "composition_notes": "x"}"#;
    assert!(parse_base_style(body).is_err());
}
