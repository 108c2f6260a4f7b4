//! Tests for plan prompt rendering and response parsing.

use fabula_core::{PlanCharacter, PlanScene, StoryPlan};
use fabula_prompts::{parse_plan, render_plan_prompt};

fn sample_plan(scene_count: usize) -> StoryPlan {
    StoryPlan {
        title: "The Lantern Fox".to_string(),
        characters: vec![
            PlanCharacter {
                name: "Milo".to_string(),
                role: "protagonist".to_string(),
                visual_description: "a small boy with a yellow raincoat".to_string(),
            },
            PlanCharacter {
                name: "Ember".to_string(),
                role: "companion".to_string(),
                visual_description: "a fox with a glowing tail".to_string(),
            },
        ],
        scenes: (0..scene_count)
            .map(|i| PlanScene {
                sequence: i as i32,
                title: format!("Scene {i}"),
                text: format!("Milo and Ember walk deeper into the forest, step {i}."),
                image_prompt: format!("Milo follows Ember past lantern trees, step {i}"),
            })
            .collect(),
    }
}

#[test]
fn prompt_embeds_title_and_scene_count() {
    let prompt = render_plan_prompt("Forest", "A child finds a magical forest", None, 3);
    assert!(prompt.contains("exactly 3 scenes"));
    assert!(prompt.contains("\"Forest\""));
    assert!(prompt.contains("A child finds a magical forest"));
    assert!(prompt.contains("Return only raw, valid JSON"));
}

#[test]
fn parse_is_left_inverse_of_a_well_formed_response() {
    let plan = sample_plan(3);
    let rendered = serde_json::to_string(&plan).unwrap();
    let parsed = parse_plan(&rendered, 3).unwrap();
    assert_eq!(parsed, plan);
}

#[test]
fn parse_tolerates_surrounding_prose() {
    let plan = sample_plan(2);
    let body = serde_json::to_string(&plan).unwrap();
    let chatty = format!("Here is your story!\n\n{body}\n\nHope you like it.");
    let parsed = parse_plan(&chatty, 2).unwrap();
    assert_eq!(parsed.scene_count(), 2);
}

#[test]
fn parse_sorts_scenes_by_sequence() {
    let mut plan = sample_plan(3);
    plan.scenes.reverse();
    let body = serde_json::to_string(&plan).unwrap();
    let parsed = parse_plan(&body, 3).unwrap();
    let sequences: Vec<i32> = parsed.scenes.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn wrong_scene_count_is_rejected() {
    let plan = sample_plan(2);
    let body = serde_json::to_string(&plan).unwrap();
    let err = parse_plan(&body, 3).unwrap_err();
    assert!(err.to_string().contains("expected 3"));
}

#[test]
fn gapped_sequences_are_rejected() {
    let mut plan = sample_plan(3);
    plan.scenes[2].sequence = 5;
    let body = serde_json::to_string(&plan).unwrap();
    assert!(parse_plan(&body, 3).is_err());
}

#[test]
fn empty_scene_text_is_rejected() {
    let mut plan = sample_plan(3);
    plan.scenes[1].text = "  ".to_string();
    let body = serde_json::to_string(&plan).unwrap();
    assert!(parse_plan(&body, 3).is_err());
}

#[test]
fn empty_cast_is_rejected() {
    let mut plan = sample_plan(3);
    plan.characters.clear();
    let body = serde_json::to_string(&plan).unwrap();
    assert!(parse_plan(&body, 3).is_err());
}

#[test]
fn missing_scenes_field_is_rejected() {
    let body = r#"{"title": "Forest", "characters": [{"name": "Milo", "role": "hero", "visual_description": "a boy"}]}"#;
    assert!(parse_plan(body, 3).is_err());
}

#[test]
fn non_json_response_is_rejected() {
    assert!(parse_plan("Once upon a time, without any structure.", 3).is_err());
}
