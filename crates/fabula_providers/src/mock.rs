//! Mock adapters returning canned output.
//!
//! When `mock_ai` is enabled the pipeline is wired with these
//! implementations instead of the real clients. Each call sleeps for the
//! configured delay and then returns canned content, from the fixture
//! directory when one is configured and the file exists, from built-in
//! samples otherwise. Mock mode is invisible to the orchestrator.

use async_trait::async_trait;
use fabula_config::MockConfig;
use fabula_error::FabulaResult;
use fabula_interface::{
    AudioRequest, AudioSynthesizer, ImageGenerator, ImageRequest, TextGenerator, TextRequest,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Read a fixture file if a directory is configured and the file exists.
async fn read_fixture(dir: &Option<PathBuf>, name: &str) -> Option<Vec<u8>> {
    let path = dir.as_ref()?.join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Some(bytes),
        Err(_) => {
            debug!(path = %path.display(), "mock fixture missing, using built-in sample");
            None
        }
    }
}

/// Pull the requested scene count out of a plan prompt.
///
/// The plan prompt always carries an "exactly N scenes" clause; honoring it
/// here keeps plan validation green for any requested count.
fn sniff_scene_count(prompt: &str) -> u32 {
    prompt
        .find("exactly ")
        .and_then(|pos| {
            let digits: String = prompt[pos + "exactly ".len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
        .unwrap_or(3)
}

fn canned_plan(scene_count: u32) -> String {
    let scenes: Vec<serde_json::Value> = (0..scene_count)
        .map(|i| {
            json!({
                "sequence": i,
                "title": format!("Deeper in, part {}", i + 1),
                "text": format!(
                    "Milo follows Ember between the lantern trees, and with every step \
                     the glow grows warmer. Step {} of the journey teaches him to look \
                     closer before being afraid.",
                    i + 1
                ),
                "image_prompt": format!(
                    "Milo and Ember the fox among glowing lantern trees, step {}",
                    i + 1
                ),
            })
        })
        .collect();

    json!({
        "title": "The Lantern Fox",
        "characters": [
            {
                "name": "Milo",
                "role": "protagonist",
                "visual_description": "a small boy in a yellow raincoat and red boots"
            },
            {
                "name": "Ember",
                "role": "companion",
                "visual_description": "a slim fox whose tail tip glows like a lantern"
            }
        ],
        "scenes": scenes,
    })
    .to_string()
}

fn canned_visual_profile() -> String {
    json!({
        "characters": [
            {
                "name": "Milo",
                "canonical_appearance": "small boy, yellow raincoat, red rubber boots, tousled brown hair"
            },
            {
                "name": "Ember",
                "canonical_appearance": "slim amber fox, white chest, tail tipped with warm light"
            }
        ]
    })
    .to_string()
}

fn canned_base_style() -> String {
    json!({
        "palette": "muted forest greens with warm amber accents",
        "lighting": "soft dusk glow from scattered lanterns",
        "medium": "loose watercolor with ink outlines",
        "composition_notes": "low horizons, characters off-center, depth through layered trees"
    })
    .to_string()
}

fn canned_scene_moment() -> String {
    json!({
        "moment_description": "the fox's tail flares bright as the boy leans in, wide-eyed",
        "camera": "low angle, close on the pair",
        "mood": "quiet wonder"
    })
    .to_string()
}

/// Minimal PNG-tagged payload, padded past the degenerate-payload floor.
fn canned_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(256, 0);
    bytes
}

/// Minimal MP3-tagged payload, padded past the degenerate-payload floor.
fn canned_mp3() -> Vec<u8> {
    let mut bytes = vec![b'I', b'D', b'3', 0x04, 0x00, 0x00];
    bytes.resize(256, 0);
    bytes
}

/// Canned text generator.
///
/// Distinguishes the four prompt stages by their role lines and returns a
/// structurally valid response for each.
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    delay: Duration,
    fixture_dir: Option<PathBuf>,
}

impl MockTextGenerator {
    /// Create a mock from configuration.
    pub fn new(config: &MockConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            fixture_dir: config.fixture_dir.clone().map(PathBuf::from),
        }
    }

    /// Zero-delay mock without fixtures, for tests.
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            fixture_dir: None,
        }
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, req: &TextRequest) -> FabulaResult<String> {
        tokio::time::sleep(self.delay).await;

        let prompt = req.prompt();
        let (fixture, built_in) = if prompt.contains("story writer and data extractor") {
            ("plan.json", canned_plan(sniff_scene_count(prompt)))
        } else if prompt.contains("visual prompt specialist") {
            ("visual_profile.json", canned_visual_profile())
        } else if prompt.contains("art director") {
            ("base_style.json", canned_base_style())
        } else {
            ("scene_moment.json", canned_scene_moment())
        };

        if let Some(bytes) = read_fixture(&self.fixture_dir, fixture).await {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(built_in)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-text"
    }
}

/// Canned image generator.
#[derive(Debug, Clone)]
pub struct MockImageGenerator {
    delay: Duration,
    fixture_dir: Option<PathBuf>,
}

impl MockImageGenerator {
    /// Create a mock from configuration.
    pub fn new(config: &MockConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            fixture_dir: config.fixture_dir.clone().map(PathBuf::from),
        }
    }

    /// Zero-delay mock without fixtures, for tests.
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            fixture_dir: None,
        }
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn render(&self, _req: &ImageRequest) -> FabulaResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        if let Some(bytes) = read_fixture(&self.fixture_dir, "scene.png").await {
            return Ok(bytes);
        }
        Ok(canned_png())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-image"
    }
}

/// Canned audio synthesizer.
#[derive(Debug, Clone)]
pub struct MockAudioSynthesizer {
    delay: Duration,
    fixture_dir: Option<PathBuf>,
}

impl MockAudioSynthesizer {
    /// Create a mock from configuration.
    pub fn new(config: &MockConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            fixture_dir: config.fixture_dir.clone().map(PathBuf::from),
        }
    }

    /// Zero-delay mock without fixtures, for tests.
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            fixture_dir: None,
        }
    }
}

#[async_trait]
impl AudioSynthesizer for MockAudioSynthesizer {
    async fn narrate(&self, _req: &AudioRequest) -> FabulaResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        if let Some(bytes) = read_fixture(&self.fixture_dir, "scene.mp3").await {
            return Ok(bytes);
        }
        Ok(canned_mp3())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
