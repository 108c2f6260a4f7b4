//! Utilities for extracting structured data from LLM responses.
//!
//! LLM responses often contain JSON wrapped in markdown code blocks or mixed
//! with explanatory text. This module extracts the first balanced JSON
//! object and parses it into a typed structure.

use fabula_error::{FabulaResult, ProviderError, ProviderErrorKind};

/// Extract JSON from a response that may contain markdown or extra text.
///
/// Tries two strategies:
/// 1. Markdown code blocks: ```json ... ```
/// 2. The first balanced `{ ... }` object, string- and escape-aware
///
/// # Errors
///
/// Returns `UpstreamMalformed` if no JSON object is found in the response.
///
/// # Examples
///
/// ```
/// use fabula_prompts::extract_json;
///
/// let response = "Here is the plan you asked for:\n\
///     ```json\n\
///     {\"title\": \"Forest\"}\n\
///     ```\n";
///
/// let json = extract_json(response).unwrap();
/// assert!(json.contains("Forest"));
/// ```
pub fn extract_json(response: &str) -> FabulaResult<String> {
    if let Some(json) = extract_from_code_block(response) {
        return Ok(json);
    }

    if let Some(json) = extract_balanced(response, '{', '}') {
        return Ok(json);
    }

    tracing::error!(
        response_length = response.len(),
        "No JSON found in LLM response"
    );

    Err(ProviderError::new(ProviderErrorKind::UpstreamMalformed(format!(
        "no JSON object found in response ({} bytes)",
        response.len()
    )))
    .into())
}

/// Extract content from a markdown code block, with or without a `json`
/// language tag.
fn extract_from_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let content_start = start + 3;
    // Skip past an optional language specifier on the fence line
    let content_start = response[content_start..]
        .find('\n')
        .map(|n| content_start + n + 1)
        .unwrap_or(content_start);

    match response[content_start..].find("```") {
        Some(end) => Some(response[content_start..content_start + end].trim().to_string()),
        // No closing fence, likely a truncated response; take what is there
        None => Some(response[content_start..].trim().to_string()),
    }
}

/// Extract content between balanced delimiters.
///
/// Finds the first occurrence of `open` and extracts content up to the
/// matching `close`, handling nesting, strings, and escapes correctly.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse extracted JSON into a specific type.
///
/// # Errors
///
/// Returns `UpstreamMalformed` if the JSON cannot be parsed into `T`.
///
/// # Examples
///
/// ```
/// use fabula_prompts::parse_json;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Title {
///     title: String,
/// }
///
/// let parsed: Title = parse_json(r#"{"title": "Forest"}"#).unwrap();
/// assert_eq!(parsed.title, "Forest");
/// ```
pub fn parse_json<T>(json_str: &str) -> FabulaResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(json_str.trim()).map_err(|e| {
        let preview: String = json_str.trim().chars().take(100).collect();
        tracing::warn!(error = %e, json_preview = %preview, "JSON parse failed");
        ProviderError::new(ProviderErrorKind::UpstreamMalformed(format!(
            "failed to parse JSON: {e} (starts: {preview})"
        )))
        .into()
    })
}
