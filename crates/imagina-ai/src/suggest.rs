//! Lenient parsing of the suggestion model's output.
//!
//! The model is asked for `{"tags": [...], "suggestedPrompt": ...}` but does
//! not always honour the shape.  [`parse_suggestions`] tries the declared
//! shape first and then exactly one alternate reading before giving up.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AiError, Result};
use crate::provider::Suggestions;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestions {
    tags: Vec<String>,
    #[serde(default)]
    suggested_prompt: Option<String>,
}

impl From<RawSuggestions> for Suggestions {
    fn from(raw: RawSuggestions) -> Self {
        let collections = raw
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let suggested_prompt = raw
            .suggested_prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Suggestions {
            collections,
            suggested_prompt,
        }
    }
}

/// Turn raw model output into [`Suggestions`].
///
/// Accepted, in order:
/// 1. an object with a `tags` array;
/// 2. the whole output as a string holding such an object (a Markdown code
///    fence around it is tolerated), or an object whose `tags` is a string
///    holding a JSON array.
///
/// Anything else is an [`AiError::Provider`].
pub fn parse_suggestions(output: &Value) -> Result<Suggestions> {
    if let Ok(raw) = RawSuggestions::deserialize(output) {
        return Ok(raw.into());
    }

    tracing::debug!("suggestion output has unexpected shape, attempting reparse");
    match reparse(output) {
        Some(raw) => Ok(raw.into()),
        None => {
            tracing::warn!(output = %truncate(output), "unparseable suggestion output");
            Err(AiError::Provider(
                "suggestion output did not contain a tag list".to_string(),
            ))
        }
    }
}

fn reparse(output: &Value) -> Option<RawSuggestions> {
    match output {
        Value::String(text) => serde_json::from_str(strip_code_fence(text)).ok(),
        Value::Object(map) => {
            let tags = serde_json::from_str(map.get("tags")?.as_str()?).ok()?;
            let suggested_prompt = map
                .get("suggestedPrompt")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(RawSuggestions {
                tags,
                suggested_prompt,
            })
        }
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn truncate(output: &Value) -> String {
    let mut text = output.to_string();
    if text.len() > 200 {
        let mut cut = 200;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push('…');
    }
    text
}
