//! Google Generative Language (Gemini) client.
//!
//! Both providers use the `models/{model}:generateContent` endpoint: the
//! image model is asked for `TEXT` and `IMAGE` modalities and the text model
//! for a JSON response.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use imagina_shared::ImageData;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{AiError, Result};
use crate::prompt::{build_generation_prompt, suggestion_instructions};
use crate::provider::{GeneratedImage, GenerationRequest, ImageGenerator, Suggestions, TagSuggester};
use crate::suggest::parse_suggestions;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";

/// Finish reasons that mean the provider refused to answer.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "IMAGE_SAFETY"];

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` leaves the client usable for nothing but errors.
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
    pub text_model: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Provider("GOOGLE_API_KEY is not configured".to_string()))?;

        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(%status, model, detail = %detail, "provider request failed");
            return Err(AiError::Provider(format!("provider responded {status}")));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        if request.prompt.trim().is_empty() {
            return Err(AiError::Validation("prompt is required".to_string()));
        }

        let prompt = build_generation_prompt(&request.prompt, &request.params);
        debug!(prompt = %prompt, model = %self.config.image_model, "requesting image");

        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_ONLY_HIGH" }))
            .collect();
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
            "safetySettings": safety,
        });

        let resp = self.generate_content(&self.config.image_model, &body).await?;
        check_blocked(&resp)?;
        let image = extract_image(&resp)?;

        Ok(GeneratedImage {
            image,
            model_used: format!("googleai/{}", self.config.image_model),
        })
    }
}

#[async_trait]
impl TagSuggester for GeminiClient {
    async fn suggest(&self, prompt: &str) -> Result<Suggestions> {
        if prompt.trim().is_empty() {
            return Err(AiError::Validation("prompt is required".to_string()));
        }

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": suggestion_instructions(prompt) }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let resp = self.generate_content(&self.config.text_model, &body).await?;
        check_blocked(&resp)?;
        let text = extract_text(&resp)?;

        let output = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        parse_suggestions(&output)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn check_blocked(resp: &GenerateContentResponse) -> Result<()> {
    if let Some(reason) = resp
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(AiError::Blocked(reason.to_string()));
    }

    let finish = resp
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref());
    match finish {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => {
            Err(AiError::Blocked(reason.to_string()))
        }
        _ => Ok(()),
    }
}

fn parts(resp: &GenerateContentResponse) -> impl Iterator<Item = &Part> {
    resp.candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .into_iter()
        .flat_map(|c| c.parts.iter())
}

fn extract_image(resp: &GenerateContentResponse) -> Result<ImageData> {
    let inline = parts(resp)
        .find_map(|p| p.inline_data.as_ref())
        .ok_or_else(|| AiError::Provider("response contained no image".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| AiError::Provider(format!("image payload is not base64: {e}")))?;
    if bytes.is_empty() {
        return Err(AiError::Provider("response contained an empty image".to_string()));
    }

    Ok(ImageData::new(inline.mime_type.clone(), bytes))
}

fn extract_text(resp: &GenerateContentResponse) -> Result<String> {
    let text: String = parts(resp).filter_map(|p| p.text.as_deref()).collect();
    if text.trim().is_empty() {
        return Err(AiError::Provider("response contained no text".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_inline_image() {
        let resp = response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your fox." },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                ]},
                "finishReason": "STOP"
            }]
        }));
        check_blocked(&resp).unwrap();
        let image = extract_image(&resp).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_image_is_provider_error() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "no image today" }] } }]
        }));
        assert!(matches!(extract_image(&resp), Err(AiError::Provider(_))));
        assert!(matches!(
            extract_image(&GenerateContentResponse::default()),
            Err(AiError::Provider(_))
        ));
    }

    #[test]
    fn test_prompt_feedback_block() {
        let resp = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(check_blocked(&resp).unwrap_err().is_blocked());
    }

    #[test]
    fn test_finish_reason_block() {
        for reason in BLOCKING_FINISH_REASONS {
            let resp = response(json!({ "candidates": [{ "finishReason": reason }] }));
            assert!(check_blocked(&resp).unwrap_err().is_blocked(), "{reason}");
        }
        let resp = response(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] }));
        assert!(check_blocked(&resp).is_ok());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "{\"tags\": [\"A\"]," },
                { "text": " \"suggestedPrompt\": null}" }
            ]}}]
        }));
        let text = extract_text(&resp).unwrap();
        let out = parse_suggestions(&serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(out.collections, vec!["A"]);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(GeminiConfig {
            api_base: "http://localhost:1234/v1beta/".into(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("gemini-2.0-flash"),
            "http://localhost:1234/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let err = client
            .generate(&GenerationRequest::new("a fox", Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Provider(_)));
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let err = client.suggest("   ").await.unwrap_err();
        assert!(matches!(err, AiError::Validation(_)));
    }
}
