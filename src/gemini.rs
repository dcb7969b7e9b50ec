use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{truncate_for_log, GenerateError};
use crate::gate::Gate;
use crate::models::{HairCollage, PhotoUpload, StyleReport, COLLAGE_NOTE};
use crate::retry::{call_with_backoff, with_failover, CredentialPool, RetryPolicy};

/// Client for the two generative endpoints. Every call is admitted through
/// the shared gate, then runs the full backoff cycle under each credential
/// in turn.
pub struct GeminiClient {
    http: Client,
    credentials: CredentialPool,
    base_url: String,
    text_model: String,
    image_model: String,
    retry: RetryPolicy,
    gate: Gate,
}

/// Seam between the reject-retry controller and the real endpoint; tests
/// drive the controller with stub sources.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn generate_report(
        &self,
        instruction: &str,
        photo: &PhotoUpload,
    ) -> Result<StyleReport, GenerateError>;
}

impl GeminiClient {
    pub fn new(config: &AppConfig, gate: Gate) -> Self {
        Self {
            http: Client::new(),
            credentials: config.credentials.clone(),
            base_url: config.base_url.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            retry: config.retry.clone(),
            gate,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn call_model(&self, model: &str, payload: &Value) -> Result<Value, crate::error::CallError> {
        let url = self.endpoint(model);
        let _permit = self.gate.admit().await;
        with_failover(&self.credentials, |key| {
            let http = &self.http;
            let url = &url;
            let retry = &self.retry;
            async move { call_with_backoff(http, url, payload, &key, retry).await }
        })
        .await
    }

    /// Generate the hairstyle collage for an accepted report. Best effort:
    /// transport failures, unparseable responses and imageless responses all
    /// degrade to `None` so the structured result still reaches the caller.
    pub async fn generate_collage(
        &self,
        instruction: &str,
        photo: &PhotoUpload,
    ) -> Option<HairCollage> {
        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": instruction },
                    { "inline_data": {
                        "mime_type": photo.mime_type,
                        "data": BASE64.encode(&photo.bytes)
                    }}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"]
            }
        });

        let value = match self.call_model(&self.image_model, &payload).await {
            Ok(value) => value,
            Err(error) => {
                warn!("❌ Collage generation failed: {error}");
                return None;
            }
        };
        let response: GeminiResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(error) => {
                warn!("❌ Collage response did not parse: {error}");
                return None;
            }
        };

        let Some(inline) = extract_first_image(&response) else {
            warn!("⚠️ No inline image part in collage response");
            return None;
        };

        // Prefer the sniffed format over whatever mime the response claims.
        let mime = BASE64
            .decode(&inline.data)
            .ok()
            .and_then(|bytes| image::guess_format(&bytes).ok())
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|| inline.mime_type.clone());

        info!(
            "🖼️ Collage generated ({}, {} base64 chars)",
            mime,
            inline.data.len()
        );
        Some(HairCollage {
            mime,
            base64: inline.data.clone(),
            note: COLLAGE_NOTE.to_string(),
        })
    }
}

#[async_trait]
impl ReportSource for GeminiClient {
    /// One structured-content call: instruction plus inline photo, strict
    /// JSON output requested, code fences stripped, parsed into the typed
    /// report.
    async fn generate_report(
        &self,
        instruction: &str,
        photo: &PhotoUpload,
    ) -> Result<StyleReport, GenerateError> {
        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": instruction },
                    { "inline_data": {
                        "mime_type": photo.mime_type,
                        "data": BASE64.encode(&photo.bytes)
                    }}
                ]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "temperature": 0.7
            }
        });

        let value = self.call_model(&self.text_model, &payload).await?;
        let response: GeminiResponse = serde_json::from_value(value)
            .map_err(|error| GenerateError::Parse(format!("unexpected response shape: {error}")))?;

        let text = extract_text(&response);
        if text.trim().is_empty() {
            return Err(GenerateError::Parse(
                "response contained no text part".to_string(),
            ));
        }

        let cleaned = strip_code_fences(&text);
        serde_json::from_str::<StyleReport>(cleaned).map_err(|error| {
            GenerateError::Parse(format!(
                "{error} (body starts: {})",
                truncate_for_log(cleaned, 120)
            ))
        })
    }
}

// --- Response parsing helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn extract_text(response: &GeminiResponse) -> String {
    let mut parts = Vec::new();
    for candidate in &response.candidates {
        for part in &candidate.content.parts {
            if let Part::Text { text } = part {
                if !text.trim().is_empty() {
                    parts.push(text.as_str());
                }
            }
        }
    }
    parts.join("\n")
}

fn extract_first_image(response: &GeminiResponse) -> Option<&InlineData> {
    for candidate in &response.candidates {
        for part in &candidate.content.parts {
            if let Part::Inline { inline_data } = part {
                return Some(inline_data);
            }
        }
    }
    None
}

/// Drop surrounding markdown code-fence markers the model sometimes adds
/// even when asked for bare JSON.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
