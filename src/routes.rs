use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::{CallError, PipelineError};
use crate::gemini::GeminiClient;
use crate::models::{GenerateResponse, GenerationRequest, PhotoUpload};
use crate::pipeline::{run_generation, GenerationSettings};
use crate::prompts::{self, CollageLayout};

const ALLOWED_PHOTO_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const OCCASIONS: [&str; 5] = ["Daily", "Work", "Date", "Interview", "Party"];
const VIBES: [&str; 5] = ["Minimal", "Street", "Casual", "Classic", "Sporty"];
const FITS: [&str; 3] = ["Slim-No", "Oversized-No", "Doesn't matter"];

#[derive(Clone)]
pub struct AppState {
    pub gemini: Arc<GeminiClient>,
    pub settings: GenerationSettings,
    pub collage: CollageLayout,
    pub max_photo_bytes: usize,
}

/// Caller-facing failure: a stable machine code plus a short message.
/// Upstream bodies never pass through here.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiFailure {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::GenerationFailed {
                attempts,
                last_reason,
            } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "GENERATION_FAILED",
                message: format!(
                    "Could not produce a valid styling report after {attempts} attempts \
                     (last issue: {last_reason}). Please try again."
                ),
            },
            PipelineError::Call(call) => {
                let status = match &call {
                    CallError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                    CallError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                };
                Self {
                    status,
                    code: call.code(),
                    message: call.human_message().to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": { "code": self.code, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "ai-personal-stylist" }))
}

/// Collects and validates the multipart form into a `GenerationRequest`.
/// Photo bytes stay in memory only.
async fn read_request(
    mut multipart: Multipart,
    max_photo_bytes: usize,
) -> Result<GenerationRequest, ApiFailure> {
    let mut photo: Option<PhotoUpload> = None;
    let mut height_cm: Option<f32> = None;
    let mut weight_kg: Option<f32> = None;
    let mut gender: Option<String> = None;
    let mut occasion: Option<String> = None;
    let mut style_vibe: Option<String> = None;
    let mut fit_preference: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiFailure::bad_request(format!("malformed multipart body: {error}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|error| {
                    ApiFailure::bad_request(format!("failed to read photo: {error}"))
                })?;
                photo = Some(PhotoUpload {
                    bytes,
                    mime_type: mime,
                });
            }
            "height_cm" => height_cm = read_number(field, "height_cm").await?,
            "weight_kg" => weight_kg = read_number(field, "weight_kg").await?,
            "gender" => gender = read_text(field).await?,
            "occasion" => occasion = read_text(field).await?,
            "style_vibe" => style_vibe = read_text(field).await?,
            "fit_preference" => fit_preference = read_text(field).await?,
            _ => {}
        }
    }

    let photo = photo.ok_or_else(|| ApiFailure::bad_request("photo is required"))?;
    if !ALLOWED_PHOTO_TYPES.contains(&photo.mime_type.as_str()) {
        return Err(ApiFailure::bad_request(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_PHOTO_TYPES.join(", ")
        )));
    }
    if photo.bytes.len() > max_photo_bytes {
        return Err(ApiFailure::bad_request(format!(
            "File too large. Maximum size is {} MB.",
            max_photo_bytes / (1024 * 1024)
        )));
    }

    let height_cm =
        height_cm.ok_or_else(|| ApiFailure::bad_request("height_cm is required"))?;
    if !(height_cm > 0.0 && height_cm <= 300.0) {
        return Err(ApiFailure::bad_request("height_cm must be in (0, 300]"));
    }
    if let Some(weight) = weight_kg {
        if !(weight > 0.0 && weight <= 500.0) {
            return Err(ApiFailure::bad_request("weight_kg must be in (0, 500]"));
        }
    }

    let gender = gender
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiFailure::bad_request("gender is required"))?;
    let occasion = occasion.ok_or_else(|| ApiFailure::bad_request("occasion is required"))?;
    if !OCCASIONS.contains(&occasion.as_str()) {
        return Err(ApiFailure::bad_request(format!(
            "Invalid occasion. Must be one of: {}",
            OCCASIONS.join(", ")
        )));
    }
    if let Some(vibe) = &style_vibe {
        if !VIBES.contains(&vibe.as_str()) {
            return Err(ApiFailure::bad_request(format!(
                "Invalid style_vibe. Must be one of: {}",
                VIBES.join(", ")
            )));
        }
    }
    if let Some(fit) = &fit_preference {
        if !FITS.contains(&fit.as_str()) {
            return Err(ApiFailure::bad_request(format!(
                "Invalid fit_preference. Must be one of: {}",
                FITS.join(", ")
            )));
        }
    }

    Ok(GenerationRequest {
        photo,
        height_cm,
        weight_kg,
        gender,
        occasion,
        style_vibe,
        fit_preference,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<Option<String>, ApiFailure> {
    let value = field
        .text()
        .await
        .map_err(|error| ApiFailure::bad_request(format!("malformed field: {error}")))?;
    let value = value.trim().to_string();
    Ok(if value.is_empty() { None } else { Some(value) })
}

async fn read_number(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<Option<f32>, ApiFailure> {
    match read_text(field).await? {
        None => Ok(None),
        Some(text) => text
            .parse::<f32>()
            .map(Some)
            .map_err(|_| ApiFailure::bad_request(format!("{name} must be a number"))),
    }
}

pub async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiFailure> {
    let request_id = Uuid::new_v4();
    let request = read_request(multipart, state.max_photo_bytes).await?;
    tracing::info!(
        %request_id,
        "🚀 Generation request (occasion: {}, photo: {} bytes, {})",
        request.occasion,
        request.photo.bytes.len(),
        request.photo.mime_type
    );

    let report = run_generation(state.gemini.as_ref(), &request, &state.settings)
        .await
        .map_err(|error| {
            tracing::error!(%request_id, "Generation failed: {error}");
            ApiFailure::from(error)
        })?;

    // The collage is an enhancement: a failure here never sinks the report.
    let collage_prompt = prompts::collage_instruction(&report.hairstyles, &state.collage);
    let hair_collage = state
        .gemini
        .generate_collage(&collage_prompt, &request.photo)
        .await;
    match &hair_collage {
        Some(collage) => tracing::info!(
            %request_id,
            "✅ Report and collage ready ({}, {} base64 chars)",
            collage.mime,
            collage.base64.len()
        ),
        None => tracing::warn!(%request_id, "⚠️ Report ready without a collage"),
    }

    Ok(Json(GenerateResponse {
        result: report,
        hair_collage,
        generated_at: Utc::now(),
    }))
}
