use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Terminal outcome of one outbound generative call, after retries and
/// credential failover have run their course. Details carry the summarized
/// upstream body for server-side logs; callers only ever see `code()` and
/// `human_message()`.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("upstream rate limit (status {status}): {detail}")]
    RateLimited { status: u16, detail: String },
    #[error("upstream overloaded (status {status}): {detail}")]
    Overloaded { status: u16, detail: String },
    #[error("upstream server error (status {status}): {detail}")]
    Upstream { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream rejected the request (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("all {tried} credentials exhausted")]
    CredentialsExhausted {
        tried: usize,
        #[source]
        last: Box<CallError>,
    },
}

impl CallError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = summarize_error_body(body);
        let code = status.as_u16();
        match code {
            429 => CallError::RateLimited { status: code, detail },
            503 => CallError::Overloaded { status: code, detail },
            500 | 502 | 504 => CallError::Upstream { status: code, detail },
            _ => CallError::Rejected { status: code, detail },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::RateLimited { status, .. }
            | CallError::Overloaded { status, .. }
            | CallError::Upstream { status, .. }
            | CallError::Rejected { status, .. } => Some(*status),
            CallError::Network(_) => None,
            CallError::CredentialsExhausted { last, .. } => last.status(),
        }
    }

    /// Statuses the invoker keeps retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallError::RateLimited { .. }
                | CallError::Overloaded { .. }
                | CallError::Upstream { .. }
                | CallError::Network(_)
        )
    }

    /// Whether a terminal failure with this credential should restart the
    /// retry cycle under the next one. Covers 401/403 (and any other
    /// upstream rejection) plus rate limiting.
    pub fn triggers_failover(&self) -> bool {
        matches!(
            self,
            CallError::RateLimited { .. } | CallError::Rejected { .. }
        )
    }

    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            CallError::RateLimited { .. } => "RATE_LIMIT",
            CallError::Overloaded { .. } => "OVERLOADED",
            CallError::Upstream { .. } => "SERVER_ERROR",
            CallError::Network(_) => "NETWORK_ERROR",
            CallError::Rejected { .. } => "UPSTREAM_REJECTED",
            CallError::CredentialsExhausted { .. } => "SERVER_ERROR",
        }
    }

    /// Short caller-facing message. Never includes the upstream body.
    pub fn human_message(&self) -> &'static str {
        match self {
            CallError::RateLimited { .. } => {
                "The styling service is receiving too many requests. Please try again in a minute."
            }
            CallError::Overloaded { .. } => {
                "The styling service is temporarily overloaded. Please try again shortly."
            }
            CallError::Upstream { .. } | CallError::CredentialsExhausted { .. } => {
                "The styling service hit an internal error. Please try again."
            }
            CallError::Network(_) => {
                "Could not reach the styling service. Please try again."
            }
            CallError::Rejected { .. } => {
                "The styling service could not process this request."
            }
        }
    }
}

/// Outcome of one structured-content generation attempt. Parse failures are
/// recoverable: the controller feeds them back as rejection reasons.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("model returned malformed JSON: {0}")]
    Parse(String),
}

/// Terminal outcome of the whole reject-retry loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("generation failed after {attempts} attempts: {last_reason}")]
    GenerationFailed { attempts: u32, last_reason: String },
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Pull the upstream `error.message` out of a JSON error body when present,
/// otherwise keep a truncated copy of the raw text.
fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
        {
            return truncate_for_log(message, 500);
        }
        return truncate_for_log(&value.to_string(), 500);
    }
    truncate_for_log(trimmed, 500)
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}
