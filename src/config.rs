use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::prompts::CollageLayout;
use crate::retry::{CredentialPool, RetryPolicy};
use crate::validate::SimilarityLimits;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_MAX_PHOTO_BYTES: usize = 8 * 1024 * 1024;

/// Everything tunable, read once at startup and injected from the
/// composition root. Nothing in here is consulted as global state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: CredentialPool,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    /// Upper bound on simultaneously admitted outbound calls.
    pub gate_capacity: usize,
    pub retry: RetryPolicy,
    /// Reject-retry loop budget.
    pub max_attempts: u32,
    /// Base inter-attempt wait; grows linearly with the attempt number.
    pub attempt_delay: Duration,
    pub limits: SimilarityLimits,
    pub collage: CollageLayout,
    pub port: u16,
    pub max_photo_bytes: usize,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// `GEMINI_API_KEYS` is a comma-separated pool tried primary-first;
    /// `GEMINI_API_KEY` is accepted as a single-entry fallback.
    pub fn from_env() -> Result<Self> {
        let raw_keys = std::env::var("GEMINI_API_KEYS")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| anyhow!("GEMINI_API_KEYS or GEMINI_API_KEY must be set"))?;
        let credentials = CredentialPool::new(raw_keys.split(',').map(str::to_string))
            .ok_or_else(|| anyhow!("credential pool is empty after trimming"))?;

        let retry = RetryPolicy {
            max_retries: env_parse("RETRY_MAX_RETRIES", 3),
            base_delay: Duration::from_millis(env_parse("RETRY_BASE_DELAY_MS", 1_000)),
            max_delay: Duration::from_millis(env_parse("RETRY_MAX_DELAY_MS", 8_000)),
        };

        let defaults = SimilarityLimits::default();
        let limits = SimilarityLimits {
            hair_shared_traits: env_parse("HAIR_SHARED_TRAIT_LIMIT", defaults.hair_shared_traits),
            outfit_shared_tags: env_parse("OUTFIT_SHARED_TAG_LIMIT", defaults.outfit_shared_tags),
        };

        let layout = CollageLayout::default();
        let collage = CollageLayout {
            primary_index: env_parse("COLLAGE_PRIMARY_INDEX", layout.primary_index),
            ..layout
        };

        Ok(Self {
            credentials,
            base_url: env_string("GEMINI_API_BASE", DEFAULT_BASE_URL),
            text_model: env_string("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL),
            image_model: env_string("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            gate_capacity: env_parse("MAX_CONCURRENT_CALLS", 3),
            retry,
            max_attempts: env_parse("GENERATION_MAX_ATTEMPTS", 6),
            attempt_delay: Duration::from_millis(env_parse("GENERATION_ATTEMPT_DELAY_MS", 750)),
            limits,
            collage,
            port: env_parse("PORT", 8080),
            max_photo_bytes: env_parse("MAX_PHOTO_BYTES", DEFAULT_MAX_PHOTO_BYTES),
        })
    }
}
