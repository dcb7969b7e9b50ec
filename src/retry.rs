use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::error::CallError;

/// Upstream calls ride a generous per-attempt timeout; the platform request
/// timeout is the only outer bound.
const CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Ordered list of API credentials, tried primary-first. Never reshuffled.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
}

impl CredentialPool {
    /// Builds a pool from the given keys, dropping blank entries. Returns
    /// `None` when nothing usable remains: the pool is non-empty by
    /// construction.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Option<Self> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(Self { keys })
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first try; 3 means up to 4 attempts total.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(8_000),
        }
    }
}

/// Backoff before retry number `attempt` (0-based), given the status that
/// failed. Rate limiting backs off on a steeper curve with a higher ceiling
/// than plain server errors; both carry jitter so synchronized clients
/// spread out.
///
/// `jitter_unit` is a sample in [-1, 1]; production passes `jitter_sample()`,
/// tests pass a fixed value. The function itself is deterministic.
pub fn backoff_delay(
    policy: &RetryPolicy,
    status: Option<u16>,
    attempt: u32,
    jitter_unit: f64,
) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let max_ms = policy.max_delay.as_millis() as u64;
    let shift = 1u64 << attempt.min(16);

    let (expo_ms, jitter_frac, floor_ms, ceil_ms) = if status == Some(429) {
        let ceil = max_ms.saturating_mul(2);
        let expo = base_ms.saturating_mul(5).saturating_mul(shift).min(ceil);
        (expo, 0.20, 1_000u64, ceil)
    } else {
        let expo = base_ms.saturating_mul(shift).min(max_ms);
        (expo, 0.15, 500u64, max_ms)
    };

    let jitter_unit = jitter_unit.clamp(-1.0, 1.0);
    let jittered = expo_ms as f64 * (1.0 + jitter_frac * jitter_unit);
    let clamped = (jittered as u64).clamp(floor_ms.min(ceil_ms), ceil_ms);
    Duration::from_millis(clamped)
}

fn jitter_sample() -> f64 {
    rand::thread_rng().gen_range(-1.0..=1.0)
}

/// One full retry cycle against the endpoint with a single credential.
/// 2xx returns the parsed JSON body; retryable failures (429, 500, 502,
/// 503, 504, network errors) back off and retry until the budget runs out;
/// anything else fails immediately.
pub async fn call_with_backoff(
    http: &Client,
    url: &str,
    payload: &Value,
    api_key: &str,
    policy: &RetryPolicy,
) -> Result<Value, CallError> {
    let mut last_status: Option<u16> = None;
    let mut attempt: u32 = 0;
    loop {
        let outcome = http
            .post(url)
            .header("x-goog-api-key", api_key)
            .timeout(CALL_TIMEOUT)
            .json(payload)
            .send()
            .await;

        let error = match outcome {
            Ok(response) if response.status().is_success() => {
                return response
                    .json::<Value>()
                    .await
                    .map_err(|err| CallError::Network(err.to_string()));
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                last_status = Some(status.as_u16());
                CallError::from_status(status, &body)
            }
            Err(err) => CallError::Network(err.to_string()),
        };

        if error.is_retryable() && attempt < policy.max_retries {
            // Network errors back off on the curve of the last seen status.
            let status = error.status().or(last_status);
            let delay = backoff_delay(policy, status, attempt, jitter_sample());
            warn!(
                "⚠️ Upstream call failed ({}), retry {}/{} in {:?}",
                error,
                attempt + 1,
                policy.max_retries,
                delay
            );
            sleep(delay).await;
            attempt += 1;
            continue;
        }
        return Err(error);
    }
}

/// Runs `call` with each credential in order. A failure that looks like an
/// auth or rate-limit problem restarts the whole retry cycle fresh under
/// the next credential; any other failure propagates immediately. When
/// rotation happened and the final credential still fails, the error is
/// reported as the pool being exhausted.
pub async fn with_failover<T, F, Fut>(
    pool: &CredentialPool,
    mut call: F,
) -> Result<T, CallError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let total = pool.len();
    for (slot, key) in pool.keys().enumerate() {
        match call(key.to_string()).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.triggers_failover() {
                    return Err(error);
                }
                if slot + 1 < total {
                    warn!(
                        "🔄 Credential {}/{} failed ({}), rotating to next",
                        slot + 1,
                        total,
                        error.code()
                    );
                    continue;
                }
                if slot > 0 {
                    return Err(CallError::CredentialsExhausted {
                        tried: total,
                        last: Box::new(error),
                    });
                }
                return Err(error);
            }
        }
    }
    unreachable!("credential pool is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(8_000),
        }
    }

    #[test]
    fn rate_limit_backs_off_harder_than_server_errors() {
        let policy = policy();
        for attempt in 0..6 {
            for jitter in [-1.0, -0.5, 0.0, 0.5, 1.0] {
                let rate = backoff_delay(&policy, Some(429), attempt, jitter);
                let unavailable = backoff_delay(&policy, Some(503), attempt, jitter);
                assert!(
                    rate >= unavailable,
                    "attempt {attempt} jitter {jitter}: {rate:?} < {unavailable:?}"
                );
            }
        }
    }

    #[test]
    fn delays_respect_floors_and_ceilings() {
        let tight = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(4_000),
        };
        // Tiny base: floors kick in.
        assert_eq!(
            backoff_delay(&tight, Some(503), 0, -1.0),
            Duration::from_millis(500)
        );
        assert_eq!(
            backoff_delay(&tight, Some(429), 0, -1.0),
            Duration::from_millis(1_000)
        );
        // Huge attempt: ceilings kick in.
        assert!(backoff_delay(&tight, Some(503), 20, 1.0) <= Duration::from_millis(4_000));
        assert!(backoff_delay(&tight, Some(429), 20, 1.0) <= Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_within_its_band() {
        let policy = policy();
        // attempt 1 on the non-429 curve: expo = 2000ms, band ±15%.
        let low = backoff_delay(&policy, Some(500), 1, -1.0);
        let high = backoff_delay(&policy, Some(500), 1, 1.0);
        assert_eq!(low, Duration::from_millis(1_700));
        assert_eq!(high, Duration::from_millis(2_300));
    }

    #[test]
    fn network_errors_without_status_use_the_default_curve() {
        let policy = policy();
        assert_eq!(
            backoff_delay(&policy, None, 0, 0.0),
            backoff_delay(&policy, Some(500), 0, 0.0)
        );
    }

    #[test]
    fn pool_drops_blank_keys_and_rejects_empty() {
        let pool = CredentialPool::new(vec!["  ".into(), "key-a".into(), "".into()]).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(CredentialPool::new(vec!["".into()]).is_none());
    }

    #[tokio::test]
    async fn failover_rotates_past_an_auth_failure() {
        let pool = CredentialPool::new(vec!["primary".into(), "secondary".into()]).unwrap();
        let calls = AtomicUsize::new(0);
        let result = with_failover(&pool, |key| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if key == "primary" {
                    Err(CallError::from_status(StatusCode::UNAUTHORIZED, ""))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failover_does_not_rotate_on_server_errors() {
        let pool = CredentialPool::new(vec!["primary".into(), "secondary".into()]).unwrap();
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_failover(&pool, |_key| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CallError::from_status(StatusCode::INTERNAL_SERVER_ERROR, ""))
            }
        })
        .await;
        assert!(matches!(result, Err(CallError::Upstream { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_the_pool_is_reported_as_such() {
        let pool =
            CredentialPool::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_failover(&pool, |_key| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CallError::from_status(StatusCode::TOO_MANY_REQUESTS, ""))
            }
        })
        .await;
        match result {
            Err(CallError::CredentialsExhausted { tried, last }) => {
                assert_eq!(tried, 3);
                assert!(matches!(*last, CallError::RateLimited { .. }));
            }
            other => panic!("expected CredentialsExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_credential_failure_keeps_its_own_class() {
        let pool = CredentialPool::new(vec!["only".into()]).unwrap();
        let result: Result<(), _> = with_failover(&pool, |_key| async {
            Err(CallError::from_status(StatusCode::TOO_MANY_REQUESTS, ""))
        })
        .await;
        assert!(matches!(result, Err(CallError::RateLimited { .. })));
    }
}
