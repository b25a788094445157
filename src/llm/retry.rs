//! Throttling retry protocol around a single endpoint.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::{Endpoint, EndpointError};
use crate::conversation::{MessageLog, Turn};
use crate::model::{DecodeError, GenerationParams, Model, RequestBody};

/// How throttled calls are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Wait before retrying after the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Why an invocation produced no text.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Every attempt was throttled.
    #[error("maximum retries exceeded after {attempts} attempts: {reason}")]
    MaxRetriesExceeded { attempts: u32, reason: String },

    /// A non-retryable endpoint failure.
    #[error(transparent)]
    Endpoint(EndpointError),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),
}

/// Send `body` to `model` through `endpoint`, backing off while throttled.
///
/// Makes at most `policy.max_retries + 1` calls. Any failure other than
/// throttling ends the invocation immediately.
pub async fn invoke<E>(
    endpoint: &E,
    model: &Model,
    body: &RequestBody,
    policy: &RetryPolicy,
) -> Result<String, InvokeError>
where
    E: Endpoint + ?Sized,
{
    let payload = body.to_bytes().map_err(InvokeError::Encode)?;
    let mut attempt: u32 = 0;

    loop {
        debug!(model = %model.id, attempt, bytes = payload.len(), "Invoking model");

        match endpoint.invoke(&model.id, payload.clone()).await {
            Ok(raw) => return Ok(model.family.extract_text(&raw)?),
            Err(e) if e.is_throttled() => {
                if attempt >= policy.max_retries {
                    return Err(InvokeError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        reason: e.to_string(),
                    });
                }
                let wait = policy.delay_for(attempt);
                warn!(
                    "Rate limited by model. Retrying in {:.1} seconds...",
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(InvokeError::Endpoint(e)),
        }
    }
}

/// Make a single unretried call to check that the endpoint accepts our credentials.
///
/// Throttling counts as reachable: the request was authenticated.
pub async fn probe<E>(endpoint: &E, model: &Model) -> Result<(), EndpointError>
where
    E: Endpoint + ?Sized,
{
    let mut log = MessageLog::new();
    log.append(Turn::user("test"));
    let params = GenerationParams {
        max_tokens: 16,
        ..GenerationParams::default()
    };
    let body = model.family.build_request(&log, &params, 1);

    match invoke(endpoint, model, &body, &RetryPolicy::no_retries()).await {
        Ok(_) | Err(InvokeError::MaxRetriesExceeded { .. }) | Err(InvokeError::Decode(_)) => {
            Ok(())
        }
        Err(InvokeError::Endpoint(e)) => Err(e),
        Err(InvokeError::Encode(e)) => Err(EndpointError::Transport(e.to_string())),
    }
}
