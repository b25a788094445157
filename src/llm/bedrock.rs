//! Bedrock runtime endpoint.
//!
//! Posts the serialized request to `/model/{modelId}/invoke` using bearer
//! token authentication and classifies failures for the retry loop.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{Endpoint, EndpointError};
use crate::config::EndpointConfig;

const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";
const THROTTLING_EXCEPTION: &str = "ThrottlingException";

/// HTTP client for the Bedrock runtime `InvokeModel` operation.
pub struct BedrockEndpoint {
    base_url: String,
    api_key: String,
    client: Client,
}

impl BedrockEndpoint {
    /// Create a new endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an endpoint from configuration, requiring credentials.
    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            anyhow!(
                "Bedrock credentials not found. Set AWS_BEARER_TOKEN_BEDROCK environment \
                 variable or add api_key to the [endpoint] section of the config file."
            )
        })?;
        Self::new(config.resolved_base_url(), api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/invoke",
            self.base_url,
            urlencoding::encode(model_id)
        )
    }
}

#[async_trait]
impl Endpoint for BedrockEndpoint {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
        let url = self.invoke_url(model_id);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = response.status();
        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        Err(classify_failure(status, error_type.as_deref(), &bytes))
    }
}

#[derive(Debug, Deserialize)]
struct BedrockError {
    #[serde(alias = "Message")]
    message: String,
}

fn classify_failure(status: StatusCode, error_type: Option<&str>, body: &[u8]) -> EndpointError {
    let message = serde_json::from_slice::<BedrockError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text
            }
        });

    let throttled = status == StatusCode::TOO_MANY_REQUESTS
        || error_type.is_some_and(|t| t.starts_with(THROTTLING_EXCEPTION));

    if throttled {
        EndpointError::Throttled(format!("{}: {}", THROTTLING_EXCEPTION, message))
    } else {
        EndpointError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}
