//! Configuration management for brchat.
//!
//! Defaults cover everything; a TOML file is read only when one is passed
//! explicitly with `--config`, and command-line flags override both.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::llm::RetryPolicy;
use crate::model::GenerationParams;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model identifier sent to the endpoint.
    #[serde(default = "default_model")]
    pub model: String,
    /// System prompt seeded into every new conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Number of recent non-system turns sent with each request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Generation parameters.
    #[serde(default)]
    pub generation: GenerationParams,
    /// Throttling retry behaviour.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Inference endpoint settings.
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: default_system_prompt(),
            history_window: default_history_window(),
            generation: GenerationParams::default(),
            retry: RetryConfig::default(),
            endpoint: EndpointConfig::default(),
        }
    }
}

fn default_model() -> String {
    "us.anthropic.claude-3-5-sonnet-20241022-v2:0".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant using Amazon Bedrock. You have knowledge of software \
     development and computer science. Be concise yet thorough in your responses. When \
     sharing code, place it within code blocks."
        .to_string()
}

fn default_history_window() -> usize {
    10
}

/// Retry settings for throttled requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in seconds; doubled after every throttled attempt.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    2
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.base_delay_secs))
    }
}

/// Bedrock runtime endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// AWS region hosting the runtime endpoint.
    #[serde(default = "default_region")]
    pub region: String,
    /// Full base URL, overriding the one derived from the region.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token (prefer AWS_BEARER_TOKEN_BEDROCK env var).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            base_url: None,
            api_key: None,
        }
    }
}

fn default_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

impl EndpointConfig {
    /// The base URL requests are sent to.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }

    /// Get the bearer token from config or environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("AWS_BEARER_TOKEN_BEDROCK").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from an explicit file, or use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject settings that would break the retry or request contracts.
    pub fn validate(&self) -> Result<()> {
        if self.retry.base_delay_secs == 0 {
            bail!("retry.base_delay_secs must be at least 1 so backoff grows between attempts");
        }
        if self.history_window == 0 {
            bail!("history_window must be at least 1");
        }
        Ok(())
    }
}
