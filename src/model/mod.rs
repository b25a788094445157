//! Request shaping for model families.
//!
//! A model identifier is classified into one of a closed set of families.
//! Each family knows how to turn the message log into its wire request and
//! how to pull the generated text back out of a response body.

pub mod claude;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::MessageLog;

/// Fixed generation parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// The model identifier did not match any supported family.
#[derive(Debug, Error)]
#[error("unsupported model '{0}': only Claude model identifiers are supported")]
pub struct UnsupportedModel(pub String);

/// The response body could not be turned into text.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response contained no text content")]
    Empty,
}

/// Supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Claude,
}

impl ModelFamily {
    /// Classify a model identifier by the family name it contains.
    pub fn classify(model_id: &str) -> Result<Self, UnsupportedModel> {
        let id = model_id.to_lowercase();
        if id.contains("claude") {
            Ok(ModelFamily::Claude)
        } else {
            Err(UnsupportedModel(model_id.to_string()))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Claude => "claude",
        }
    }

    /// Build a request body from the log.
    pub fn build_request(
        &self,
        log: &MessageLog,
        params: &GenerationParams,
        window: usize,
    ) -> RequestBody {
        match self {
            ModelFamily::Claude => RequestBody::Claude(claude::build_request(log, params, window)),
        }
    }

    /// Extract the primary text from a raw response body.
    pub fn extract_text(&self, body: &[u8]) -> Result<String, DecodeError> {
        match self {
            ModelFamily::Claude => claude::extract_text(body),
        }
    }
}

/// A family-specific request, serialized as-is onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Claude(claude::ClaudeRequest),
}

impl RequestBody {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A model identifier paired with its resolved family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub family: ModelFamily,
}

impl Model {
    /// Resolve a model identifier, rejecting unknown families.
    pub fn resolve(id: impl Into<String>) -> Result<Self, UnsupportedModel> {
        let id = id.into();
        let family = ModelFamily::classify(&id)?;
        Ok(Self { id, family })
    }
}
