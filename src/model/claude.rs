//! Claude Messages schema as accepted by the Bedrock runtime.

use serde::{Deserialize, Serialize};

use super::{DecodeError, GenerationParams};
use crate::conversation::{MessageLog, Role};

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaudeRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaudeMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    content_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Build a request from the first system prompt and the recent window.
pub fn build_request(log: &MessageLog, params: &GenerationParams, window: usize) -> ClaudeRequest {
    let system = Some(log.system_prompt())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let messages = log
        .recent_turns(window)
        .into_iter()
        .map(|turn| ClaudeMessage {
            role: turn.role,
            content: turn.content.clone(),
        })
        .collect();

    ClaudeRequest {
        anthropic_version: ANTHROPIC_VERSION.to_string(),
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        top_p: params.top_p,
        system,
        messages,
    }
}

/// Text of the first content block.
pub fn extract_text(body: &[u8]) -> Result<String, DecodeError> {
    let response: ClaudeResponse = serde_json::from_slice(body)?;
    response
        .content
        .into_iter()
        .next()
        .and_then(|c| c.text)
        .ok_or(DecodeError::Empty)
}
