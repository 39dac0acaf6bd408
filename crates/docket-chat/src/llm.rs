//! Language-model collaborators: intent classification and general replies.
//!
//! [`GeminiClient`] talks to the Gemini `generateContent` endpoint over
//! HTTP. [`OfflineResponder`] stands in when no API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docket_core::config::LlmConfig;
use docket_core::types::{HistoryMessage, TokenUsage};
use docket_storage::ContextRecord;

use crate::classifier::{IntentClassification, IntentClassifier};
use crate::error::ChatError;

const LEGAL_PREAMBLE: &str = "You are Docket, a legal-focused AI assistant.
Your responses must:
1. Be strictly related to legal matters
2. Avoid giving medical, financial, or general advice
3. Cite relevant legal principles when possible
4. Be concise and professional
5. When unsure, say \"I need more context to provide an accurate legal response\"
6. Answer questions about details already present in the conversation context (for example the user's name, email or organization) directly.";

/// Open-ended reply with optional token accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralReply {
    pub response: String,
    pub usage: Option<TokenUsage>,
}

/// Produces a free-form reply when no action flow applies.
#[async_trait]
pub trait GeneralResponder: Send + Sync {
    /// `history` is oldest first and ends with the current user message.
    async fn reply(
        &self,
        history: &[HistoryMessage],
        context: &ContextRecord,
    ) -> Result<GeneralReply, ChatError>;
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.parts;
        let text: String = parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn usage(&self) -> Option<TokenUsage> {
        self.usage_metadata.as_ref().map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
    }
}

// =============================================================================
// Gemini client
// =============================================================================

/// Gemini HTTP client, usable as both classifier and responder.
pub struct GeminiClient {
    http: Client,
    config: LlmConfig,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::LlmError("API key is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    async fn generate(&self, contents: Vec<Content>) -> Result<GenerateResponse, ChatError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let body = GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        debug!(model = %self.config.model, "Sending generateContent request");
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChatError::LlmError(format!("HTTP {}: {}", status, text)));
        }
        serde_json::from_str(&text)
            .map_err(|e| ChatError::LlmError(format!("unreadable response: {}", e)))
    }
}

fn user_turn(text: String) -> Content {
    Content {
        role: "user",
        parts: vec![Part { text }],
    }
}

fn classification_prompt(message: &str) -> String {
    format!(
        "Analyze this user message and determine their intent.

User message: \"{}\"

Possible intents:
- CREATE_REQUEST_FORM: User wants to create a request form or external ticket form
- CREATE_CATEGORY: User wants to create a category for internal tickets
- CREATE_INTERNAL_TICKET: User wants to create/raise an internal ticket or request
- GENERAL: General legal question or any other conversation

Respond with ONLY a valid JSON object, no markdown, no backticks, no extra text:
{{\"intent\": \"GENERAL\", \"confidence\": 0.9}}",
        message
    )
}

/// Parse a classifier reply, tolerating markdown code fences.
///
/// Anything unreadable degrades to `GENERAL` with zero confidence.
pub fn parse_classification(raw: &str) -> IntentClassification {
    let cleaned = raw.replace("```json", "").replace("```", "");
    match serde_json::from_str::<IntentClassification>(cleaned.trim()) {
        Ok(parsed) if !parsed.intent.trim().is_empty() => {
            IntentClassification::new(parsed.intent.trim(), parsed.confidence)
        }
        Ok(_) => IntentClassification::general(),
        Err(e) => {
            warn!(error = %e, "Unparseable intent classification");
            IntentClassification::general()
        }
    }
}

/// Build the request contents: prior turns as history, then the current
/// message wrapped with the preamble and context.
fn reply_contents(history: &[HistoryMessage], context: &ContextRecord) -> Result<Vec<Content>, ChatError> {
    let (current, earlier) = history
        .split_last()
        .ok_or_else(|| ChatError::LlmError("conversation history is empty".to_string()))?;
    let context_json = serde_json::to_string(context).map_err(|e| ChatError::ParseError(e.to_string()))?;

    let mut contents: Vec<Content> = earlier
        .iter()
        .map(|m| Content {
            role: if m.is_user { "user" } else { "model" },
            parts: vec![Part {
                text: m.content.clone(),
            }],
        })
        .collect();
    contents.push(user_turn(format!(
        "{}\nCurrent conversation context: {}\nUser query: {}",
        LEGAL_PREAMBLE, context_json, current.content
    )));
    Ok(contents)
}

#[async_trait]
impl IntentClassifier for GeminiClient {
    async fn classify(&self, message: &str) -> Result<IntentClassification, ChatError> {
        let result = match self.generate(vec![user_turn(classification_prompt(message))]).await {
            Ok(response) => response
                .text()
                .map(|t| parse_classification(&t))
                .unwrap_or_else(IntentClassification::general),
            Err(e) => {
                warn!(error = %e, "Intent classification failed, treating as general");
                IntentClassification::general()
            }
        };
        debug!(intent = %result.intent, confidence = result.confidence, "Detected intent");
        Ok(result)
    }
}

#[async_trait]
impl GeneralResponder for GeminiClient {
    async fn reply(
        &self,
        history: &[HistoryMessage],
        context: &ContextRecord,
    ) -> Result<GeneralReply, ChatError> {
        let response = self.generate(reply_contents(history, context)?).await?;
        let text = response
            .text()
            .ok_or_else(|| ChatError::LlmError("response has no text".to_string()))?;
        Ok(GeneralReply {
            response: text,
            usage: response.usage(),
        })
    }
}

// =============================================================================
// Offline responder
// =============================================================================

/// Responder used when no language model is configured.
#[derive(Debug, Default)]
pub struct OfflineResponder;

pub const OFFLINE_REPLY: &str = "I can help you create a Request Form, create a Category or raise an Internal Ticket. General legal questions need a language model API key to be configured.";

#[async_trait]
impl GeneralResponder for OfflineResponder {
    async fn reply(
        &self,
        _history: &[HistoryMessage],
        _context: &ContextRecord,
    ) -> Result<GeneralReply, ChatError> {
        Ok(GeneralReply {
            response: OFFLINE_REPLY.to_string(),
            usage: None,
        })
    }
}
