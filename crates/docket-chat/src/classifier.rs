//! Intent classification of free-text messages.
//!
//! The engine only needs `{intent, confidence}`. An LLM-backed classifier
//! lives in [`crate::llm`]; the regex classifier here works offline.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Intent id for anything that is not an action request.
pub const GENERAL_INTENT: &str = "GENERAL";

/// Classifier output. `confidence` is a probability in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
}

impl IntentClassification {
    pub fn new(intent: impl Into<String>, confidence: f64) -> Self {
        Self {
            intent: intent.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The fallback used when classification is impossible.
    pub fn general() -> Self {
        Self::new(GENERAL_INTENT, 0.0)
    }

    /// Whether this should start an action flow.
    pub fn is_actionable(&self, threshold: f64) -> bool {
        self.intent != GENERAL_INTENT && self.confidence >= threshold
    }
}

/// Maps a message to an intent.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<IntentClassification, ChatError>;
}

struct IntentPattern {
    regex: Regex,
    intent: &'static str,
    base_confidence: f64,
}

/// Keyword classifier for the built-in actions.
///
/// Takes the highest-confidence match; no match is `GENERAL`.
pub struct PatternClassifier {
    patterns: Vec<IntentPattern>,
}

impl PatternClassifier {
    pub fn new() -> Result<Self, ChatError> {
        let table: Vec<(&str, &'static str, f64)> = vec![
            // Request forms
            (
                r"(?i)\b(?:create|make|build|set\s+up|add|new)\b.*\b(?:request|intake|public|external)\s+form\b",
                "CREATE_REQUEST_FORM",
                0.92,
            ),
            (r"(?i)\brequest\s+form\b", "CREATE_REQUEST_FORM", 0.75),
            // Categories
            (
                r"(?i)\b(?:create|make|add|new|set\s+up)\b.*\bcategor(?:y|ies)\b",
                "CREATE_CATEGORY",
                0.9,
            ),
            // Internal tickets
            (
                r"(?i)\b(?:raise|create|open|file|submit|log|new)\b.*\b(?:internal\s+)?ticket\b",
                "CREATE_INTERNAL_TICKET",
                0.9,
            ),
            (r"(?i)\binternal\s+(?:ticket|request)\b", "CREATE_INTERNAL_TICKET", 0.8),
            (r"(?i)\bticket\b", "CREATE_INTERNAL_TICKET", 0.5),
        ];

        let patterns = table
            .into_iter()
            .map(|(pat, intent, base_confidence)| {
                Regex::new(pat)
                    .map(|regex| IntentPattern {
                        regex,
                        intent,
                        base_confidence,
                    })
                    .map_err(|e| ChatError::ParseError(format!("intent pattern {}: {}", pat, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    fn best_match(&self, message: &str) -> IntentClassification {
        self.patterns
            .iter()
            .filter(|p| p.regex.is_match(message))
            .max_by(|a, b| a.base_confidence.total_cmp(&b.base_confidence))
            .map(|p| IntentClassification::new(p.intent, p.base_confidence))
            .unwrap_or_else(IntentClassification::general)
    }
}

#[async_trait]
impl IntentClassifier for PatternClassifier {
    async fn classify(&self, message: &str) -> Result<IntentClassification, ChatError> {
        let result = self.best_match(message);
        tracing::debug!(intent = %result.intent, confidence = result.confidence, "Pattern classification");
        Ok(result)
    }
}
