//! Value types shared across the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

/// Identity of the user driving a conversation.
///
/// Captured once when an action flow starts and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub organization_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl UserContext {
    /// Look up the value an auto field is sourced from.
    ///
    /// Blank values count as missing.
    pub fn value_of(&self, source: AutoSource) -> Option<&str> {
        let value = match source {
            AutoSource::UserId => &self.user_id,
            AutoSource::OrganizationId => &self.organization_id,
            AutoSource::Email => &self.email,
            AutoSource::Name => &self.name,
            AutoSource::Role => &self.role,
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Keys of [`UserContext`] an auto field may be populated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoSource {
    UserId,
    OrganizationId,
    Email,
    Name,
    Role,
}

impl fmt::Display for AutoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoSource::UserId => write!(f, "userId"),
            AutoSource::OrganizationId => write!(f, "organizationId"),
            AutoSource::Email => write!(f, "email"),
            AutoSource::Name => write!(f, "name"),
            AutoSource::Role => write!(f, "role"),
        }
    }
}

/// Token accounting reported by the language model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One prior message of a conversation, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub content: String,
    pub is_user: bool,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserContext {
        UserContext {
            user_id: "u-1".to_string(),
            organization_id: "org-9".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada Lovelace".to_string(),
            role: "Admin".to_string(),
        }
    }

    #[test]
    fn test_value_of_each_source() {
        let user = sample_user();
        assert_eq!(user.value_of(AutoSource::UserId), Some("u-1"));
        assert_eq!(user.value_of(AutoSource::OrganizationId), Some("org-9"));
        assert_eq!(user.value_of(AutoSource::Email), Some("ada@example.com"));
        assert_eq!(user.value_of(AutoSource::Name), Some("Ada Lovelace"));
        assert_eq!(user.value_of(AutoSource::Role), Some("Admin"));
    }

    #[test]
    fn test_value_of_blank_is_none() {
        let user = UserContext {
            email: "   ".to_string(),
            ..sample_user()
        };
        assert_eq!(user.value_of(AutoSource::Email), None);
    }

    #[test]
    fn test_user_context_serializes_camel_case() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["organizationId"], "org-9");
    }

    #[test]
    fn test_auto_source_display_matches_serde() {
        for source in [
            AutoSource::UserId,
            AutoSource::OrganizationId,
            AutoSource::Email,
            AutoSource::Name,
            AutoSource::Role,
        ] {
            let json = serde_json::to_value(source).unwrap();
            assert_eq!(json.as_str().unwrap(), source.to_string());
        }
    }

    #[test]
    fn test_history_constructors() {
        assert!(HistoryMessage::user("hi").is_user);
        assert!(!HistoryMessage::assistant("hello").is_user);
    }

    #[test]
    fn test_timestamp_roundtrip_datetime() {
        let ts = Timestamp(1_700_000_000);
        assert_eq!(ts.to_datetime().timestamp(), 1_700_000_000);
    }
}
