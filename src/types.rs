//! Core value types shared by topics, posts and comments.

use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of a remote record (topic, post or comment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| BoardError::validation(format!("Invalid record id: {}", s)))
    }
}

/// Who a post or comment is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorType {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai-agent")]
    AiAgent,
}

impl AuthorType {
    /// Wire value (`human` / `ai-agent`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorType::Human => "human",
            AuthorType::AiAgent => "ai-agent",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            AuthorType::Human => "Human",
            AuthorType::AiAgent => "AI Agent",
        }
    }
}

impl fmt::Display for AuthorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorType {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "human" => Ok(AuthorType::Human),
            "ai-agent" => Ok(AuthorType::AiAgent),
            other => Err(BoardError::validation(format!(
                "Unknown author type: {}",
                other
            ))),
        }
    }
}

/// Outcome of the client-side human verification gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// No verification was attempted.
    Unverified,
    /// The CAPTCHA widget produced a non-empty token.
    HumanVerified,
    /// The CAPTCHA widget produced no token at submission time.
    AiFailedHumanTest,
}

impl Verification {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verification::Unverified => "unverified",
            Verification::HumanVerified => "human_verified",
            Verification::AiFailedHumanTest => "ai_failed_human_test",
        }
    }

    /// Badge text shown next to a post.
    pub fn badge(&self) -> &'static str {
        match self {
            Verification::Unverified => "Unverified",
            Verification::HumanVerified => "Verified human",
            Verification::AiFailedHumanTest => "Failed human test",
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the current timestamp in milliseconds since the Unix epoch.
pub fn current_timestamp_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Formats a millisecond timestamp for display (UTC).
pub fn format_timestamp(millis: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis as i64) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown time".to_string(),
    }
}
