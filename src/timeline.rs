//! Shared timeline types.
//!
//! Every trajectory format is normalized into a list of [`TimelineEntry`]
//! values; this is the only shape the viewer (and the JSONL sidebar) reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of entry kinds the timeline knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Command,
    Edit,
    Search,
    Error,
    Message,
}

/// Who originated an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActorType {
    User,
    #[default]
    Assistant,
    System,
}

impl ActorType {
    /// Map a raw `source` field: `user` is the user, `system` and
    /// `environment` are tooling, everything else (including absent) is the agent.
    pub fn from_source(source: Option<&str>) -> Self {
        match source {
            Some("user") => ActorType::User,
            Some("system") | Some("environment") => ActorType::System,
            _ => ActorType::Assistant,
        }
    }

    /// Parse an explicit `actorType` label as written by the flat history format.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "User" => Some(ActorType::User),
            "Assistant" => Some(ActorType::Assistant),
            "System" => Some(ActorType::System),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActorType::User => "User",
            ActorType::Assistant => "Assistant",
            ActorType::System => "System",
        }
    }
}

/// A normalized, display-ready timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// ISO 8601; a placeholder "now" when the source has none
    pub timestamp: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Rationale attached to an action, rendered apart from `content`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub actor_type: ActorType,
    /// Side-channel data: exit codes, costs, screenshots, tool arguments
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TimelineEntry {
    pub fn new(entry_type: EntryType, timestamp: String, title: impl Into<String>) -> Self {
        Self {
            entry_type,
            timestamp,
            title: title.into(),
            content: None,
            thought: None,
            command: None,
            path: None,
            actor_type: ActorType::default(),
            metadata: Map::new(),
        }
    }

    pub fn with_actor(mut self, actor_type: ActorType) -> Self {
        self.actor_type = actor_type;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Current UTC time, used when an event carries no timestamp of its own.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
