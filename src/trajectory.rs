//! Raw trajectory shapes.
//!
//! Trajectories arrive in one of four envelopes:
//! - a bare array of events
//! - `{ "entries": [...] }`
//! - `{ "history": [...] }` (evaluation output, possibly in the flat sample format)
//! - `{ "test_result": { "git_patch": "..." } }` (no events, only a diff)
//!
//! Events are distinguished by which discriminator key they carry: `action`
//! for something the agent did, `observation` for the result that came back.
//! Everything is borrowed from the input `Value`; fields with an unexpected
//! JSON type are treated as absent.

use serde_json::{Map, Value};

use crate::error::{NormalizeError, Result};

pub(crate) type Object = Map<String, Value>;

/// Top-level trajectory envelope, detected once per input.
#[derive(Debug, Clone, Copy)]
pub enum Envelope<'a> {
    /// Bare array or `entries` array of raw events
    Events(&'a [Value]),
    /// `history` array from an evaluation run
    History(&'a [Value]),
    /// Unified diff from `test_result.git_patch`
    GitPatch(&'a str),
}

impl<'a> Envelope<'a> {
    /// Detect the envelope shape. Priority: array, `entries`, `history`, `test_result.git_patch`.
    pub fn detect(input: &'a Value) -> Result<Self> {
        let map = match input {
            Value::Array(events) => return Ok(Envelope::Events(events.as_slice())),
            Value::Object(map) => map,
            _ => return Err(NormalizeError::InvalidFormat),
        };

        if let Some(entries) = map.get("entries") {
            return entries
                .as_array()
                .map(|events| Envelope::Events(events.as_slice()))
                .ok_or(NormalizeError::EventsNotArray);
        }

        if let Some(history) = map.get("history").and_then(Value::as_array) {
            return Ok(Envelope::History(history.as_slice()));
        }

        map.get("test_result")
            .and_then(|result| result.get("git_patch"))
            .and_then(Value::as_str)
            .map(Envelope::GitPatch)
            .ok_or(NormalizeError::InvalidFormat)
    }
}

/// Optional side-channel objects that feed an entry's metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataSources<'a> {
    pub extras: Option<&'a Object>,
    pub tool_call: Option<&'a Object>,
}

impl<'a> MetadataSources<'a> {
    pub(crate) fn from_object(obj: &'a Object) -> Self {
        Self {
            extras: object_field(obj, "extras"),
            tool_call: object_field(obj, "tool_call_metadata"),
        }
    }

    /// Merge every source into one map. Later layers override earlier ones:
    ///
    /// 1. `extras` (minus a nested `metadata` object)
    /// 2. `extras.metadata` (screenshots land here)
    /// 3. `tool_call_metadata.tool_name` as `tool_name`
    /// 4. `tool_call_metadata.tool_args`
    pub fn merge(&self) -> Object {
        let mut merged = Object::new();

        if let Some(extras) = self.extras {
            for (key, value) in extras {
                if key == "metadata" && value.is_object() {
                    continue;
                }
                merged.insert(key.clone(), value.clone());
            }
            if let Some(nested) = object_field(extras, "metadata") {
                merged.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        if let Some(tool_call) = self.tool_call {
            if let Some(name) = tool_call.get("tool_name") {
                merged.insert("tool_name".to_string(), name.clone());
            }
            if let Some(args) = object_field(tool_call, "tool_args") {
                merged.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        merged
    }
}

/// Something the agent (or user) did: `{ "action": "...", "args": {...} }`.
#[derive(Debug, Clone)]
pub struct ActionEvent<'a> {
    pub name: &'a str,
    pub timestamp: Option<&'a str>,
    pub source: Option<&'a str>,
    pub message: Option<&'a str>,
    /// `cause` when it is a string, else `args.thought`
    pub thought: Option<&'a str>,
    pub content: Option<&'a str>,
    pub args: Option<&'a Object>,
    pub metadata: MetadataSources<'a>,
}

impl<'a> ActionEvent<'a> {
    pub fn arg(&self, key: &str) -> Option<&'a str> {
        self.args.and_then(|args| str_field(args, key))
    }
}

/// The recorded result of an action: `{ "observation": "...", "content": "..." }`.
#[derive(Debug, Clone)]
pub struct ObservationEvent<'a> {
    pub name: &'a str,
    pub timestamp: Option<&'a str>,
    pub source: Option<&'a str>,
    pub message: Option<&'a str>,
    pub content: Option<&'a str>,
    pub success: Option<bool>,
    pub metadata: MetadataSources<'a>,
}

impl ObservationEvent<'_> {
    /// Agent state machine transitions reported by the environment.
    pub fn is_state_change_noise(&self) -> bool {
        self.source == Some("environment") && self.name == "agent_state_changed"
    }
}

/// A single raw event, classified by its discriminator key.
#[derive(Debug, Clone)]
pub enum RawEvent<'a> {
    Action(ActionEvent<'a>),
    Observation(ObservationEvent<'a>),
    /// Neither `action` nor `observation`
    Unclassified(UnclassifiedEvent<'a>),
}

/// An event with no discriminator. Only the generic fields survive.
#[derive(Debug, Clone, Default)]
pub struct UnclassifiedEvent<'a> {
    pub timestamp: Option<&'a str>,
    pub source: Option<&'a str>,
    pub message: Option<&'a str>,
    pub content: Option<&'a str>,
}

impl<'a> RawEvent<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        match value.as_object() {
            Some(obj) => Self::from_object(obj),
            None => RawEvent::Unclassified(UnclassifiedEvent::default()),
        }
    }

    fn from_object(obj: &'a Object) -> Self {
        let timestamp = str_field(obj, "timestamp");
        let source = str_field(obj, "source");
        let message = str_field(obj, "message");
        let metadata = MetadataSources::from_object(obj);

        if let Some(name) = str_field(obj, "action").filter(|s| !s.is_empty()) {
            let args = object_field(obj, "args");
            let thought = str_field(obj, "cause")
                .or_else(|| args.and_then(|a| str_field(a, "thought")));
            let content =
                str_field(obj, "content").or_else(|| args.and_then(|a| str_field(a, "content")));
            return RawEvent::Action(ActionEvent {
                name,
                timestamp,
                source,
                message,
                thought,
                content,
                args,
                metadata,
            });
        }

        if let Some(name) = str_field(obj, "observation").filter(|s| !s.is_empty()) {
            return RawEvent::Observation(ObservationEvent {
                name,
                timestamp,
                source,
                message,
                content: str_field(obj, "content"),
                success: obj.get("success").and_then(Value::as_bool),
                metadata,
            });
        }

        RawEvent::Unclassified(UnclassifiedEvent {
            timestamp,
            source,
            message,
            content: str_field(obj, "content"),
        })
    }
}

/// The flat "sample" history format: fields are already timeline-shaped.
#[derive(Debug, Clone)]
pub struct FlatEntry<'a> {
    pub kind: &'a str,
    pub content: &'a str,
    pub actor_type: Option<&'a str>,
    pub source: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub title: Option<&'a str>,
    pub command: Option<&'a str>,
    pub path: Option<&'a str>,
    pub thought: Option<&'a str>,
    pub metadata: MetadataSources<'a>,
}

/// One element of a `history` array.
#[derive(Debug, Clone)]
pub enum HistoryEntry<'a> {
    Flat(FlatEntry<'a>),
    Event(RawEvent<'a>),
}

impl<'a> HistoryEntry<'a> {
    /// `type` + `content` + `actorType` together mark the flat format, even
    /// when the entry also carries an `action` or `observation`.
    pub fn from_value(value: &'a Value) -> Self {
        let Some(obj) = value.as_object() else {
            return HistoryEntry::Event(RawEvent::Unclassified(UnclassifiedEvent::default()));
        };

        let is_flat = ["type", "content", "actorType"]
            .iter()
            .all(|key| obj.contains_key(*key));
        if !is_flat {
            return HistoryEntry::Event(RawEvent::from_object(obj));
        }

        HistoryEntry::Flat(FlatEntry {
            kind: str_field(obj, "type").unwrap_or(""),
            content: str_field(obj, "content").unwrap_or(""),
            actor_type: str_field(obj, "actorType"),
            source: str_field(obj, "source"),
            timestamp: str_field(obj, "timestamp"),
            title: str_field(obj, "title"),
            command: str_field(obj, "command"),
            path: str_field(obj, "path"),
            thought: str_field(obj, "thought"),
            metadata: MetadataSources::from_object(obj),
        })
    }
}

pub(crate) fn str_field<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

pub(crate) fn object_field<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key).and_then(Value::as_object)
}
