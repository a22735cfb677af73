//! Trajectory normalizer - turns any supported envelope into timeline entries.
//!
//! Handles:
//! - Bare event arrays and `{ entries }` (OpenHands event stream)
//! - `{ history }` (evaluation output, original or flat sample format)
//! - `{ test_result.git_patch }` (diff only, one entry per changed file)
//!
//! Produces:
//! - `Vec<TimelineEntry>` in input order. Event streams get a synthetic
//!   start entry first; history and git patches do not.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::timeline::{now_timestamp, ActorType, EntryType, TimelineEntry};
use crate::trajectory::{
    ActionEvent, Envelope, FlatEntry, HistoryEntry, ObservationEvent, RawEvent, UnclassifiedEvent,
};

pub const START_TITLE: &str = "Starting trajectory visualization";
pub const START_CONTENT: &str = "Trajectory loaded from OpenHands format";
pub const GIT_PATCH_TITLE: &str = "Git Patch";

/// Title for history events that name nothing at all
const UNKNOWN_TITLE: &str = "Unknown event";

/// `diff --git a/<file> b/<file>` headers, one per changed file
static DIFF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^diff --git a/(.*?) b/(.*?)$").expect("valid diff header regex")
});

/// Event-stream action names with a dedicated entry type.
const ACTION_TYPES: &[(&str, EntryType)] = &[
    ("execute_bash", EntryType::Command),
    ("str_replace_editor", EntryType::Edit),
    ("web_read", EntryType::Search),
    ("browser", EntryType::Search),
];

/// History (evaluation output) action names; anything else is a command.
const HISTORY_ACTION_TYPES: &[(&str, EntryType)] = &[
    ("read", EntryType::Search),
    ("message", EntryType::Message),
];

/// Observations that are really chat messages, whatever their outcome.
const MESSAGE_OBSERVATIONS: &[&str] = &["user_message", "assistant_message"];

/// Exact `type` names used by the flat history format.
const EXACT_TYPES: &[(&str, EntryType)] = &[
    ("command", EntryType::Command),
    ("edit", EntryType::Edit),
    ("search", EntryType::Search),
    ("query_code_index", EntryType::Search),
    ("error", EntryType::Error),
    ("message", EntryType::Message),
    ("thought", EntryType::Message),
];

/// Substring heuristics for unrecognized type names, tried in order.
const TYPE_HEURISTICS: &[(&[&str], EntryType)] = &[
    (&["read", "search", "query"], EntryType::Search),
    (&["edit", "write", "update"], EntryType::Edit),
    (&["run", "execute", "command"], EntryType::Command),
    (&["error", "fail"], EntryType::Error),
];

/// Normalize any supported trajectory envelope.
///
/// Fails only when the top-level shape is unrecognized or an `entries`
/// payload is not an array.
pub fn normalize(input: &Value) -> Result<Vec<TimelineEntry>> {
    let entries = match Envelope::detect(input)? {
        Envelope::Events(events) => {
            debug!("Normalizing event stream with {} events", events.len());
            normalize_events(events)
        }
        Envelope::History(history) => {
            debug!("Normalizing history with {} entries", history.len());
            normalize_history(history)
        }
        Envelope::GitPatch(patch) => {
            debug!("Normalizing git patch ({} bytes)", patch.len());
            normalize_git_patch(patch)
        }
    };
    Ok(entries)
}

/// The synthetic entry that opens every event-stream timeline.
pub fn start_entry() -> TimelineEntry {
    TimelineEntry::new(EntryType::Message, now_timestamp(), START_TITLE)
        .with_actor(ActorType::System)
        .with_content(START_CONTENT)
}

/// Map a flat-format `type` name onto the closed entry type set.
pub fn map_entry_type(kind: &str) -> EntryType {
    if let Some(&(_, entry_type)) = EXACT_TYPES.iter().find(|(name, _)| *name == kind) {
        return entry_type;
    }
    TYPE_HEURISTICS
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| kind.contains(*needle)))
        .map(|&(_, entry_type)| entry_type)
        .unwrap_or(EntryType::Message)
}

fn lookup_type(table: &[(&str, EntryType)], name: &str) -> Option<EntryType> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, entry_type)| entry_type)
}

/// Bare arrays and `{ entries }`: start entry, then one entry per action or observation.
fn normalize_events(events: &[Value]) -> Vec<TimelineEntry> {
    let mut entries = Vec::with_capacity(events.len() + 1);
    entries.push(start_entry());

    for (index, value) in events.iter().enumerate() {
        match RawEvent::from_value(value) {
            RawEvent::Action(action) => {
                let entry_type = lookup_type(ACTION_TYPES, action.name).unwrap_or(EntryType::Message);
                entries.push(action_entry(&action, entry_type));
            }
            RawEvent::Observation(observation) if observation.is_state_change_noise() => {
                debug!("Skipping agent state change at event {}", index);
            }
            RawEvent::Observation(observation) => {
                let entry_type = if MESSAGE_OBSERVATIONS.iter().any(|name| *name == observation.name) {
                    EntryType::Message
                } else {
                    outcome_type(&observation, EntryType::Message)
                };
                entries.push(observation_entry(&observation, entry_type));
            }
            RawEvent::Unclassified(_) => {
                debug!("Dropping event {} with neither action nor observation", index);
            }
        }
    }

    entries
}

/// `{ history }`: every entry maps directly, no start entry.
fn normalize_history(history: &[Value]) -> Vec<TimelineEntry> {
    history.iter().map(normalize_history_entry).collect()
}

/// Map one `history` element, flat or original shape.
pub fn normalize_history_entry(value: &Value) -> TimelineEntry {
    match HistoryEntry::from_value(value) {
        HistoryEntry::Flat(flat) => flat_entry(&flat),
        HistoryEntry::Event(RawEvent::Action(action)) => {
            let entry_type =
                lookup_type(HISTORY_ACTION_TYPES, action.name).unwrap_or(EntryType::Command);
            let mut entry = action_entry(&action, entry_type);
            entry.content = action.content.map(str::to_string);
            entry
        }
        HistoryEntry::Event(RawEvent::Observation(observation)) => {
            let kind =
                lookup_type(HISTORY_ACTION_TYPES, observation.name).unwrap_or(EntryType::Command);
            let entry_type = outcome_type(&observation, kind);
            observation_entry(&observation, entry_type)
        }
        HistoryEntry::Event(RawEvent::Unclassified(event)) => unclassified_entry(&event),
    }
}

/// `{ test_result.git_patch }`: the whole patch, then one edit per changed file.
fn normalize_git_patch(patch: &str) -> Vec<TimelineEntry> {
    let timestamp = now_timestamp();
    let mut entries = vec![TimelineEntry::new(EntryType::Message, timestamp.clone(), GIT_PATCH_TITLE)
        .with_actor(ActorType::System)
        .with_content(patch)];

    entries.extend(DIFF_HEADER.captures_iter(patch).map(|caps| {
        let file = &caps[1];
        let mut entry =
            TimelineEntry::new(EntryType::Edit, timestamp.clone(), format!("Changes in {}", file))
                .with_actor(ActorType::System)
                .with_content("");
        entry.path = Some(file.to_string());
        entry
    }));

    entries
}

fn action_entry(action: &ActionEvent<'_>, entry_type: EntryType) -> TimelineEntry {
    let title = non_empty(action.message).unwrap_or(action.name);
    let mut entry = TimelineEntry::new(entry_type, timestamp_or_now(action.timestamp), title)
        .with_actor(ActorType::from_source(action.source));

    entry.thought = non_empty(action.thought).map(str::to_string);
    if action.name == "execute_bash" {
        entry.command = non_empty(action.arg("command")).map(str::to_string);
    }
    if matches!(action.name, "str_replace_editor" | "read") {
        entry.path = non_empty(action.arg("path")).map(str::to_string);
    }
    entry.metadata = action.metadata.merge();
    entry
}

fn observation_entry(observation: &ObservationEvent<'_>, entry_type: EntryType) -> TimelineEntry {
    let title = non_empty(observation.message).unwrap_or(observation.name);
    let mut entry = TimelineEntry::new(entry_type, timestamp_or_now(observation.timestamp), title)
        .with_actor(ActorType::from_source(observation.source));
    entry.content = observation.content.map(str::to_string);
    entry.metadata = observation.metadata.merge();
    entry
}

fn flat_entry(flat: &FlatEntry<'_>) -> TimelineEntry {
    let title = non_empty(flat.title)
        .or_else(|| non_empty(flat.content.lines().next()))
        .unwrap_or(flat.kind);
    let actor = flat
        .actor_type
        .and_then(ActorType::from_label)
        .unwrap_or_else(|| ActorType::from_source(flat.source));

    let mut entry = TimelineEntry::new(map_entry_type(flat.kind), timestamp_or_now(flat.timestamp), title)
        .with_actor(actor);
    if flat.kind == "thought" {
        entry.thought = Some(flat.content.to_string());
    } else {
        entry.content = Some(flat.content.to_string());
        entry.thought = non_empty(flat.thought).map(str::to_string);
    }
    entry.command = non_empty(flat.command).map(str::to_string);
    entry.path = non_empty(flat.path).map(str::to_string);
    entry.metadata = flat.metadata.merge();
    entry
}

fn unclassified_entry(event: &UnclassifiedEvent<'_>) -> TimelineEntry {
    let title = non_empty(event.message).unwrap_or(UNKNOWN_TITLE);
    let mut entry = TimelineEntry::new(EntryType::Message, timestamp_or_now(event.timestamp), title)
        .with_actor(ActorType::from_source(event.source));
    entry.content = event.content.map(str::to_string);
    entry
}

/// An explicit `success: false` turns an observation into an error.
fn outcome_type(observation: &ObservationEvent<'_>, otherwise: EntryType) -> EntryType {
    if observation.success == Some(false) {
        EntryType::Error
    } else {
        otherwise
    }
}

pub(crate) fn timestamp_or_now(timestamp: Option<&str>) -> String {
    match non_empty(timestamp) {
        Some(ts) => ts.to_string(),
        None => now_timestamp(),
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
