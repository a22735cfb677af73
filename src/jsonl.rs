//! JSONL evaluation files: one trajectory record per line.
//!
//! Each line is expected to be an object with a `history` array next to
//! arbitrary fields (`instance_id`, `metrics.accumulated_cost`,
//! `test_result.report.resolved`, ...). Bad lines never abort the batch;
//! they come back as [`JsonlRecord::Malformed`] or
//! [`JsonlRecord::MissingHistory`] and the caller decides what to show.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::eval_history::convert_history;
use crate::object_path::{display_label, format_for_display, resolve, truncate_chars};
use crate::timeline::{now_timestamp, ActorType, EntryType, TimelineEntry};

/// Characters of free text shown in a sidebar summary.
const SUMMARY_CHARS: usize = 30;

/// Root-locale collation for string sort keys.
static COLLATOR: LazyLock<Option<CollatorBorrowed<'static>>> = LazyLock::new(|| {
    match Collator::try_new(Default::default(), CollatorOptions::default()) {
        Ok(collator) => Some(collator),
        Err(e) => {
            warn!("Collator unavailable, falling back to case-folded ordering: {}", e);
            None
        }
    }
});

/// One non-blank line of a JSONL file.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonlRecord {
    /// Parsed, with a `history` array
    Trajectory { line: usize, data: Value },
    /// Parsed, but `history` is missing or not an array
    MissingHistory { line: usize, data: Value },
    /// Not valid JSON. Viewed as `{ "history": [], "error": ... }`, so
    /// `len(history)` is 0 and the timeline is empty.
    Malformed { line: usize, reason: String },
}

impl JsonlRecord {
    /// 1-based position among the non-blank lines of the file.
    pub fn line(&self) -> usize {
        match self {
            JsonlRecord::Trajectory { line, .. }
            | JsonlRecord::MissingHistory { line, .. }
            | JsonlRecord::Malformed { line, .. } => *line,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            JsonlRecord::Trajectory { data, .. } | JsonlRecord::MissingHistory { data, .. } => {
                Some(data)
            }
            JsonlRecord::Malformed { .. } => None,
        }
    }

    pub fn history(&self) -> Option<&[Value]> {
        match self {
            JsonlRecord::Trajectory { data, .. } => {
                data.get("history").and_then(Value::as_array).map(Vec::as_slice)
            }
            JsonlRecord::Malformed { .. } => Some(&[][..]),
            JsonlRecord::MissingHistory { .. } => None,
        }
    }

    pub fn warning(&self) -> Option<String> {
        match self {
            JsonlRecord::MissingHistory { line, .. } => {
                Some(format!("Line {} does not have a valid history array", line))
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            JsonlRecord::Malformed { line, .. } => Some(format!("Failed to parse line {}", line)),
            _ => None,
        }
    }

    /// The value field paths resolve against.
    fn root(&self) -> Cow<'_, Value> {
        match self.data() {
            Some(data) => Cow::Borrowed(data),
            None => Cow::Owned(self.to_json()),
        }
    }

    /// Resolve a field path; a missing field and `null` both come back as `None`.
    pub fn sort_key(&self, field: &str) -> Option<Value> {
        let root = self.root();
        resolve(&root, field)
            .map(Cow::into_owned)
            .filter(|value| !value.is_null())
    }

    /// The record as the viewer shows it, with its warning or error marker inline.
    pub fn to_json(&self) -> Value {
        match self {
            JsonlRecord::Trajectory { data, .. } => data.clone(),
            JsonlRecord::MissingHistory { data, .. } => {
                let mut obj = data.as_object().cloned().unwrap_or_default();
                obj.insert("_warning".to_string(), json!(self.warning()));
                Value::Object(obj)
            }
            JsonlRecord::Malformed { .. } => json!({ "history": [], "error": self.error() }),
        }
    }

    /// [`to_json`](Self::to_json) without the bulky `history` field, for a details pane.
    pub fn without_history(&self) -> Value {
        let mut value = self.to_json();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("history");
        }
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A sort field offered by the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortFieldOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub const COMMON_SORT_FIELDS: &[SortFieldOption] = &[
    SortFieldOption { value: "instance_id", label: "Instance ID" },
    SortFieldOption { value: "metrics.accumulated_cost", label: "Cost (metrics.accumulated_cost)" },
    SortFieldOption {
        value: "test_result.report.resolved",
        label: "Resolved Status (test_result.report.resolved)",
    },
    SortFieldOption { value: "len(history)", label: "History Length (len(history))" },
];

pub const COMMON_DISPLAY_FIELDS: &[&str] =
    &["metrics.accumulated_cost", "test_result.report.resolved", "len(history)"];

/// Sidebar configuration for a JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerSettings {
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub display_fields: Vec<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            sort_field: "instance_id".to_string(),
            sort_direction: SortDirection::Asc,
            display_fields: COMMON_DISPLAY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// One display field of a record, resolved and formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub label: String,
    pub value: String,
}

/// Split JSONL text into records. Blank lines are skipped and not counted.
pub fn parse_records(text: &str) -> Vec<JsonlRecord> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

fn parse_line(line: usize, text: &str) -> JsonlRecord {
    match serde_json::from_str::<Value>(text) {
        Ok(data) if data.get("history").is_some_and(Value::is_array) => {
            JsonlRecord::Trajectory { line, data }
        }
        Ok(data) => {
            debug!("JSONL line {} has no history array", line);
            JsonlRecord::MissingHistory { line, data }
        }
        Err(e) => {
            warn!("Failed to parse JSONL line {}: {}", line, e);
            JsonlRecord::Malformed { line, reason: e.to_string() }
        }
    }
}

/// Parse and sort in one go, as the sidebar does on load.
pub fn load_records(text: &str, settings: &ViewerSettings) -> Vec<JsonlRecord> {
    sort_records(parse_records(text), &settings.sort_field, settings.sort_direction)
}

/// Stable sort by a resolved field path. Nulls always go last.
pub fn sort_records(
    records: Vec<JsonlRecord>,
    field: &str,
    direction: SortDirection,
) -> Vec<JsonlRecord> {
    let mut keyed: Vec<(Option<Value>, JsonlRecord)> = records
        .into_iter()
        .map(|record| (record.sort_key(field), record))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_keys(a.as_ref(), b.as_ref(), direction));
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Compare two resolved sort keys (`None` is null).
///
/// Numbers compare numerically, strings with a locale-style ordering, and
/// anything else through its string coercion. `Desc` flips all three.
pub fn compare_keys(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };

    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => locale_compare(x, y),
        _ => locale_compare(&coerce_to_string(a), &coerce_to_string(b)),
    };

    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Unicode collation: accents and case only break ties, lowercase first.
fn locale_compare(a: &str, b: &str) -> Ordering {
    match COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => fold_compare(a, b),
    }
}

fn fold_compare(a: &str, b: &str) -> Ordering {
    let folded_a = a.chars().flat_map(char::to_lowercase);
    let folded_b = b.chars().flat_map(char::to_lowercase);
    folded_a.cmp(folded_b).then_with(|| b.cmp(a))
}

/// Loose string coercion: arrays join with commas, objects are opaque.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !(n.is_i64() || n.is_u64()) && f.fract() == 0.0 && f.is_finite() => {
                format!("{:.0}", f)
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_to_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// A top-level field of the record, if present and truthy.
fn truthy_field<'a>(record: &'a JsonlRecord, key: &str) -> Option<&'a Value> {
    record.data()?.get(key).filter(|value| is_truthy(value))
}

/// Convert one record's history into timeline entries.
///
/// A record without a history array becomes a single error entry so the
/// rest of the file still renders. Conversion itself is per item and cannot
/// fail; items nothing recognizes still become messages.
pub fn timeline_for_record(record: &JsonlRecord) -> Vec<TimelineEntry> {
    match record.history() {
        Some(history) => convert_history(history),
        None => {
            debug!("Line {} has no history to convert", record.line());
            vec![record_error(
                "Invalid History Format",
                "The history field is missing or not an array".to_string(),
            )]
        }
    }
}

fn record_error(title: &str, content: String) -> TimelineEntry {
    TimelineEntry::new(EntryType::Error, now_timestamp(), title)
        .with_actor(ActorType::System)
        .with_content(content)
}

/// Resolve and format each display field for the sidebar.
pub fn summarize(record: &JsonlRecord, display_fields: &[String]) -> Vec<FieldSummary> {
    display_fields
        .iter()
        .map(|field| {
            let root = record.root();
            let value = resolve(&root, field);
            FieldSummary {
                field: field.clone(),
                label: display_label(field),
                value: format_for_display(value.as_deref()),
            }
        })
        .collect()
}

/// Sidebar name: instance id, then record id, then position.
pub fn display_name(record: &JsonlRecord, index: usize) -> String {
    if let Some(instance_id) = truthy_field(record, "instance_id") {
        return format!("Instance #{}", coerce_to_string(instance_id));
    }
    if let Some(id) = truthy_field(record, "id") {
        return format!("Entry #{}", coerce_to_string(id));
    }
    format!("Entry {}", index + 1)
}

/// Free-text summary used when no display fields are configured.
pub fn fallback_summary(record: &JsonlRecord) -> String {
    for key in ["task", "query", "prompt"] {
        if let Some(value) = truthy_field(record, key) {
            return truncate_chars(&coerce_to_string(value), SUMMARY_CHARS);
        }
    }

    let first_user_content = record
        .data()
        .and_then(|data| data.get("history"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .find(|item| is_user_item(item) && item.get("content").is_some_and(is_truthy))
        .and_then(|item| item.get("content"));

    match first_user_content {
        Some(content) => truncate_chars(&coerce_to_string(content), SUMMARY_CHARS),
        None => "No summary available".to_string(),
    }
}

fn is_user_item(item: &Map<String, Value>) -> bool {
    item.get("actorType").and_then(Value::as_str) == Some("User")
        || item.get("source").and_then(Value::as_str) == Some("user")
}
