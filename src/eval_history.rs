//! OpenHands evaluation history items, as stored in JSONL output.
//!
//! Each `history` element is recognized by its discriminator (`action` or
//! `observation`), its name and its `source`, checked against
//! [`ITEM_KINDS`] in order. Recognized items get a dedicated mapping (the
//! command text of `run`, the code of `run_ipython`, `cat <path>` for
//! `read`, ...). Anything else goes through the generic history mapping in
//! the normalizer. Agent state toggles and `null` observations are hidden.

use serde_json::Value;

use crate::normalizer::{non_empty, normalize_history_entry, timestamp_or_now};
use crate::timeline::{ActorType, EntryType, TimelineEntry};
use crate::trajectory::{object_field, str_field, MetadataSources, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discriminator {
    Action,
    Observation,
}

/// Which `source` values a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceRule {
    Agent,
    AgentOrEnvironment,
    /// `user`, or no string `source` at all
    UserOrAbsent,
    Any,
}

impl SourceRule {
    fn matches(self, source: Option<&str>) -> bool {
        match self {
            SourceRule::Agent => source == Some("agent"),
            SourceRule::AgentOrEnvironment => matches!(source, Some("agent") | Some("environment")),
            SourceRule::UserOrAbsent => matches!(source, None | Some("user")),
            SourceRule::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    AgentStateChange,
    UserMessage,
    AssistantMessage,
    CommandAction,
    CommandObservation,
    IPythonAction,
    IPythonObservation,
    FinishAction,
    ErrorObservation,
    ReadAction,
    ReadObservation,
    EditAction,
    EditObservation,
    ThinkAction,
    ThinkObservation,
    Config,
}

impl ItemKind {
    fn title(self) -> &'static str {
        match self {
            ItemKind::AgentStateChange => "Agent State Changed",
            ItemKind::UserMessage => "User Message",
            ItemKind::AssistantMessage => "Assistant Message",
            ItemKind::CommandAction => "Run Command",
            ItemKind::CommandObservation => "Command Observation",
            ItemKind::IPythonAction => "Run IPython",
            ItemKind::IPythonObservation => "IPython Observation",
            ItemKind::FinishAction => "Finish",
            ItemKind::ErrorObservation => "Error Observation",
            ItemKind::ReadAction => "Read File",
            ItemKind::ReadObservation => "Read Observation",
            ItemKind::EditAction => "Edit File",
            ItemKind::EditObservation => "Edit Observation",
            ItemKind::ThinkAction => "Think",
            ItemKind::ThinkObservation => "Think Observation",
            ItemKind::Config => "Agent Configuration",
        }
    }

    fn entry_type(self) -> EntryType {
        match self {
            ItemKind::CommandAction
            | ItemKind::CommandObservation
            | ItemKind::IPythonAction
            | ItemKind::IPythonObservation
            | ItemKind::ReadAction
            | ItemKind::ReadObservation => EntryType::Command,
            ItemKind::EditAction | ItemKind::EditObservation => EntryType::Edit,
            ItemKind::ErrorObservation => EntryType::Error,
            _ => EntryType::Message,
        }
    }

    fn actor(self) -> ActorType {
        match self {
            ItemKind::UserMessage => ActorType::User,
            ItemKind::AssistantMessage
            | ItemKind::CommandAction
            | ItemKind::IPythonAction
            | ItemKind::FinishAction
            | ItemKind::ReadAction
            | ItemKind::EditAction
            | ItemKind::ThinkAction => ActorType::Assistant,
            _ => ActorType::System,
        }
    }
}

/// Recognition rules, first match wins.
const ITEM_KINDS: &[(Discriminator, &str, SourceRule, ItemKind)] = &[
    (Discriminator::Observation, "agent_state_changed", SourceRule::AgentOrEnvironment, ItemKind::AgentStateChange),
    (Discriminator::Action, "message", SourceRule::UserOrAbsent, ItemKind::UserMessage),
    (Discriminator::Action, "message", SourceRule::Agent, ItemKind::AssistantMessage),
    (Discriminator::Action, "run", SourceRule::Agent, ItemKind::CommandAction),
    (Discriminator::Observation, "run", SourceRule::Agent, ItemKind::CommandObservation),
    (Discriminator::Action, "run_ipython", SourceRule::Agent, ItemKind::IPythonAction),
    (Discriminator::Observation, "run_ipython", SourceRule::Agent, ItemKind::IPythonObservation),
    (Discriminator::Action, "finish", SourceRule::Agent, ItemKind::FinishAction),
    (Discriminator::Observation, "error", SourceRule::Agent, ItemKind::ErrorObservation),
    (Discriminator::Action, "read", SourceRule::Agent, ItemKind::ReadAction),
    (Discriminator::Observation, "read", SourceRule::Agent, ItemKind::ReadObservation),
    (Discriminator::Action, "edit", SourceRule::Agent, ItemKind::EditAction),
    (Discriminator::Observation, "edit", SourceRule::Agent, ItemKind::EditObservation),
    (Discriminator::Action, "think", SourceRule::Agent, ItemKind::ThinkAction),
    (Discriminator::Observation, "think", SourceRule::Agent, ItemKind::ThinkObservation),
    (Discriminator::Action, "initialize", SourceRule::Any, ItemKind::Config),
];

/// Items never shown in the timeline.
const HIDDEN_ITEMS: &[(Discriminator, &str)] = &[
    (Discriminator::Action, "change_agent_state"),
    (Discriminator::Observation, "null"),
];

fn discriminator(obj: &Object, which: Discriminator) -> Option<&str> {
    let key = match which {
        Discriminator::Action => "action",
        Discriminator::Observation => "observation",
    };
    str_field(obj, key)
}

pub fn is_hidden(item: &Value) -> bool {
    let Some(obj) = item.as_object() else {
        return false;
    };
    HIDDEN_ITEMS
        .iter()
        .any(|&(which, name)| discriminator(obj, which) == Some(name))
}

pub fn item_kind(item: &Value) -> Option<ItemKind> {
    let obj = item.as_object()?;
    let source = str_field(obj, "source");
    ITEM_KINDS
        .iter()
        .find(|&&(which, name, rule, _)| discriminator(obj, which) == Some(name) && rule.matches(source))
        .map(|&(_, _, _, kind)| kind)
}

/// Convert a whole history, dropping hidden items.
pub fn convert_history(history: &[Value]) -> Vec<TimelineEntry> {
    history
        .iter()
        .filter(|item| !is_hidden(item))
        .map(convert_item)
        .collect()
}

/// Convert one history item; unrecognized items use the generic mapping.
pub fn convert_item(item: &Value) -> TimelineEntry {
    match (item.as_object(), item_kind(item)) {
        (Some(obj), Some(kind)) => kind_entry(kind, obj),
        _ => normalize_history_entry(item),
    }
}

fn kind_entry(kind: ItemKind, obj: &Object) -> TimelineEntry {
    let args = object_field(obj, "args");
    let extras = object_field(obj, "extras");
    let arg = |key| non_empty(args.and_then(|a| str_field(a, key))).map(str::to_string);
    let extra = |key| non_empty(extras.and_then(|e| str_field(e, key))).map(str::to_string);
    let content = str_field(obj, "content").map(str::to_string);

    let mut entry = TimelineEntry::new(
        kind.entry_type(),
        timestamp_or_now(str_field(obj, "timestamp")),
        kind.title(),
    )
    .with_actor(kind.actor());
    entry.metadata = MetadataSources::from_object(obj).merge();

    match kind {
        ItemKind::UserMessage | ItemKind::AssistantMessage => {
            let text = non_empty(str_field(obj, "content"))
                .or_else(|| args.and_then(|a| str_field(a, "content")))
                .unwrap_or("");
            entry.content = Some(text.to_string());
        }
        ItemKind::CommandAction => {
            entry.command = arg("command");
            entry.thought = arg("thought");
        }
        ItemKind::IPythonAction => {
            entry.command = arg("code");
            entry.thought = arg("thought");
        }
        ItemKind::ReadAction => {
            entry.path = arg("path");
            entry.command = entry.path.as_ref().map(|path| format!("cat {}", path));
            entry.thought = arg("thought");
        }
        ItemKind::EditAction => {
            entry.path = arg("path");
            entry.thought = arg("thought");
        }
        ItemKind::ReadObservation | ItemKind::EditObservation => {
            entry.content = content;
            entry.path = extra("path");
        }
        ItemKind::CommandObservation
        | ItemKind::IPythonObservation
        | ItemKind::ErrorObservation
        | ItemKind::ThinkObservation => entry.content = content,
        ItemKind::FinishAction => entry.content = arg("thought"),
        ItemKind::ThinkAction => entry.thought = arg("thought"),
        ItemKind::AgentStateChange => entry.content = extra("agent_state"),
        ItemKind::Config => {
            entry.content = args.and_then(|a| serde_json::to_string_pretty(a).ok());
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Trimmed from a SWE-bench run of the CodeAct agent.
    fn eval_history() -> Value {
        json!([
            {"id": 0, "timestamp": "2025-01-20T10:00:00", "source": "agent", "action": "initialize",
             "message": "Initializing agent", "args": {"agent_class": "CodeActAgent", "max_iterations": 100}},
            {"id": 1, "timestamp": "2025-01-20T10:00:01", "source": "user", "action": "message",
             "message": "Fix the bug", "args": {"content": "Fix the bug in utils.py", "image_urls": null}},
            {"id": 2, "timestamp": "2025-01-20T10:00:02", "source": "agent", "action": "change_agent_state",
             "args": {"agent_state": "running"}},
            {"id": 3, "timestamp": "2025-01-20T10:00:03", "source": "environment", "observation": "null",
             "content": "", "extras": {}},
            {"id": 4, "timestamp": "2025-01-20T10:00:04", "source": "agent", "action": "run",
             "message": "Running command: ls -la", "args": {"command": "ls -la", "thought": "Look around first"}},
            {"id": 5, "timestamp": "2025-01-20T10:00:05", "source": "agent", "observation": "run", "cause": 4,
             "content": "total 8\nutils.py", "extras": {"command": "ls -la", "exit_code": 0}},
            {"id": 6, "timestamp": "2025-01-20T10:00:06", "source": "agent", "action": "run_ipython",
             "args": {"code": "print(open('utils.py').read())", "thought": ""}},
            {"id": 7, "timestamp": "2025-01-20T10:00:07", "source": "agent", "action": "read",
             "args": {"path": "/workspace/utils.py", "thought": "Check the helper"}},
            {"id": 8, "timestamp": "2025-01-20T10:00:08", "source": "agent", "observation": "read", "cause": 7,
             "content": "def helper(): pass", "extras": {"path": "/workspace/utils.py"}},
            {"id": 9, "timestamp": "2025-01-20T10:00:09", "source": "agent", "action": "edit",
             "args": {"path": "/workspace/utils.py", "content": "def helper(): return 1"}},
            {"id": 10, "timestamp": "2025-01-20T10:00:10", "source": "agent", "observation": "error", "cause": 9,
             "content": "Permission denied", "extras": {}},
            {"id": 11, "timestamp": "2025-01-20T10:00:11", "source": "agent", "action": "think",
             "args": {"thought": "Maybe the file is read-only"}},
            {"id": 12, "timestamp": "2025-01-20T10:00:12", "source": "agent", "action": "finish",
             "args": {"thought": "done", "outputs": {}}},
            {"id": 13, "timestamp": "2025-01-20T10:00:13", "source": "environment",
             "observation": "agent_state_changed", "content": "", "extras": {"agent_state": "finished"}}
        ])
    }

    fn convert(history: &Value) -> Vec<TimelineEntry> {
        convert_history(history.as_array().unwrap())
    }

    #[test]
    fn test_noise_items_are_hidden() {
        let entries = convert(&eval_history());
        assert_eq!(entries.len(), 12);
        assert!(entries.iter().all(|e| e.title != "change_agent_state" && e.title != "null"));
    }

    #[test]
    fn test_commands_keep_their_text() {
        let entries = convert(&eval_history());

        let run = &entries[2];
        assert_eq!(run.entry_type, EntryType::Command);
        assert_eq!(run.command.as_deref(), Some("ls -la"));
        assert_eq!(run.thought.as_deref(), Some("Look around first"));
        assert_eq!(run.actor_type, ActorType::Assistant);

        let output = &entries[3];
        assert_eq!(output.entry_type, EntryType::Command);
        assert_eq!(output.content.as_deref(), Some("total 8\nutils.py"));
        assert_eq!(output.metadata["exit_code"], 0);
        assert_eq!(output.actor_type, ActorType::System);

        let ipython = &entries[4];
        assert_eq!(ipython.command.as_deref(), Some("print(open('utils.py').read())"));
        assert_eq!(ipython.thought, None);
    }

    #[test]
    fn test_read_and_edit_paths() {
        let entries = convert(&eval_history());

        let read = &entries[5];
        assert_eq!(read.entry_type, EntryType::Command);
        assert_eq!(read.command.as_deref(), Some("cat /workspace/utils.py"));
        assert_eq!(read.path.as_deref(), Some("/workspace/utils.py"));

        let read_output = &entries[6];
        assert_eq!(read_output.path.as_deref(), Some("/workspace/utils.py"));
        assert_eq!(read_output.content.as_deref(), Some("def helper(): pass"));

        let edit = &entries[7];
        assert_eq!(edit.entry_type, EntryType::Edit);
        assert_eq!(edit.path.as_deref(), Some("/workspace/utils.py"));
    }

    #[test]
    fn test_messages_finish_and_errors() {
        let entries = convert(&eval_history());

        assert_eq!(entries[0].title, "Agent Configuration");
        assert!(entries[0].content.as_deref().unwrap().contains("CodeActAgent"));

        let user = &entries[1];
        assert_eq!(user.entry_type, EntryType::Message);
        assert_eq!(user.actor_type, ActorType::User);
        assert_eq!(user.content.as_deref(), Some("Fix the bug in utils.py"));

        assert_eq!(entries[8].entry_type, EntryType::Error);
        assert_eq!(entries[8].content.as_deref(), Some("Permission denied"));

        assert_eq!(entries[9].thought.as_deref(), Some("Maybe the file is read-only"));

        let finish = &entries[10];
        assert_eq!(finish.entry_type, EntryType::Message);
        assert_eq!(finish.content.as_deref(), Some("done"));
        assert_eq!(finish.actor_type, ActorType::Assistant);

        assert_eq!(entries[11].title, "Agent State Changed");
        assert_eq!(entries[11].content.as_deref(), Some("finished"));
    }

    #[test]
    fn test_source_decides_message_kind() {
        assert_eq!(item_kind(&json!({"action": "message"})), Some(ItemKind::UserMessage));
        assert_eq!(item_kind(&json!({"action": "message", "source": "agent"})), Some(ItemKind::AssistantMessage));
        assert_eq!(item_kind(&json!({"action": "run", "source": "user"})), None);
        assert_eq!(
            item_kind(&json!({"observation": "agent_state_changed", "source": "agent"})),
            Some(ItemKind::AgentStateChange)
        );
    }

    #[test]
    fn test_unrecognized_items_use_generic_mapping() {
        let entry = convert_item(&json!({"action": "execute_bash", "source": "agent", "args": {"command": "make"}}));
        assert_eq!(entry.entry_type, EntryType::Command);
        assert_eq!(entry.command.as_deref(), Some("make"));

        let flat = convert_item(&json!({"type": "edit", "content": "x", "actorType": "Assistant"}));
        assert_eq!(flat.entry_type, EntryType::Edit);
    }
}
