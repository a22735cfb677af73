//! Presentation category for a timeline entry: title, icon, actor label and color.

use serde::Serialize;

use crate::timeline::{ActorType, EntryType, TimelineEntry};

const UNKNOWN_STEP: &str = "Unknown Step";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconKind {
    Message,
    Thought,
    Terminal,
    Edit,
    Search,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepColor {
    Blue,
    Purple,
    Gray,
    Indigo,
    Green,
    Emerald,
    Yellow,
    Amber,
    Teal,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    pub title: String,
    pub icon: IconKind,
    pub actor_label: String,
    pub color: StepColor,
}

/// Derive the display category of an entry. Pure: same entry, same answer.
pub fn classify(entry: &TimelineEntry) -> StepInfo {
    let title = if entry.title.is_empty() { UNKNOWN_STEP } else { entry.title.as_str() };
    let observed = entry.title.to_lowercase().contains("observation");

    let (icon, actor_label, color) = match entry.entry_type {
        EntryType::Message if entry.thought.as_deref().is_some_and(|t| !t.is_empty()) => {
            return StepInfo {
                title: "Thought".to_string(),
                icon: IconKind::Thought,
                actor_label: entry.actor_type.label().to_string(),
                color: StepColor::Indigo,
            };
        }
        EntryType::Message => {
            let color = match entry.actor_type {
                ActorType::User => StepColor::Purple,
                ActorType::Assistant => StepColor::Blue,
                ActorType::System => StepColor::Gray,
            };
            (IconKind::Message, entry.actor_type.label(), color)
        }
        EntryType::Command => {
            (IconKind::Terminal, "Command", if observed { StepColor::Emerald } else { StepColor::Green })
        }
        EntryType::Edit => {
            (IconKind::Edit, "Edit", if observed { StepColor::Amber } else { StepColor::Yellow })
        }
        EntryType::Search => {
            (IconKind::Search, "Search", if observed { StepColor::Teal } else { StepColor::Gray })
        }
        EntryType::Error => (IconKind::Alert, "Error", StepColor::Red),
    };

    StepInfo {
        title: title.to_string(),
        icon,
        actor_label: actor_label.to_string(),
        color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(entry_type: EntryType, title: &str) -> TimelineEntry {
        TimelineEntry::new(entry_type, "2025-03-07T10:05:27Z".to_string(), title)
    }

    #[test]
    fn test_message_colors_follow_actor() {
        let user = classify(&entry(EntryType::Message, "hi").with_actor(ActorType::User));
        assert_eq!((user.icon, user.color), (IconKind::Message, StepColor::Purple));
        assert_eq!(user.actor_label, "User");

        let assistant = classify(&entry(EntryType::Message, "hi"));
        assert_eq!(assistant.color, StepColor::Blue);
        assert_eq!(assistant.actor_label, "Assistant");

        let system = classify(&entry(EntryType::Message, "hi").with_actor(ActorType::System));
        assert_eq!(system.color, StepColor::Gray);
    }

    #[test]
    fn test_thought_message() {
        let mut thinking = entry(EntryType::Message, "Planning");
        thinking.thought = Some("first look at the tests".to_string());
        let info = classify(&thinking);
        assert_eq!(info.title, "Thought");
        assert_eq!(info.icon, IconKind::Thought);
        assert_eq!(info.color, StepColor::Indigo);
        assert_eq!(info.actor_label, "Assistant");

        thinking.thought = Some(String::new());
        assert_eq!(classify(&thinking).icon, IconKind::Message);
    }

    #[test]
    fn test_tool_types() {
        let command = classify(&entry(EntryType::Command, "Running ls"));
        assert_eq!(
            (command.icon, command.actor_label.as_str(), command.color),
            (IconKind::Terminal, "Command", StepColor::Green)
        );

        let output = classify(&entry(EntryType::Command, "Command Observation"));
        assert_eq!(output.color, StepColor::Emerald);

        assert_eq!(classify(&entry(EntryType::Edit, "edit")).color, StepColor::Yellow);
        assert_eq!(classify(&entry(EntryType::Edit, "edit observation")).color, StepColor::Amber);
        assert_eq!(classify(&entry(EntryType::Search, "read")).color, StepColor::Gray);
        assert_eq!(classify(&entry(EntryType::Search, "OBSERVATION")).color, StepColor::Teal);

        let error = classify(&entry(EntryType::Error, "boom"));
        assert_eq!(
            (error.icon, error.actor_label.as_str(), error.color),
            (IconKind::Alert, "Error", StepColor::Red)
        );
    }

    #[test]
    fn test_empty_title() {
        assert_eq!(classify(&entry(EntryType::Command, "")).title, UNKNOWN_STEP);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let e = entry(EntryType::Edit, "Editing file").with_content("diff");
        assert_eq!(classify(&e), classify(&e));
    }

    #[test]
    fn test_serializes_lowercase() {
        let info = classify(&entry(EntryType::Error, "x"));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["icon"], "alert");
        assert_eq!(json["color"], "red");
        assert_eq!(json["actorLabel"], "Error");
    }
}
