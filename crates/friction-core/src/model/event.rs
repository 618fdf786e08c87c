use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;

/// One line of a session log, reduced to the parts friction analysis reads.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub timestamp: Option<String>,
    pub git_branch: Option<String>,
    pub cwd: Option<String>,
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    User(MessageContent),
    Assistant(MessageContent),
    Summary(String),
    /// A progress record. Carries content only when it wraps a user message.
    Progress(Option<MessageContent>),
    Other,
}

/// Message content is either a plain string, a list of typed blocks, or a
/// single legacy block object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Block(ContentBlock),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::Blocks(items.into_iter().map(ContentBlock::from).collect()),
            Value::Object(_) => match serde_json::from_value::<ContentBlock>(value.clone()) {
                Ok(ContentBlock::Other) | Err(_) => Self::Other(value),
                Ok(block) => Self::Block(block),
            },
            other => Self::Other(other),
        }
    }
}

impl MessageContent {
    /// Iterate the blocks of list content, or the single legacy block.
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Blocks(blocks) => blocks,
            Self::Block(block) => std::slice::from_ref(block),
            Self::Text(_) | Self::Other(_) => &[],
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// The plain string, or the first text block of list content.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Blocks(blocks) => blocks.iter().find_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

impl From<Value> for ContentBlock {
    fn from(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(Self::Other)
    }
}

impl ContentBlock {
    /// Flattened text of a tool result. Arrays of text parts are joined by
    /// newlines.
    pub fn tool_result_text(&self) -> Option<String> {
        let Self::ToolResult { content, .. } = self else {
            return None;
        };
        Some(value_text(content))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

impl SessionEvent {
    /// The event timestamp, or an empty string when absent.
    pub fn ts(&self) -> &str {
        self.timestamp.as_deref().unwrap_or("")
    }

    /// Content scanned for user-side signals: user turns and progress
    /// records that wrap a user message.
    pub fn user_content(&self) -> Option<&MessageContent> {
        match &self.body {
            EventBody::User(content) => Some(content),
            EventBody::Progress(content) => content.as_ref(),
            _ => None,
        }
    }

    /// User or assistant turn content.
    pub fn turn_content(&self) -> Option<&MessageContent> {
        match &self.body {
            EventBody::User(content) | EventBody::Assistant(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.body, EventBody::User(_))
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default, rename = "type")]
    event_type: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, rename = "gitBranch")]
    git_branch: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    data: Option<RawProgress>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: MessageContent,
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    #[serde(default)]
    message: Option<RawProgressMessage>,
}

#[derive(Debug, Deserialize)]
struct RawProgressMessage {
    #[serde(default, rename = "type")]
    message_type: String,
    #[serde(default)]
    message: Option<RawMessage>,
}

impl From<RawEvent> for SessionEvent {
    fn from(raw: RawEvent) -> Self {
        let content = || raw.message.map(|m| m.content).unwrap_or_default();
        let body = match raw.event_type.as_str() {
            "user" => EventBody::User(content()),
            "assistant" => EventBody::Assistant(content()),
            "summary" => EventBody::Summary(raw.summary.unwrap_or_default()),
            "progress" => EventBody::Progress(
                raw.data
                    .and_then(|d| d.message)
                    .filter(|m| m.message_type == "user")
                    .map(|m| m.message.map(|inner| inner.content).unwrap_or_default()),
            ),
            _ => EventBody::Other,
        };
        Self {
            timestamp: raw.timestamp,
            git_branch: raw.git_branch,
            cwd: raw.cwd,
            body,
        }
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if ts.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a newline-delimited session log. Blank lines are skipped; any other
/// line that is not a JSON object fails the whole session.
pub fn parse_events(text: &str) -> Result<Vec<SessionEvent>, CoreError> {
    let mut events = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawEvent =
            serde_json::from_str(line).map_err(|source| CoreError::Line { line: idx + 1, source })?;
        events.push(raw.into());
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_block_content() {
        let text = r#"{"type":"user","timestamp":"2026-01-15T10:00:00Z","gitBranch":"main","message":{"content":"fix bug"}}
{"type":"assistant","timestamp":"2026-01-15T10:00:05Z","message":{"content":[{"type":"text","text":"Running"},{"type":"tool_use","name":"Bash","input":{"command":"pytest"}}]}}
"#;
        let events = parse_events(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].git_branch.as_deref(), Some("main"));
        assert_eq!(
            events[0].user_content().and_then(MessageContent::as_text),
            Some("fix bug")
        );
        let EventBody::Assistant(content) = &events[1].body else {
            panic!("expected assistant");
        };
        assert_eq!(content.blocks().len(), 2);
        assert!(matches!(
            &content.blocks()[1],
            ContentBlock::ToolUse { name: Some(n), .. } if n == "Bash"
        ));
    }

    #[test]
    fn test_legacy_single_tool_result() {
        let text = r#"{"type":"user","message":{"content":{"type":"tool_result","content":"Exit code 1"}}}"#;
        let events = parse_events(text).unwrap();
        let content = events[0].user_content().unwrap();
        assert!(matches!(content, MessageContent::Block(_)));
        assert_eq!(
            content.blocks()[0].tool_result_text().as_deref(),
            Some("Exit code 1")
        );
    }

    #[test]
    fn test_unknown_blocks_survive() {
        let text = r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hm"},"stray",{"type":"text","text":"ok"}]}}"#;
        let events = parse_events(text).unwrap();
        let EventBody::Assistant(content) = &events[0].body else {
            panic!("expected assistant");
        };
        assert_eq!(content.blocks()[0], ContentBlock::Other);
        assert_eq!(content.blocks()[1], ContentBlock::Other);
        assert_eq!(content.first_text(), Some("ok"));
    }

    #[test]
    fn test_progress_only_wraps_user_messages() {
        let text = r#"{"type":"progress","data":{"message":{"type":"user","message":{"content":"/stash"}}}}
{"type":"progress","data":{"message":{"type":"assistant","message":{"content":"hi"}}}}
"#;
        let events = parse_events(text).unwrap();
        assert_eq!(
            events[0].user_content().and_then(MessageContent::as_text),
            Some("/stash")
        );
        assert!(events[1].user_content().is_none());
    }

    #[test]
    fn test_tool_result_array_flattened() {
        let block = ContentBlock::from(serde_json::json!({
            "type": "tool_result",
            "content": [{"type": "text", "text": "line one"}, {"type": "text", "text": "Exit code 2"}]
        }));
        assert_eq!(
            block.tool_result_text().as_deref(),
            Some("line one\nExit code 2")
        );
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let z = parse_timestamp("2026-01-15T10:00:45.123Z").unwrap();
        let offset = parse_timestamp("2026-01-15T12:00:45.123+02:00").unwrap();
        assert_eq!(z, offset);
        assert!(parse_timestamp("2026-01-15T10:00:00").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_bad_line_reports_position() {
        let text = "{\"type\":\"user\"}\n\nnot json\n";
        let err = parse_events(text).unwrap_err();
        assert!(matches!(err, CoreError::Line { line: 3, .. }));
    }
}
