//! Chat message domain types.
//!
//! Messages are immutable once stored. History is read newest-first using a
//! timestamp cursor: each page reports the timestamp of its last message as
//! the `next_offset`, or the end-of-results sentinel when the page was short.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Sender name used for messages generated by the server itself.
pub const SYSTEM_SENDER: &str = "system";

/// Kind of a chat message; determines the shape of `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Call,
    Location,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Call => "call",
            MessageType::Location => "location",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "call" => Ok(MessageType::Call),
            "location" => Ok(MessageType::Location),
            other => Err(format!("unknown message type: '{other}'")),
        }
    }
}

/// A persisted chat or system message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Meeting the message belongs to.
    pub room_id: String,
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub is_system_message: bool,
}

impl Message {
    /// Build a user message stamped with the current time.
    ///
    /// Timestamps carry microsecond precision, matching what storage keeps.
    pub fn new(
        room_id: impl Into<String>,
        sender: impl Into<String>,
        kind: MessageType,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            room_id: room_id.into(),
            sender: sender.into(),
            kind,
            data,
            timestamp: Utc::now().trunc_subsecs(6),
            is_system_message: false,
        }
    }

    /// Build a system message (`sender = "system"`, text kind).
    pub fn system(room_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            is_system_message: true,
            ..Self::new(room_id, SYSTEM_SENDER, MessageType::Text, data)
        }
    }
}

/// Whether a payload counts as empty (`null`, `""`, `[]` or `{}`).
pub fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Format a timestamp the way cursors and storage expect it.
///
/// Fixed-width RFC 3339 with microseconds and a `Z` suffix, so lexicographic
/// order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Continuation point returned with a page of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// More messages likely exist strictly older than this timestamp.
    After(DateTime<Utc>),
    /// No further pages.
    End,
}

impl PageCursor {
    /// Wire value of the end-of-results sentinel.
    pub const END_SENTINEL: i64 = -1;

    pub fn is_end(&self) -> bool {
        matches!(self, PageCursor::End)
    }
}

impl Serialize for PageCursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageCursor::After(ts) => serializer.serialize_str(&format_timestamp(ts)),
            PageCursor::End => serializer.serialize_i64(Self::END_SENTINEL),
        }
    }
}

/// One page of message history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_offset: PageCursor,
}

impl MessagePage {
    /// Build a page, deriving the cursor from how many rows came back.
    pub fn from_messages(messages: Vec<Message>, limit: u32) -> Self {
        let next_offset = match messages.last() {
            Some(last) if messages.len() == limit as usize => PageCursor::After(last.timestamp),
            _ => PageCursor::End,
        };
        Self {
            messages,
            next_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_parse() {
        assert_eq!("text".parse::<MessageType>().unwrap(), MessageType::Text);
        assert_eq!("call".parse::<MessageType>().unwrap(), MessageType::Call);
        assert_eq!(
            "location".parse::<MessageType>().unwrap(),
            MessageType::Location
        );
        assert!("video".parse::<MessageType>().is_err());
        assert!("".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_system_message_fields() {
        let msg = Message::system("M1", json!("alice joined"));
        assert_eq!(msg.sender, SYSTEM_SENDER);
        assert!(msg.is_system_message);
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(msg.room_id, "M1");
    }

    #[test]
    fn test_message_serializes_type_field() {
        let msg = Message::new("M1", "alice", MessageType::Call, json!({"duration": 30}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "call");
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["is_system_message"], false);
    }

    #[test]
    fn test_is_empty_payload() {
        assert!(is_empty_payload(&json!(null)));
        assert!(is_empty_payload(&json!("")));
        assert!(is_empty_payload(&json!("   ")));
        assert!(is_empty_payload(&json!({})));
        assert!(is_empty_payload(&json!([])));
        assert!(!is_empty_payload(&json!("hi")));
        assert!(!is_empty_payload(&json!({"text": "hi"})));
        assert!(!is_empty_payload(&json!(0)));
    }

    #[test]
    fn test_cursor_serialization() {
        let ts = DateTime::parse_from_rfc3339("2025-05-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let after = serde_json::to_value(PageCursor::After(ts)).unwrap();
        assert_eq!(after, json!("2025-05-01T14:30:00.000000Z"));
        let end = serde_json::to_value(PageCursor::End).unwrap();
        assert_eq!(end, json!(-1));
    }

    #[test]
    fn test_page_cursor_from_full_and_short_pages() {
        let a = Message::new("M1", "alice", MessageType::Text, json!("one"));
        let b = Message::new("M1", "alice", MessageType::Text, json!("two"));
        let last_ts = b.timestamp;

        let full = MessagePage::from_messages(vec![a.clone(), b], 2);
        assert_eq!(full.next_offset, PageCursor::After(last_ts));

        let short = MessagePage::from_messages(vec![a], 2);
        assert!(short.next_offset.is_end());

        let empty = MessagePage::from_messages(Vec::new(), 2);
        assert!(empty.next_offset.is_end());
    }

    #[test]
    fn test_format_timestamp_fixed_width() {
        let early = DateTime::parse_from_rfc3339("2025-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2025-01-01T00:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&early).len(), format_timestamp(&late).len());
        assert!(format_timestamp(&late) < format_timestamp(&early));
    }
}
