// Skype conversation export parser
use super::{channel_from_filename, normalize_iso, MessageParser};
use crate::error::Result;
use crate::ingest::InputFile;
use crate::message::{Message, Platform, UNKNOWN_SENDER};
use serde_json::{Map, Value};

/// Parser for Skype JSON exports and `[timestamp] sender: content` logs
#[derive(Default)]
pub struct SkypeParser;

impl SkypeParser {
    pub fn new() -> Self {
        Self
    }

    /// JSON first; anything that is not a JSON object goes to the line format
    pub fn parse_content(&self, content: &str, channel: Option<String>) -> Vec<Message> {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(obj)) => parse_json(obj, channel),
            _ => parse_lines(content, channel),
        }
    }
}

impl MessageParser for SkypeParser {
    fn name(&self) -> &'static str {
        "skype"
    }

    fn platform(&self) -> Platform {
        Platform::Skype
    }

    fn parse(&self, file: &InputFile) -> Result<Vec<Message>> {
        Ok(self.parse_content(&file.text(), channel_from_filename(&file.name)))
    }
}

fn parse_json(mut obj: Map<String, Value>, channel: Option<String>) -> Vec<Message> {
    let entries = match obj.remove("messages") {
        Some(Value::Array(entries)) => entries,
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match entry {
            Value::Object(msg) => Some(normalize_json_message(msg, idx, channel.clone())),
            _ => None,
        })
        .collect()
}

fn normalize_json_message(msg: Map<String, Value>, idx: usize, channel: Option<String>) -> Message {
    let text = |key: &str| {
        msg.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let timestamp = ["originalarrivaltime", "composetime", "timestamp"]
        .iter()
        .find_map(|key| text(key))
        .and_then(|raw| normalize_iso(&raw))
        .unwrap_or_default();
    let sender_id = text("from");
    let sender = text("displayName")
        .or_else(|| sender_id.clone())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let message_id = text("id")
        .or_else(|| text("clientmessageid"))
        .unwrap_or_else(|| format!("skype_{}", idx));

    let mut message = Message::new(Platform::Skype, message_id, text("content").unwrap_or_default())
        .with_sender(sender)
        .with_timestamp(timestamp)
        .with_channel(channel);
    message.sender_id = sender_id;
    message.with_raw(Value::Object(msg))
}

// [2024-03-01T10:00:00] alice: hello
fn parse_lines(content: &str, channel: Option<String>) -> Vec<Message> {
    let mut messages = Vec::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        let line = line.strip_prefix('[').unwrap_or(line);

        let Some((ts, rest)) = line.split_once(']') else {
            continue;
        };
        let Some((sender, text)) = rest.split_once(':') else {
            continue;
        };

        let ts = ts.trim();
        let timestamp = normalize_iso(ts).unwrap_or_else(|| ts.to_string());
        let sender = match sender.trim() {
            "" => UNKNOWN_SENDER,
            s => s,
        };

        messages.push(
            Message::new(Platform::Skype, format!("skype_line_{}", idx), text.trim())
                .with_sender(sender)
                .with_timestamp(timestamp)
                .with_channel(channel.clone())
                .with_raw(Value::String(raw_line.to_string())),
        );
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_export() {
        let content = r#"{"messages": [
            {"originalarrivaltime": "2024-03-01T10:00:00.123Z", "from": "live:alice",
             "displayName": "Alice", "content": "hi", "id": "m1"},
            {"from": "live:bob", "content": "yo"},
            "not a message"
        ]}"#;
        let messages = SkypeParser::new().parse_content(content, None);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "Alice");
        assert_eq!(messages[0].sender_id.as_deref(), Some("live:alice"));
        assert_eq!(messages[0].timestamp, "2024-03-01T10:00:00.123Z");
        assert_eq!(messages[0].message_id, "m1");
        assert_eq!(messages[1].sender, "live:bob");
        assert_eq!(messages[1].timestamp, "");
        assert_eq!(messages[1].message_id, "skype_1");
    }

    #[test]
    fn test_json_object_without_messages_is_empty() {
        let messages = SkypeParser::new().parse_content(r#"{"conversations": []}"#, None);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_line_format() {
        let content = "[2024-03-01T10:00:00] alice: hello: there\n\
                       garbage line without markers\n\
                       [yesterday] bob: raw stamp\n\
                       [2024-03-01 10:05:00] : nameless";
        let messages = SkypeParser::new().parse_content(content, Some("team".into()));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].sender, "alice");
        assert_eq!(messages[0].text, "hello: there");
        assert_eq!(messages[0].timestamp, "2024-03-01T10:00:00");
        assert_eq!(messages[0].channel.as_deref(), Some("team"));
        // Unparseable timestamps are kept as written
        assert_eq!(messages[1].timestamp, "yesterday");
        assert_eq!(messages[2].sender, UNKNOWN_SENDER);
        assert_eq!(messages[2].timestamp, "2024-03-01T10:05:00");
    }

    #[test]
    fn test_json_array_falls_back_to_lines() {
        let messages = SkypeParser::new().parse_content("[1, 2, 3]", None);
        assert!(messages.is_empty());
    }
}
