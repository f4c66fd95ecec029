// Slack export parser
//
// Tier 1: JSON (array, {"messages": [...]}, or object values)
// Tier 2: delimited text with a header row, delimiter sniffed from a sample
// Tier 3: one message per non-empty line
use super::{channel_from_filename, MessageParser};
use crate::error::Result;
use crate::ingest::InputFile;
use crate::message::{iso_naive, Message, Platform, UNKNOWN_SENDER};
use chrono::DateTime;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Delimiters considered when sniffing delimited exports
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Parser for Slack channel exports
pub struct SlackParser {
    /// Bytes of content inspected when sniffing the delimiter
    sniff_bytes: usize,
}

impl SlackParser {
    pub fn new(sniff_bytes: usize) -> Self {
        Self { sniff_bytes }
    }

    /// Run the three tiers in order; the first non-empty result wins
    pub fn parse_content(&self, content: &str, channel: Option<String>) -> Vec<Message> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let stripped = content.trim_start();
        if stripped.starts_with('{') || stripped.starts_with('[') {
            let messages = parse_json_export(content, channel.as_deref());
            if !messages.is_empty() {
                return messages;
            }
            tracing::debug!("JSON tier produced no messages, trying delimited text");
        }

        if content.contains(',') || content.contains('\t') || content.contains(';') {
            match self.parse_delimited(content, channel.as_deref()) {
                Ok(messages) if !messages.is_empty() => return messages,
                Ok(_) => {}
                Err(e) => tracing::debug!("Delimited tier failed: {}", e),
            }
        }

        parse_lines(content, channel.as_deref())
    }

    fn parse_delimited(&self, content: &str, channel: Option<&str>) -> Result<Vec<Message>> {
        let delimiter = sniff_delimiter(sample(content, self.sniff_bytes));

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Ok(Vec::new());
        }

        let mut messages = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("Skipping unreadable row {}: {}", idx, e);
                    continue;
                }
            };
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let row: BTreeMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            messages.push(normalize_row(&row, idx, channel));
        }

        Ok(messages)
    }
}

impl Default for SlackParser {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MessageParser for SlackParser {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn platform(&self) -> Platform {
        Platform::Slack
    }

    fn parse(&self, file: &InputFile) -> Result<Vec<Message>> {
        Ok(self.parse_content(&file.text(), channel_from_filename(&file.name)))
    }
}

fn parse_json_export(content: &str, channel: Option<&str>) -> Vec<Message> {
    let data: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let entries: Vec<Value> = match data {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("messages") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                obj.insert("messages".to_string(), other);
                obj.into_iter().map(|(_, v)| v).collect()
            }
            None => obj.into_iter().map(|(_, v)| v).collect(),
        },
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match entry {
            Value::Object(obj) => Some(normalize_json_message(obj, idx, channel)),
            _ => None,
        })
        .collect()
}

fn normalize_json_message(msg: Map<String, Value>, idx: usize, channel: Option<&str>) -> Message {
    let text = json_field(&msg, &["text", "body", "message"]).unwrap_or_default();
    let user_id = json_field(&msg, &["user", "user_id"]);

    let profile = msg.get("user_profile").and_then(Value::as_object);
    let username = profile
        .and_then(|p| json_field(p, &["display_name", "real_name"]))
        .or_else(|| json_field(&msg, &["username", "user_name"]))
        .or_else(|| user_id.clone())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let ts = json_field(&msg, &["ts", "timestamp", "date"]);
    let message_id = json_field(&msg, &["client_msg_id", "id"])
        .or_else(|| ts.clone())
        .unwrap_or_else(|| format!("slack_{}", idx));
    let channel = json_field(&msg, &["channel", "channel_name"]).or_else(|| channel.map(String::from));

    let mut message = Message::new(Platform::Slack, message_id, text)
        .with_sender(username)
        .with_timestamp(ts_to_iso(ts.as_deref()))
        .with_channel(channel);
    message.sender_id = user_id;
    message.with_raw(Value::Object(msg))
}

fn normalize_row(row: &BTreeMap<String, String>, idx: usize, channel: Option<&str>) -> Message {
    let text = row_field(row, &["text", "message", "body", "content"]).unwrap_or_default();
    let user_id = row_field(row, &["user_id", "user", "uid"]);
    let username = row_field(row, &["user_name", "username", "name", "display_name"])
        .or_else(|| user_id.clone())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let ts = row_field(row, &["ts", "timestamp", "date", "time"]);
    let message_id = row_field(row, &["message_id", "id"])
        .or_else(|| ts.clone())
        .unwrap_or_else(|| format!("slack_{}", idx));
    let channel = row_field(row, &["channel", "channel_name"]).or_else(|| channel.map(String::from));

    let raw: Map<String, Value> = row
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let mut message = Message::new(Platform::Slack, message_id, text)
        .with_sender(username)
        .with_timestamp(ts_to_iso(ts.as_deref()))
        .with_channel(channel)
        .with_raw(Value::Object(raw));
    message.sender_id = user_id;
    message
}

fn parse_lines(content: &str, channel: Option<&str>) -> Vec<Message> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Message::new(Platform::Slack, format!("slack_line_{}", idx), line.trim())
                .with_channel(channel.map(String::from))
                .with_raw(Value::String(line.to_string()))
        })
        .collect()
}

/// First present, non-empty field among `keys`, rendered as a string
fn json_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn row_field(row: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| row.get(*key).filter(|v| !v.is_empty()).cloned())
}

/// Render a Slack epoch token (`"1609459200.000100"`) as ISO-8601 in UTC
///
/// Non-numeric tokens are returned unchanged; absent ones become empty.
fn ts_to_iso(ts: Option<&str>) -> String {
    let raw = match ts.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return String::new(),
    };

    let parsed = raw.parse::<f64>().ok().filter(|s| s.is_finite()).and_then(|seconds| {
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    });

    match parsed {
        Some(dt) => iso_naive(&dt.naive_utc()),
        None => raw.to_string(),
    }
}

/// Leading slice of `content` of at most `limit` bytes, cut on a char boundary
fn sample(content: &str, limit: usize) -> &str {
    if content.len() <= limit {
        return content;
    }
    let mut end = limit;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    // Drop the trailing partial line so it cannot skew the counts
    match content[..end].rfind('\n') {
        Some(newline) if newline > 0 => &content[..newline],
        _ => &content[..end],
    }
}

/// Pick the delimiter that appears on the header line and the same number of
/// times on every sampled line; falls back to a comma.
fn sniff_delimiter(sample: &str) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best: Option<(bool, usize, u8)> = None;
    for &candidate in DELIMITER_CANDIDATES.iter() {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.bytes().filter(|b| *b == candidate).count())
            .collect();
        let first = counts.first().copied().unwrap_or(0);
        if first == 0 {
            continue;
        }
        let consistent = counts.iter().all(|n| *n == first);
        let rank = (consistent, first, candidate);
        let better = match best {
            None => true,
            Some((c, n, _)) => (consistent, first) > (c, n),
        };
        if better {
            best = Some(rank);
        }
    }

    best.map(|(_, _, d)| d).unwrap_or(b',')
}
