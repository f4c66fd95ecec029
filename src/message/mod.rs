//! Canonical message model
//!
//! Every parser produces [`Message`] values and every analysis stage consumes
//! and returns them. Optional fields default on deserialization so records
//! written by older runs (or by hand) still load.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel used wherever a sender cannot be resolved
pub const UNKNOWN_SENDER: &str = "unknown";

/// Closed set of platform tags a message can belong to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Slack,
    Skype,
    Email,
    #[default]
    Unknown,
}

impl Platform {
    /// All platforms in bucket order
    pub const ALL: [Platform; 5] = [
        Platform::WhatsApp,
        Platform::Slack,
        Platform::Skype,
        Platform::Email,
        Platform::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "whatsapp",
            Platform::Slack => "slack",
            Platform::Skype => "skype",
            Platform::Email => "email",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier assigned by the incident flagger
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named signal produced by a scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Number(f64),
    Label(String),
    List(Vec<String>),
}

impl ScoreValue {
    /// Numeric reading of the signal; labels holding a number are accepted
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScoreValue::Number(n) => Some(*n),
            ScoreValue::Label(s) => s.trim().parse().ok(),
            ScoreValue::List(_) => None,
        }
    }
}

/// Named signals attached by the scoring stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scores(pub BTreeMap<String, ScoreValue>);

impl Scores {
    /// The placeholder produced when no real model is plugged in
    pub fn neutral() -> Self {
        let mut signals = BTreeMap::new();
        signals.insert("risk".to_string(), ScoreValue::Number(0.0));
        signals.insert(
            "sentiment".to_string(),
            ScoreValue::Label("neutral".to_string()),
        );
        signals.insert("flags".to_string(), ScoreValue::List(Vec::new()));
        Self(signals)
    }

    pub fn get(&self, name: &str) -> Option<&ScoreValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ScoreValue) {
        self.0.insert(name.into(), value);
    }

    pub fn risk(&self) -> Option<&ScoreValue> {
        self.get("risk")
    }
}

/// Per-message verdict from the incident flagger
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncidentAnalysis {
    pub incident: bool,
    pub triggers: Vec<String>,
    pub severity: Severity,
    pub score: f64,
}

impl IncidentAnalysis {
    /// Verdict used when evaluation of a message fails
    pub fn neutral() -> Self {
        Self::default()
    }
}

fn default_sender() -> String {
    UNKNOWN_SENDER.to_string()
}

/// Canonical message record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub platform: Platform,

    /// Unique within the source file; positional when the format has no id
    #[serde(default)]
    pub message_id: String,

    /// Display name of the author
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Stable raw identifier of the author, when the export has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default)]
    pub text: String,

    /// ISO-8601 when parseable, otherwise the raw token, otherwise empty
    #[serde(default)]
    pub timestamp: String,

    /// Direct numeric risk score supplied upstream of the scorer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Duplicate-free, insertion ordered
    #[serde(default)]
    pub flags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_analysis: Option<IncidentAnalysis>,

    /// Original parsed structure, kept for traceability only
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Message {
    pub fn new(platform: Platform, message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform,
            message_id: message_id.into(),
            sender: default_sender(),
            sender_id: None,
            channel: None,
            subject: None,
            text: text.into(),
            timestamp: String::new(),
            score: None,
            flags: Vec::new(),
            scores: None,
            incident_analysis: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Sender with fallback to the raw identifier, then the sentinel
    pub fn display_sender(&self) -> &str {
        let sender = self.sender.trim();
        if !sender.is_empty() {
            return &self.sender;
        }
        match self.sender_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => UNKNOWN_SENDER,
        }
    }

    /// Effective risk score: the flagger verdict, then the direct score
    pub fn risk_score(&self) -> f64 {
        self.incident_analysis
            .as_ref()
            .map(|a| a.score)
            .or(self.score)
            .unwrap_or(0.0)
    }

    /// Severity of the flagger verdict, low when the message was never flagged
    pub fn severity(&self) -> Severity {
        self.incident_analysis
            .as_ref()
            .map(|a| a.severity)
            .unwrap_or_default()
    }

    /// Add a flag unless it is already present
    pub fn add_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn sort_key(&self) -> Option<NaiveDateTime> {
        timestamp_key(&self.timestamp)
    }
}

/// Render a local (offset-less) timestamp in canonical ISO form
pub fn iso_naive(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Render an offset-carrying timestamp as RFC 3339
pub fn iso_offset(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Ordering key for a canonical timestamp string
///
/// RFC 3339 values compare in UTC, naive ISO values compare as written.
/// Empty or unparseable values return `None`, which orders before any
/// `Some` and therefore sorts as the earliest possible time.
pub fn timestamp_key(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// True for a non-empty timestamp that no known format can order
pub fn is_unorderable(raw: &str) -> bool {
    !raw.trim().is_empty() && timestamp_key(raw).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::WhatsApp).unwrap();
        assert_eq!(json, "\"whatsapp\"");
        let back: Platform = serde_json::from_str("\"email\"").unwrap();
        assert_eq!(back, Platform::Email);
    }

    #[test]
    fn test_message_tolerates_missing_fields() {
        let msg: Message = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(msg.platform, Platform::Unknown);
        assert_eq!(msg.sender, UNKNOWN_SENDER);
        assert_eq!(msg.timestamp, "");
        assert!(msg.flags.is_empty());
        assert!(msg.incident_analysis.is_none());
    }

    #[test]
    fn test_display_sender_fallbacks() {
        let msg = Message::new(Platform::Slack, "1", "x").with_sender("");
        assert_eq!(msg.display_sender(), UNKNOWN_SENDER);

        let mut msg = Message::new(Platform::Slack, "1", "x").with_sender("  ");
        msg.sender_id = Some("U123".to_string());
        assert_eq!(msg.display_sender(), "U123");

        let msg = Message::new(Platform::Slack, "1", "x").with_sender("Alice");
        assert_eq!(msg.display_sender(), "Alice");
    }

    #[test]
    fn test_add_flag_deduplicates() {
        let mut msg = Message::new(Platform::Slack, "1", "x");
        msg.add_flag("threat");
        msg.add_flag("leak");
        msg.add_flag("threat");
        assert_eq!(msg.flags, vec!["threat", "leak"]);
    }

    #[test]
    fn test_timestamp_key_formats() {
        let naive = timestamp_key("2024-02-01T09:00:00").unwrap();
        assert_eq!(iso_naive(&naive), "2024-02-01T09:00:00");

        // Offsets are compared in UTC
        let offset = timestamp_key("2024-02-01T11:00:00+02:00").unwrap();
        assert_eq!(offset, naive);

        assert!(timestamp_key("2024-02-01").is_some());
        assert!(timestamp_key("").is_none());
        assert!(timestamp_key("yesterday").is_none());
    }

    #[test]
    fn test_missing_timestamp_orders_first() {
        assert!(timestamp_key("") < timestamp_key("1970-01-01T00:00:00"));
        assert!(is_unorderable("not a date"));
        assert!(!is_unorderable(""));
    }

    #[test]
    fn test_score_value_numeric_reading() {
        assert_eq!(ScoreValue::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(ScoreValue::Label(" 8 ".to_string()).as_f64(), Some(8.0));
        assert_eq!(ScoreValue::Label("high".to_string()).as_f64(), None);
        assert_eq!(ScoreValue::List(vec![]).as_f64(), None);
    }

    #[test]
    fn test_neutral_scores_shape() {
        let scores = Scores::neutral();
        assert_eq!(scores.risk(), Some(&ScoreValue::Number(0.0)));
        let json = serde_json::to_value(&scores).unwrap();
        assert_eq!(json["sentiment"], "neutral");
        assert_eq!(json["flags"], serde_json::json!([]));
    }
}
