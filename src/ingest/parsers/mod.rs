// Per-platform export parsers
//
// Each parser turns one input file into canonical messages. Parsers may return
// an error; the ingestion coordinator converts errors (and panics) into
// failure records so a bad file never aborts a batch.

mod email;
mod skype;
mod slack;
mod whatsapp;

pub use email::{EmlParser, MboxParser};
pub use skype::SkypeParser;
pub use slack::SlackParser;
pub use whatsapp::WhatsAppParser;

use crate::error::Result;
use crate::ingest::InputFile;
use crate::message::{iso_naive, iso_offset, Message, Platform};
use chrono::{DateTime, NaiveDateTime};
use std::path::Path;

/// Capability shared by every export parser
pub trait MessageParser: Send + Sync {
    /// Short parser name used in logs
    fn name(&self) -> &'static str;

    /// Platform bucket the produced messages belong to
    fn platform(&self) -> Platform;

    /// Parse a whole file into canonical messages
    fn parse(&self, file: &InputFile) -> Result<Vec<Message>>;
}

/// Guess a channel label from a filename: the basename up to its first dot
///
/// `"exports/general.json"` becomes `"general"`.
pub fn channel_from_filename(filename: &str) -> Option<String> {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    let channel = base.split('.').next().unwrap_or_default();
    if channel.is_empty() {
        None
    } else {
        Some(channel.to_string())
    }
}

/// Canonicalize an ISO-8601 token, keeping the offset when it has one
///
/// Returns `None` when the token is not ISO-8601.
pub fn normalize_iso(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(iso_offset(&dt));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| iso_naive(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_filename() {
        assert_eq!(channel_from_filename("general.json"), Some("general".into()));
        assert_eq!(
            channel_from_filename("exports/random.2024.csv"),
            Some("random".into())
        );
        assert_eq!(channel_from_filename(".hidden"), None);
    }

    #[test]
    fn test_normalize_iso() {
        assert_eq!(
            normalize_iso("2024-03-01T10:00:00Z").as_deref(),
            Some("2024-03-01T10:00:00Z")
        );
        assert_eq!(
            normalize_iso("2024-03-01 10:00:00").as_deref(),
            Some("2024-03-01T10:00:00")
        );
        assert_eq!(normalize_iso("03/01/2024"), None);
        assert_eq!(normalize_iso(""), None);
    }
}
