// Filename-based platform detection
use crate::message::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Export format recognized from a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    WhatsApp,
    Slack,
    Skype,
    Eml,
    Mbox,
    Unknown,
}

impl FileKind {
    /// Bucket the parsed messages land in
    pub fn platform(&self) -> Platform {
        match self {
            FileKind::WhatsApp => Platform::WhatsApp,
            FileKind::Slack => Platform::Slack,
            FileKind::Skype => Platform::Skype,
            FileKind::Eml | FileKind::Mbox => Platform::Email,
            FileKind::Unknown => Platform::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::WhatsApp => "whatsapp",
            FileKind::Slack => "slack",
            FileKind::Skype => "skype",
            FileKind::Eml => "eml",
            FileKind::Mbox => "mbox",
            FileKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a filename to its export format
///
/// Rules are checked in order and the first match wins, so ambiguous names
/// favor WhatsApp and Slack over Skype and email. Never touches file content.
pub fn detect(filename: &str) -> FileKind {
    let name = filename.to_lowercase();

    if name.ends_with(".txt") && (name.contains("whatsapp") || name.contains("chat")) {
        return FileKind::WhatsApp;
    }
    if name.ends_with(".json") || name.ends_with(".csv") {
        return FileKind::Slack;
    }
    if name.contains("skype") || name.ends_with(".db") {
        return FileKind::Skype;
    }
    if name.ends_with(".eml") {
        return FileKind::Eml;
    }
    if name.ends_with(".mbox") {
        return FileKind::Mbox;
    }

    FileKind::Unknown
}
