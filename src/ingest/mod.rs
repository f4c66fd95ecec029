// Ingestion: detect each uploaded file's platform, parse it, and fold the
// results into a platform-keyed grouping.
//
// A file that cannot be parsed (unknown type, parser error, parser panic)
// becomes a ParseFailure record in the `unknown` bucket; it never aborts the
// batch.

pub mod detector;
pub mod parsers;

pub use detector::{detect, FileKind};
pub use parsers::{
    EmlParser, MboxParser, MessageParser, SkypeParser, SlackParser, WhatsAppParser,
};

use crate::config::ParsingConfig;
use crate::error::{panic_message, CommsiftError, Result};
use crate::message::{Message, Platform};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// One uploaded file: a name and its exact bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, naming it by its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to read input file: {}", path.display()),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, content })
    }

    /// Content decoded as UTF-8 (lossy), without a leading byte-order mark
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.content);
        match text.strip_prefix('\u{FEFF}') {
            Some(stripped) => stripped.to_string(),
            None => text.into_owned(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }
}

/// Error record for a file that produced no messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub filename: String,
    pub error: String,
    #[serde(default)]
    pub trace: String,
}

/// A bucket entry: either a canonical message or a failure record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestRecord {
    // Tried first: messages default every field, so they would swallow failures
    Failure(ParseFailure),
    Message(Message),
}

/// Records for one platform, either bare or wrapped as `{"messages": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformBucket {
    Records(Vec<IngestRecord>),
    Wrapped { messages: Vec<IngestRecord> },
}

impl Default for PlatformBucket {
    fn default() -> Self {
        PlatformBucket::Records(Vec::new())
    }
}

impl PlatformBucket {
    pub fn records(&self) -> &[IngestRecord] {
        match self {
            PlatformBucket::Records(records) => records,
            PlatformBucket::Wrapped { messages } => messages,
        }
    }

    fn records_mut(&mut self) -> &mut Vec<IngestRecord> {
        match self {
            PlatformBucket::Records(records) => records,
            PlatformBucket::Wrapped { messages } => messages,
        }
    }

    pub fn push(&mut self, record: IngestRecord) {
        self.records_mut().push(record);
    }

    pub fn extend_messages(&mut self, messages: Vec<Message>) {
        self.records_mut()
            .extend(messages.into_iter().map(IngestRecord::Message));
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.records().iter().filter_map(|r| match r {
            IngestRecord::Message(m) => Some(m),
            IngestRecord::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ParseFailure> {
        self.records().iter().filter_map(|r| match r {
            IngestRecord::Failure(f) => Some(f),
            IngestRecord::Message(_) => None,
        })
    }
}

/// Platform-keyed grouping produced by ingestion; all five buckets always exist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedByPlatform {
    #[serde(default)]
    pub whatsapp: PlatformBucket,
    #[serde(default)]
    pub slack: PlatformBucket,
    #[serde(default)]
    pub skype: PlatformBucket,
    #[serde(default)]
    pub email: PlatformBucket,
    #[serde(default)]
    pub unknown: PlatformBucket,
}

impl ParsedByPlatform {
    pub fn bucket(&self, platform: Platform) -> &PlatformBucket {
        match platform {
            Platform::WhatsApp => &self.whatsapp,
            Platform::Slack => &self.slack,
            Platform::Skype => &self.skype,
            Platform::Email => &self.email,
            Platform::Unknown => &self.unknown,
        }
    }

    pub fn bucket_mut(&mut self, platform: Platform) -> &mut PlatformBucket {
        match platform {
            Platform::WhatsApp => &mut self.whatsapp,
            Platform::Slack => &mut self.slack,
            Platform::Skype => &mut self.skype,
            Platform::Email => &mut self.email,
            Platform::Unknown => &mut self.unknown,
        }
    }

    /// Buckets in fixed platform order
    pub fn iter(&self) -> impl Iterator<Item = (Platform, &PlatformBucket)> {
        Platform::ALL.into_iter().map(move |p| (p, self.bucket(p)))
    }

    pub fn message_count(&self) -> usize {
        self.iter().map(|(_, b)| b.messages().count()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.iter().map(|(_, b)| b.failures().count()).sum()
    }
}

/// Summary attached to a successful parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMeta {
    pub filename: String,
    pub total_messages: usize,
}

/// Result of dispatching one file to its parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ParseOutcome {
    Parsed {
        platform: Platform,
        messages: Vec<Message>,
        meta: ParseMeta,
    },
    Failed {
        #[serde(flatten)]
        failure: ParseFailure,
    },
}

/// Fans files out to the detector and the matching parser
pub struct IngestionCoordinator {
    whatsapp: WhatsAppParser,
    slack: SlackParser,
    skype: SkypeParser,
    eml: EmlParser,
    mbox: MboxParser,
}

impl IngestionCoordinator {
    pub fn new(config: &ParsingConfig) -> Self {
        Self {
            whatsapp: WhatsAppParser::new(config.whatsapp_day_first),
            slack: SlackParser::new(config.csv_sniff_bytes),
            skype: SkypeParser::new(),
            eml: EmlParser::new(),
            mbox: MboxParser::new(),
        }
    }

    fn parser_for(&self, kind: FileKind) -> Option<&dyn MessageParser> {
        match kind {
            FileKind::WhatsApp => Some(&self.whatsapp),
            FileKind::Slack => Some(&self.slack),
            FileKind::Skype => Some(&self.skype),
            FileKind::Eml => Some(&self.eml),
            FileKind::Mbox => Some(&self.mbox),
            FileKind::Unknown => None,
        }
    }

    /// Detect and parse a single file; never panics and never errors
    pub fn parse_file(&self, file: &InputFile) -> ParseOutcome {
        let kind = detect(&file.name);
        tracing::debug!("Detected {} as {}", file.name, kind);

        let Some(parser) = self.parser_for(kind) else {
            return ParseOutcome::Failed {
                failure: ParseFailure {
                    filename: file.name.clone(),
                    error: format!("Unrecognized file type: {}", file.name),
                    trace: String::new(),
                },
            };
        };

        dispatch(parser, file)
    }

    /// Parse every file and group the results by platform, in input order
    pub fn ingest(&self, files: &[InputFile]) -> ParsedByPlatform {
        let mut grouped = ParsedByPlatform::default();

        for file in files {
            match self.parse_file(file) {
                ParseOutcome::Parsed {
                    platform, messages, ..
                } => grouped.bucket_mut(platform).extend_messages(messages),
                ParseOutcome::Failed { failure } => {
                    grouped.unknown.push(IngestRecord::Failure(failure))
                }
            }
        }

        tracing::info!(
            "Ingested {} files: {} messages, {} failures",
            files.len(),
            grouped.message_count(),
            grouped.failure_count()
        );

        grouped
    }
}

/// Run one parser with panics and errors converted into a failure outcome
pub fn dispatch(parser: &dyn MessageParser, file: &InputFile) -> ParseOutcome {
    match catch_unwind(AssertUnwindSafe(|| parser.parse(file))) {
        Ok(Ok(messages)) => {
            tracing::debug!(
                "Parsed {} messages from {} with {} parser",
                messages.len(),
                file.name,
                parser.name()
            );
            ParseOutcome::Parsed {
                platform: parser.platform(),
                meta: ParseMeta {
                    filename: file.name.clone(),
                    total_messages: messages.len(),
                },
                messages,
            }
        }
        Ok(Err(e)) => {
            tracing::warn!("Failed to parse {}: {}", file.name, e);
            ParseOutcome::Failed {
                failure: ParseFailure {
                    filename: file.name.clone(),
                    error: e.to_string(),
                    trace: e.trace(),
                },
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!("Parser {} panicked on {}: {}", parser.name(), file.name, message);
            ParseOutcome::Failed {
                failure: ParseFailure {
                    filename: file.name.clone(),
                    error: message,
                    trace: format!("panic in {} parser", parser.name()),
                },
            }
        }
    }
}

impl Default for IngestionCoordinator {
    fn default() -> Self {
        Self::new(&ParsingConfig::default())
    }
}
