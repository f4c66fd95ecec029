// RFC 5322 email parsers: single .eml files and .mbox archives
use super::MessageParser;
use crate::error::{CommsiftError, Result};
use crate::ingest::InputFile;
use crate::message::{iso_naive, iso_offset, Message, Platform, UNKNOWN_SENDER};
use chrono::DateTime;
use mailparse::{MailAddr, MailHeaderMap, ParsedMail};
use serde_json::json;

/// Parser for a single `.eml` message
#[derive(Default)]
pub struct EmlParser;

impl EmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl MessageParser for EmlParser {
    fn name(&self) -> &'static str {
        "eml"
    }

    fn platform(&self) -> Platform {
        Platform::Email
    }

    fn parse(&self, file: &InputFile) -> Result<Vec<Message>> {
        let message = parse_email(file.bytes(), 0).map_err(|e| CommsiftError::Parse {
            filename: file.name.clone(),
            message: e.to_string(),
        })?;
        Ok(vec![message])
    }
}

/// Parser for `.mbox` archives; messages that fail to parse are skipped
#[derive(Default)]
pub struct MboxParser;

impl MboxParser {
    pub fn new() -> Self {
        Self
    }
}

impl MessageParser for MboxParser {
    fn name(&self) -> &'static str {
        "mbox"
    }

    fn platform(&self) -> Platform {
        Platform::Email
    }

    fn parse(&self, file: &InputFile) -> Result<Vec<Message>> {
        let content = file.text();
        let mut messages = Vec::new();

        for (idx, raw) in split_mbox(&content).iter().enumerate() {
            match parse_email(raw.as_bytes(), idx) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!("Skipping message {} in {}: {}", idx, file.name, e);
                }
            }
        }

        Ok(messages)
    }
}

fn parse_email(raw: &[u8], idx: usize) -> std::result::Result<Message, mailparse::MailParseError> {
    let mail = mailparse::parse_mail(raw)?;
    let headers = &mail.headers;

    let from = headers.get_first_value("From").filter(|v| !v.trim().is_empty());
    let subject = headers.get_first_value("Subject");
    let date = headers.get_first_value("Date");
    let message_id = headers
        .get_first_value("Message-ID")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("email_{}", idx));

    let timestamp = date.as_deref().and_then(parse_date).unwrap_or_default();
    let body = first_plain_text(&mail).unwrap_or_default();
    let sender_id = from.as_deref().and_then(address_of);

    let mut message = Message::new(Platform::Email, message_id, body.trim())
        .with_sender(
            from.as_deref()
                .map(str::trim)
                .unwrap_or(UNKNOWN_SENDER),
        )
        .with_timestamp(timestamp)
        .with_raw(json!({
            "from": from,
            "subject": subject,
            "date": date,
        }));
    message.sender_id = sender_id;
    message.subject = subject;
    Ok(message)
}

/// RFC 2822 date header to ISO-8601; `None` leaves the timestamp empty
fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(iso_offset(&dt));
    }
    // mailparse tolerates obsolete zone names and missing weekdays
    let epoch = mailparse::dateparse(raw).ok()?;
    DateTime::from_timestamp(epoch, 0).map(|dt| iso_naive(&dt.naive_utc()))
}

/// Bare mailbox address of the first `From` entry
fn address_of(from: &str) -> Option<String> {
    let list = mailparse::addrparse(from).ok()?;
    list.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => Some(info.addr.clone()),
        MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
    })
}

/// Decoded body of the first `text/plain` part, depth first
fn first_plain_text(mail: &ParsedMail) -> Option<String> {
    if mail.subparts.is_empty() {
        if mail.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            return mail.get_body().ok();
        }
        return None;
    }
    mail.subparts.iter().find_map(first_plain_text)
}

/// Split an mbox archive on `From ` separator lines
///
/// Text before the first separator is ignored and mboxrd `>From ` quoting is
/// undone.
fn split_mbox(content: &str) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        if line.starts_with("From ") {
            if let Some(done) = current.take() {
                messages.push(done);
            }
            current = Some(String::new());
            continue;
        }

        if let Some(buf) = current.as_mut() {
            let unquoted = line.trim_start_matches('>');
            if unquoted.len() < line.len() && unquoted.starts_with("From ") {
                buf.push_str(&line[1..]);
            } else {
                buf.push_str(line);
            }
            buf.push('\n');
        }
    }

    if let Some(done) = current {
        messages.push(done);
    }

    messages.retain(|m| !m.trim().is_empty());
    messages
}
