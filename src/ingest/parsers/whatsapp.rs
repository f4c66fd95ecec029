// WhatsApp text export parser
//
// Line-oriented state machine: a header line opens a message, any other line
// continues the open one.
use super::{channel_from_filename, MessageParser};
use crate::error::Result;
use crate::ingest::InputFile;
use crate::message::{iso_naive, Message, Platform};
use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

// [12/11/2025, 21:45] Joao: message
// 12/11/2025, 21:45 - Joao: message
// [1/2/24, 9:05:11 PM] Joao: message
const LINE_PATTERN: &str = r"^\[?(?P<date>\d{1,2}/\d{1,2}/\d{2,4}),\s+(?P<time>\d{1,2}:\d{2}(?::\d{2})?(?:[ \x{202F}]?[AaPp][Mm])?)\]?\s*[-\x{2013}]?\s*(?P<sender>[^:]+?):\s+(?P<content>.+)$";

fn line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| Regex::new(LINE_PATTERN).expect("WhatsApp line pattern compiles"))
}

/// Parser for WhatsApp "export chat" text files
pub struct WhatsAppParser {
    /// Try day/month before month/day for ambiguous dates
    day_first: bool,
}

impl WhatsAppParser {
    pub fn new(day_first: bool) -> Self {
        Self { day_first }
    }

    /// Parse raw export text into messages
    pub fn parse_text(&self, content: &str, channel: Option<String>) -> Vec<Message> {
        let re = line_regex();
        let mut messages = Vec::new();
        let mut current: Option<Message> = None;
        let mut next_id = 0usize;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = re.captures(line) {
                next_id += 1;
                if let Some(done) = current.take() {
                    messages.push(done);
                }

                let timestamp = self
                    .parse_datetime(&caps["date"], &caps["time"])
                    .map(|dt| iso_naive(&dt))
                    .unwrap_or_default();

                current = Some(
                    Message::new(Platform::WhatsApp, next_id.to_string(), caps["content"].trim())
                        .with_sender(caps["sender"].trim())
                        .with_timestamp(timestamp)
                        .with_channel(channel.clone())
                        .with_raw(json!({ "lines": [raw_line] })),
                );
            } else if let Some(open) = current.as_mut() {
                open.text.push('\n');
                open.text.push_str(raw_line);
                if let Some(lines) = open.raw.get_mut("lines").and_then(|l| l.as_array_mut()) {
                    lines.push(json!(raw_line));
                }
            } else {
                // Text before the first header line stands on its own
                next_id += 1;
                current = Some(
                    Message::new(Platform::WhatsApp, next_id.to_string(), raw_line)
                        .with_sender("")
                        .with_channel(channel.clone())
                        .with_raw(json!({ "lines": [raw_line] })),
                );
            }
        }

        if let Some(done) = current {
            messages.push(done);
        }

        messages
    }

    /// Parse the date/time pair of a header line
    ///
    /// The year width selects `%Y` or `%y`; the two day/month orderings are
    /// tried in configured priority and the first valid date wins.
    fn parse_datetime(&self, date: &str, time: &str) -> Option<NaiveDateTime> {
        let year = match date.rsplit('/').next().map(str::len) {
            Some(4) => "%Y",
            Some(2) => "%y",
            _ => return None,
        };

        let time = time.replace('\u{202F}', " ");
        let lower = time.to_ascii_lowercase();
        let meridiem = lower.ends_with("am") || lower.ends_with("pm");
        let time = if meridiem && !time.contains(' ') {
            let split = time.len() - 2;
            format!("{} {}", &time[..split], &time[split..])
        } else {
            time
        };
        let clock = match (time.matches(':').count(), meridiem) {
            (2, true) => "%I:%M:%S %p",
            (_, true) => "%I:%M %p",
            (2, false) => "%H:%M:%S",
            _ => "%H:%M",
        };

        let orders = if self.day_first {
            ["%d/%m", "%m/%d"]
        } else {
            ["%m/%d", "%d/%m"]
        };

        let stamp = format!("{} {}", date, time);
        orders.iter().find_map(|order| {
            let fmt = format!("{}/{} {}", order, year, clock);
            NaiveDateTime::parse_from_str(&stamp, &fmt).ok()
        })
    }
}

impl Default for WhatsAppParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MessageParser for WhatsAppParser {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    fn parse(&self, file: &InputFile) -> Result<Vec<Message>> {
        Ok(self.parse_text(&file.text(), channel_from_filename(&file.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_messages_day_first() {
        let parser = WhatsAppParser::new(true);
        let text = "[1/2/2024, 09:00] Alice: let's meet\n[1/2/2024, 09:05] Bob: ok see you";
        let messages = parser.parse_text(text, None);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "Alice");
        assert_eq!(messages[0].text, "let's meet");
        assert_eq!(messages[0].timestamp, "2024-02-01T09:00:00");
        assert_eq!(messages[1].sender, "Bob");
        assert_eq!(messages[1].timestamp, "2024-02-01T09:05:00");
        assert_eq!(messages[0].message_id, "1");
        assert_eq!(messages[1].message_id, "2");
    }

    #[test]
    fn test_month_first_priority() {
        let parser = WhatsAppParser::new(false);
        let messages = parser.parse_text("[1/2/2024, 09:00] Alice: hi", None);
        assert_eq!(messages[0].timestamp, "2024-01-02T09:00:00");
    }

    #[test]
    fn test_falls_back_to_other_ordering() {
        // 13 cannot be a month, so the day-first attempt fails over
        let parser = WhatsAppParser::new(false);
        let messages = parser.parse_text("13/02/2024, 10:30 - Carol: hey", None);
        assert_eq!(messages[0].timestamp, "2024-02-13T10:30:00");
        assert_eq!(messages[0].sender, "Carol");
    }

    #[test]
    fn test_dash_separator_and_two_digit_year() {
        let parser = WhatsAppParser::default();
        let messages = parser.parse_text("12/11/25, 21:45:02 - Joao: mensagem", None);
        assert_eq!(messages[0].timestamp, "2025-11-12T21:45:02");
        assert_eq!(messages[0].sender, "Joao");
    }

    #[test]
    fn test_twelve_hour_clock() {
        let parser = WhatsAppParser::default();
        let messages = parser.parse_text("[3/4/24, 9:05 PM] Dan: late", None);
        assert_eq!(messages[0].timestamp, "2024-04-03T21:05:00");
        assert_eq!(messages[0].sender, "Dan");
    }

    #[test]
    fn test_multiline_continuation() {
        let parser = WhatsAppParser::default();
        let text = "[1/2/2024, 09:00] Alice: first line\nsecond line\n\n[1/2/2024, 09:01] Bob: next";
        let messages = parser.parse_text(text, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "first line\nsecond line");
        assert_eq!(messages[0].raw["lines"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_leading_unmatched_line_is_standalone() {
        let parser = WhatsAppParser::default();
        let text = "Messages are end-to-end encrypted\n[1/2/2024, 09:00] Alice: hi";
        let messages = parser.parse_text(text, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "");
        assert_eq!(messages[0].timestamp, "");
        assert_eq!(messages[0].text, "Messages are end-to-end encrypted");
    }

    #[test]
    fn test_invalid_date_leaves_timestamp_empty() {
        let parser = WhatsAppParser::default();
        let messages = parser.parse_text("[45/45/2024, 09:00] Alice: hi", None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].timestamp, "");
        assert_eq!(messages[0].sender, "Alice");
    }

    #[test]
    fn test_channel_comes_from_filename() {
        let parser = WhatsAppParser::default();
        let file = InputFile::new("family_chat.txt", "[1/2/2024, 09:00] Alice: hi");
        let messages = parser.parse(&file).unwrap();
        assert_eq!(messages[0].channel.as_deref(), Some("family_chat"));
        assert_eq!(messages[0].platform, Platform::WhatsApp);
    }
}
