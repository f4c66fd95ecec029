// Timeline construction
use super::types::{StageOutcome, TimelineEntry};
use crate::message::{is_unorderable, timestamp_key, Message};

/// Chronological view of every message
///
/// Missing or unparseable timestamps order as the earliest time; ties keep
/// input order. The output always has one entry per input message.
pub fn build_timeline(messages: &[Message]) -> StageOutcome<Vec<TimelineEntry>> {
    let mut keyed: Vec<_> = messages
        .iter()
        .map(|m| (timestamp_key(&m.timestamp), m))
        .collect();
    keyed.sort_by_key(|(key, _)| *key);

    let timeline: Vec<TimelineEntry> = keyed
        .into_iter()
        .map(|(_, m)| TimelineEntry::from_message(m, m.display_sender()))
        .collect();

    let unorderable: Vec<String> = messages
        .iter()
        .filter(|m| is_unorderable(&m.timestamp))
        .map(|m| format!("message {} has unparseable timestamp '{}'", m.message_id, m.timestamp))
        .collect();

    StageOutcome::from_causes(timeline, unorderable)
}
