// Risk orchestration: severity counts plus the upstream results under one roof
use super::types::{CorrelationSummary, IncidentCounts, PatternSummary, RiskSummary, TimelineEntry};
use crate::message::Message;

/// Count messages per severity tier; unflagged messages count as low
pub fn incident_counts(messages: &[Message]) -> IncidentCounts {
    let mut counts = IncidentCounts::default();
    for message in messages {
        counts.record(message.severity());
    }
    counts
}

/// Bundle already-computed stage outputs; nothing is recomputed here
pub fn orchestrate(
    flagged: &[Message],
    patterns: &PatternSummary,
    correlation: &CorrelationSummary,
    timeline: &[TimelineEntry],
) -> RiskSummary {
    RiskSummary {
        incident_counts: incident_counts(flagged),
        patterns: patterns.clone(),
        platform_correlation: correlation.clone(),
        timeline: timeline.to_vec(),
    }
}
