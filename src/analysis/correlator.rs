// Cross-platform correlation: one identity-normalized, time-ordered stream
use super::types::{CorrelationSummary, StageOutcome, TimelineEntry};
use crate::config::CorrelationConfig;
use crate::message::{is_unorderable, timestamp_key, Message, Platform, UNKNOWN_SENDER};
use std::collections::{BTreeMap, BTreeSet};

/// Merges per-platform groups and normalizes sender identities
#[derive(Debug, Clone, Default)]
pub struct PlatformCorrelator {
    /// Normalized alias to canonical identity
    aliases: BTreeMap<String, String>,
}

impl PlatformCorrelator {
    pub fn new(config: &CorrelationConfig) -> Self {
        let aliases = config
            .aliases
            .iter()
            .map(|(alias, canonical)| (alias.trim().to_lowercase(), canonical.clone()))
            .collect();
        Self { aliases }
    }

    /// Lowercase and trim, then resolve through the alias table
    pub fn normalize_sender(&self, sender: &str) -> String {
        let normalized = sender.trim().to_lowercase();
        if normalized.is_empty() {
            return UNKNOWN_SENDER.to_string();
        }
        self.aliases.get(&normalized).cloned().unwrap_or(normalized)
    }

    pub fn correlate(&self, messages: &[Message]) -> StageOutcome<CorrelationSummary> {
        // Groups in first-seen platform order
        let mut groups: Vec<(Platform, Vec<&Message>)> = Vec::new();
        for message in messages {
            match groups.iter_mut().find(|(p, _)| *p == message.platform) {
                Some((_, group)) => group.push(message),
                None => groups.push((message.platform, vec![message])),
            }
        }

        let counts_by_platform: BTreeMap<Platform, usize> =
            groups.iter().map(|(p, g)| (*p, g.len())).collect();

        let mut merged: Vec<TimelineEntry> = groups
            .iter()
            .flat_map(|(_, group)| group.iter())
            .map(|m| TimelineEntry::from_message(m, self.normalize_sender(m.display_sender())))
            .collect();
        merged.sort_by_key(|entry| timestamp_key(&entry.timestamp));

        let unique_senders: Vec<String> = merged
            .iter()
            .map(|e| e.sender.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let unorderable = merged.iter().filter(|e| is_unorderable(&e.timestamp)).count();
        let mut causes = Vec::new();
        if unorderable > 0 {
            tracing::warn!("{} messages have unparseable timestamps", unorderable);
            causes.push(format!(
                "{} messages with unparseable timestamps ordered as earliest",
                unorderable
            ));
        }

        StageOutcome::from_causes(
            CorrelationSummary {
                merged,
                counts_by_platform,
                unique_senders,
            },
            causes,
        )
    }
}
