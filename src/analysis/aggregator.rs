// Pattern aggregation: most active senders and most frequent flags
use super::types::PatternSummary;
use crate::message::Message;
use ahash::AHashMap;

/// Entries kept in each ranked list
pub const TOP_N: usize = 5;

/// Counter that remembers first-encounter order for tie-breaking
#[derive(Default)]
struct OrderedCounter {
    counts: Vec<(String, usize)>,
    index: AHashMap<String, usize>,
}

impl OrderedCounter {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.counts.len());
                self.counts.push((key.to_string(), 1));
            }
        }
    }

    /// Highest counts first; equal counts keep encounter order
    fn top(mut self, n: usize) -> Vec<(String, usize)> {
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts.truncate(n);
        self.counts
    }
}

/// Rank senders and flags across the message stream
pub fn aggregate(messages: &[Message]) -> PatternSummary {
    let mut senders = OrderedCounter::default();
    let mut keywords = OrderedCounter::default();

    for message in messages {
        senders.add(message.display_sender());
        for flag in &message.flags {
            keywords.add(flag);
        }
    }

    PatternSummary {
        top_senders: senders.top(TOP_N),
        top_keywords: keywords.top(TOP_N),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Platform, UNKNOWN_SENDER};
    use proptest::prelude::*;

    fn from(sender: &str, flags: &[&str]) -> Message {
        let mut msg = Message::new(Platform::Slack, "1", "x").with_sender(sender);
        msg.flags = flags.iter().map(|f| f.to_string()).collect();
        msg
    }

    #[test]
    fn test_ranking_and_ties_keep_encounter_order() {
        let messages = vec![
            from("carol", &["leak"]),
            from("alice", &["threat"]),
            from("bob", &["leak", "threat"]),
            from("alice", &[]),
            from("bob", &[]),
        ];
        let summary = aggregate(&messages);

        assert_eq!(
            summary.top_senders,
            vec![
                ("alice".to_string(), 2),
                ("bob".to_string(), 2),
                ("carol".to_string(), 1)
            ]
        );
        assert_eq!(
            summary.top_keywords,
            vec![("leak".to_string(), 2), ("threat".to_string(), 2)]
        );
    }

    #[test]
    fn test_sender_fallbacks() {
        let mut with_id = from("", &[]);
        with_id.sender_id = Some("U42".to_string());
        let summary = aggregate(&[with_id, from("  ", &[])]);

        assert_eq!(
            summary.top_senders,
            vec![("U42".to_string(), 1), (UNKNOWN_SENDER.to_string(), 1)]
        );
    }

    #[test]
    fn test_truncates_to_top_five() {
        let messages: Vec<Message> = (0..8)
            .map(|i| from(&format!("user{}", i), &[&format!("flag{}", i)]))
            .collect();
        let summary = aggregate(&messages);
        assert_eq!(summary.top_senders.len(), TOP_N);
        assert_eq!(summary.top_senders[0].0, "user0");
        assert_eq!(summary.top_keywords.len(), TOP_N);
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&[]);
        assert!(summary.top_senders.is_empty());
        assert!(summary.top_keywords.is_empty());
    }

    proptest! {
        #[test]
        fn prop_bounded_and_counts_consistent(
            rows in prop::collection::vec(
                (0usize..4, prop::collection::vec(0usize..3, 0..3)),
                0..40,
            )
        ) {
            let messages: Vec<Message> = rows
                .iter()
                .map(|(s, flags)| {
                    let flags: Vec<String> = flags.iter().map(|f| format!("k{}", f)).collect();
                    let refs: Vec<&str> = flags.iter().map(String::as_str).collect();
                    from(&format!("s{}", s), &refs)
                })
                .collect();
            let summary = aggregate(&messages);

            prop_assert!(summary.top_senders.len() <= TOP_N);
            prop_assert!(summary.top_keywords.len() <= TOP_N);
            // At most four distinct senders, so nothing is truncated
            let sender_total: usize = summary.top_senders.iter().map(|(_, n)| n).sum();
            prop_assert_eq!(sender_total, messages.len());
            let flag_total: usize = summary.top_keywords.iter().map(|(_, n)| n).sum();
            let expected: usize = messages.iter().map(|m| m.flags.len()).sum();
            prop_assert_eq!(flag_total, expected);
            prop_assert!(summary.top_senders.windows(2).all(|w| w[0].1 >= w[1].1));
        }
    }
}
