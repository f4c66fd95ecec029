// Scoring stage: the extension point for a real risk model
use crate::error::Result;
use crate::message::{Message, Scores};

/// Produces named signals for one message
///
/// Implementations must be deterministic for a given message; returning an
/// error fails the whole run.
pub trait MessageScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, message: &Message) -> Result<Scores>;
}

/// Placeholder scorer attaching the neutral signal set
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralScorer;

impl MessageScorer for NeutralScorer {
    fn name(&self) -> &str {
        "neutral"
    }

    fn score(&self, _message: &Message) -> Result<Scores> {
        Ok(Scores::neutral())
    }
}

/// Attach scores to every message that has none; scored messages pass through
pub fn score_messages(scorer: &dyn MessageScorer, messages: &[Message]) -> Result<Vec<Message>> {
    let mut scored = Vec::with_capacity(messages.len());
    let mut attached = 0usize;

    for message in messages {
        let mut next = message.clone();
        if next.scores.is_none() {
            next.scores = Some(scorer.score(message)?);
            attached += 1;
        }
        scored.push(next);
    }

    tracing::debug!(
        "Scorer {} attached scores to {} of {} messages",
        scorer.name(),
        attached,
        messages.len()
    );

    Ok(scored)
}
