// Incident flagging: keyword and score-threshold rules per message
use super::types::StageOutcome;
use crate::config::AnalysisConfig;
use crate::message::{IncidentAnalysis, Message, Severity};

/// Trigger and flag recorded when the risk score reaches the threshold
pub const THRESHOLD_MARKER: &str = "threshold_exceeded";

/// Rule-based incident detector
#[derive(Debug, Clone)]
pub struct IncidentFlagger {
    keywords: Vec<String>,
    threshold: f64,
}

impl IncidentFlagger {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            keywords: config
                .critical_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            threshold: config.risk_threshold,
        }
    }

    /// Numeric risk: the direct score, then `scores.risk`, then 0.0
    ///
    /// Values that cannot be read as a number count as 0.0.
    pub fn extract_score(message: &Message) -> f64 {
        if let Some(score) = message.score {
            return score;
        }
        message
            .scores
            .as_ref()
            .and_then(|s| s.risk())
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    /// Evaluate one message against the rules
    ///
    /// Keywords match regardless of the score. A NaN score never crosses the
    /// threshold and `+inf` always does; the recorded score is clamped to a
    /// finite value.
    pub fn evaluate(&self, message: &Message) -> IncidentAnalysis {
        let score = Self::extract_score(message);

        let text = message.text.to_lowercase();
        let mut triggers: Vec<String> = self
            .keywords
            .iter()
            .filter(|kw| text.contains(kw.as_str()))
            .cloned()
            .collect();
        let keyword_hit = !triggers.is_empty();
        let exceeded = score >= self.threshold;
        if exceeded {
            triggers.push(THRESHOLD_MARKER.to_string());
        }

        let severity = if keyword_hit {
            Severity::High
        } else if exceeded {
            Severity::Medium
        } else {
            Severity::Low
        };

        IncidentAnalysis {
            incident: !triggers.is_empty(),
            triggers,
            severity,
            score: clamp_score(score),
        }
    }

    /// Flag every message; non-finite scores are recorded as degradation causes
    pub fn flag(&self, messages: &[Message]) -> StageOutcome<Vec<Message>> {
        let mut flagged = Vec::with_capacity(messages.len());
        let mut causes = Vec::new();

        for message in messages {
            let mut next = message.clone();
            let analysis = self.evaluate(message);

            let raw = Self::extract_score(message);
            if !raw.is_finite() {
                tracing::warn!(
                    "Message {} has non-finite risk score {}, recorded as {}",
                    message.message_id,
                    raw,
                    analysis.score
                );
                causes.push(format!(
                    "message {}: risk score {} is not a finite number",
                    message.message_id, raw
                ));
            }

            for trigger in &analysis.triggers {
                next.add_flag(trigger.as_str());
            }
            next.incident_analysis = Some(analysis);
            flagged.push(next);
        }

        StageOutcome::from_causes(flagged, causes)
    }
}

/// Finite stand-in for a score: NaN reads as 0.0, infinities saturate
fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(f64::MIN, f64::MAX)
    }
}

impl Default for IncidentFlagger {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}
