// Analysis pipeline for ingested messages
//
// Stage order: scoring -> incident flagging -> pattern aggregation ->
// platform correlation -> timeline -> risk orchestration.
// Each stage reads the previous stage's output and returns new values; the
// caller's messages are never modified.

mod aggregator;
mod correlator;
mod flagger;
mod risk;
mod scorer;
mod timeline;
mod types;

pub use aggregator::{aggregate, TOP_N};
pub use correlator::PlatformCorrelator;
pub use flagger::{IncidentFlagger, THRESHOLD_MARKER};
pub use risk::{incident_counts, orchestrate};
pub use scorer::{score_messages, MessageScorer, NeutralScorer};
pub use timeline::build_timeline;
pub use types::{
    AnalysisEnvelope, AnalysisReport, CorrelationSummary, IncidentCounts, PatternSummary,
    RiskSummary, StageOutcome, TimelineEntry,
};

use crate::config::{AnalysisConfig, Config, CorrelationConfig};
use crate::error::{panic_message, CommsiftError, Result};
use crate::ingest::ParsedByPlatform;
use crate::message::Message;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Pipeline driver: flattens ingested buckets and runs every stage in order
pub struct AnalysisPipeline {
    scorer: Box<dyn MessageScorer>,
    flagger: IncidentFlagger,
    correlator: PlatformCorrelator,
}

impl AnalysisPipeline {
    /// Create a pipeline with the neutral placeholder scorer
    pub fn new(analysis: &AnalysisConfig, correlation: &CorrelationConfig) -> Self {
        Self {
            scorer: Box::new(NeutralScorer),
            flagger: IncidentFlagger::new(analysis),
            correlator: PlatformCorrelator::new(correlation),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.analysis, &config.correlation)
    }

    /// Replace the scoring model
    pub fn with_scorer(mut self, scorer: Box<dyn MessageScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// All messages of every bucket in platform order; failure records are skipped
    pub fn flatten(parsed: &ParsedByPlatform) -> Vec<Message> {
        let messages: Vec<Message> = parsed
            .iter()
            .flat_map(|(_, bucket)| bucket.messages().cloned())
            .collect();

        let skipped = parsed.failure_count();
        if skipped > 0 {
            tracing::info!("Skipped {} parse failure records while flattening", skipped);
        }

        messages
    }

    /// Run every stage over a flat message list
    ///
    /// Per-message fallbacks are collected into `diagnostics`; only a scorer
    /// error fails the run.
    pub fn analyze(&self, messages: &[Message]) -> Result<AnalysisReport> {
        let start = Instant::now();
        let mut diagnostics = Vec::new();

        let scored = score_messages(self.scorer.as_ref(), messages)?;

        let flagged = self.flagger.flag(&scored);
        diagnostics.extend(flagged.causes().iter().map(|c| format!("flagging: {}", c)));
        let flagged = flagged.into_data();

        let patterns = aggregate(&flagged);

        let correlation = self.correlator.correlate(&flagged);
        diagnostics.extend(correlation.causes().iter().map(|c| format!("correlation: {}", c)));
        let correlation = correlation.into_data();

        let timeline = build_timeline(&flagged);
        diagnostics.extend(timeline.causes().iter().map(|c| format!("timeline: {}", c)));
        let timeline = timeline.into_data();

        let risk_summary = orchestrate(&flagged, &patterns, &correlation, &timeline);

        tracing::info!(
            "Analyzed {} messages in {}ms: {} high, {} medium, {} low",
            flagged.len(),
            start.elapsed().as_millis(),
            risk_summary.incident_counts.high,
            risk_summary.incident_counts.medium,
            risk_summary.incident_counts.low
        );
        if !diagnostics.is_empty() {
            tracing::warn!("Analysis completed with {} fallbacks", diagnostics.len());
        }

        Ok(AnalysisReport {
            messages: flagged,
            patterns,
            correlation,
            timeline,
            risk_summary,
            diagnostics,
        })
    }

    /// Run over a flat message list, converting any failure into an error envelope
    pub fn run_messages(&self, messages: &[Message]) -> AnalysisEnvelope {
        match catch_unwind(AssertUnwindSafe(|| self.analyze(messages))) {
            Ok(Ok(report)) => AnalysisEnvelope::Ok(report),
            Ok(Err(e)) => {
                tracing::error!("Analysis failed: {}", e);
                AnalysisEnvelope::error(e.to_string(), e.trace())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Analysis panicked: {}", message);
                let err = CommsiftError::Pipeline {
                    stage: "analysis".to_string(),
                    message: format!("panicked: {}", message),
                };
                AnalysisEnvelope::error(message, err.trace())
            }
        }
    }

    /// Entry point: flatten the ingested grouping and analyze it
    pub fn run(&self, parsed: &ParsedByPlatform) -> AnalysisEnvelope {
        let messages = Self::flatten(parsed);
        self.run_messages(&messages)
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default(), &CorrelationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{IngestRecord, ParseFailure};
    use crate::message::{Platform, Scores, Severity};

    struct PanickingScorer;

    impl MessageScorer for PanickingScorer {
        fn name(&self) -> &str {
            "panicking"
        }

        fn score(&self, _message: &Message) -> Result<Scores> {
            panic!("model weights missing")
        }
    }

    struct FailingScorer;

    impl MessageScorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        fn score(&self, _message: &Message) -> Result<Scores> {
            Err(CommsiftError::Scoring {
                scorer: "failing".to_string(),
                message: "backend unavailable".to_string(),
            })
        }
    }

    fn sample() -> ParsedByPlatform {
        let mut parsed = ParsedByPlatform::default();
        parsed.whatsapp.extend_messages(vec![
            Message::new(Platform::WhatsApp, "1", "this is an extortion attempt")
                .with_sender("Alice")
                .with_timestamp("2024-02-01T09:00:00"),
            Message::new(Platform::WhatsApp, "2", "ok see you")
                .with_sender("Bob")
                .with_timestamp("2024-02-01T09:05:00"),
        ]);
        parsed.slack.extend_messages(vec![Message::new(Platform::Slack, "3", "deploy done")
            .with_sender("alice")
            .with_timestamp("2024-02-01T08:00:00")]);
        parsed.unknown.push(IngestRecord::Failure(ParseFailure {
            filename: "x.png".to_string(),
            error: "Unrecognized file type: x.png".to_string(),
            trace: String::new(),
        }));
        parsed
    }

    #[test]
    fn test_flatten_skips_failures() {
        let messages = AnalysisPipeline::flatten(&sample());
        let ids: Vec<_> = messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_full_run() {
        let envelope = AnalysisPipeline::default().run(&sample());
        let report = envelope.report().expect("ok envelope");

        assert_eq!(report.messages.len(), 3);
        assert!(report.messages.iter().all(|m| m.scores.is_some()));
        assert_eq!(report.messages[0].severity(), Severity::High);

        let counts = report.risk_summary.incident_counts;
        assert_eq!((counts.high, counts.medium, counts.low), (1, 0, 2));

        assert_eq!(report.timeline[0].sender, "alice");
        assert_eq!(report.correlation.unique_senders, vec!["alice", "bob"]);
        assert_eq!(report.patterns.top_keywords, vec![("extortion".to_string(), 1)]);
        assert_eq!(report.risk_summary.timeline, report.timeline);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_rerun_gives_same_counts() {
        let pipeline = AnalysisPipeline::default();
        let messages = AnalysisPipeline::flatten(&sample());
        let first = pipeline.run_messages(&messages);
        let second = pipeline.run_messages(&messages);
        assert_eq!(
            first.report().unwrap().risk_summary.incident_counts,
            second.report().unwrap().risk_summary.incident_counts
        );
    }

    #[test]
    fn test_scorer_error_becomes_error_envelope() {
        let pipeline = AnalysisPipeline::default().with_scorer(Box::new(FailingScorer));
        let envelope = pipeline.run(&sample());

        assert!(!envelope.is_ok());
        assert_eq!(
            envelope.error_message(),
            Some("Scorer 'failing' failed: backend unavailable")
        );
        assert!(envelope.messages().is_empty());
    }

    #[test]
    fn test_panic_becomes_error_envelope() {
        let pipeline = AnalysisPipeline::default().with_scorer(Box::new(PanickingScorer));
        let envelope = pipeline.run(&sample());
        assert_eq!(envelope.error_message(), Some("model weights missing"));
        assert!(envelope.timeline().is_empty());
        match envelope {
            AnalysisEnvelope::Error { trace, .. } => {
                assert_eq!(
                    trace,
                    "Pipeline stage 'analysis' failed: panicked: model weights missing"
                );
            }
            other => panic!("expected error envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_grouping_is_ok() {
        let envelope = AnalysisPipeline::default().run(&ParsedByPlatform::default());
        assert!(envelope.is_ok());
        assert!(envelope.messages().is_empty());
    }

    #[test]
    fn test_unparseable_timestamp_recorded_in_diagnostics() {
        let mut parsed = ParsedByPlatform::default();
        parsed.skype.extend_messages(vec![
            Message::new(Platform::Skype, "1", "hi").with_timestamp("someday")
        ]);
        let envelope = AnalysisPipeline::default().run(&parsed);
        let report = envelope.report().unwrap();
        assert!(report.diagnostics.iter().any(|d| d.starts_with("timeline:")));
        assert!(report.diagnostics.iter().any(|d| d.starts_with("correlation:")));
    }
}
