use commsift::analysis::{AnalysisEnvelope, AnalysisPipeline, MessageScorer, THRESHOLD_MARKER};
use commsift::config::{AnalysisConfig, CorrelationConfig};
use commsift::error::{CommsiftError, Result};
use commsift::ingest::{IngestionCoordinator, InputFile};
use commsift::message::{Message, Platform, ScoreValue, Scores, Severity};

const WHATSAPP_EXPORT: &str = "\
[12/11/2025, 21:45] Alice: pay or I leak the photos
[12/11/2025, 21:50] Bob: please stop
";

const SLACK_EXPORT: &str = r#"[
  {"user": "U1", "user_profile": {"display_name": "alice"}, "text": "this is extortion", "ts": "1762984800"}
]"#;

const EML_EXPORT: &str = "\
From: Alice <alice@example.com>
To: Bob <bob@example.com>
Subject: Last warning
Date: Wed, 12 Nov 2025 20:00:00 +0000

Transfer the money or this becomes a threat to your family.
";

fn extortion_upload() -> Vec<InputFile> {
    vec![
        InputFile::new("WhatsApp Chat with Bob.txt", WHATSAPP_EXPORT),
        InputFile::new("general.json", SLACK_EXPORT),
        InputFile::new("evidence.eml", EML_EXPORT),
    ]
}

fn alias_config() -> CorrelationConfig {
    let mut config = CorrelationConfig::default();
    config
        .aliases
        .insert("Alice <alice@example.com>".to_string(), "alice".to_string());
    config
}

/// Scores every message mentioning money as high risk
struct MoneyScorer;

impl MessageScorer for MoneyScorer {
    fn name(&self) -> &str {
        "money"
    }

    fn score(&self, message: &Message) -> Result<Scores> {
        let mut scores = Scores::neutral();
        if message.text.to_lowercase().contains("money") {
            scores.insert("risk", ScoreValue::Number(9.0));
        }
        Ok(scores)
    }
}

struct BrokenScorer;

impl MessageScorer for BrokenScorer {
    fn name(&self) -> &str {
        "broken"
    }

    fn score(&self, _message: &Message) -> Result<Scores> {
        Err(CommsiftError::Scoring {
            scorer: "broken".to_string(),
            message: "model unavailable".to_string(),
        })
    }
}

#[test]
fn test_cross_platform_extortion_case() {
    let grouped = IngestionCoordinator::default().ingest(&extortion_upload());
    let pipeline = AnalysisPipeline::new(&AnalysisConfig::default(), &alias_config());

    let envelope = pipeline.run(&grouped);
    let report = envelope.report().expect("analysis should succeed");

    assert_eq!(report.messages.len(), 4);
    assert!(report.diagnostics.is_empty());

    let counts = report.risk_summary.incident_counts;
    assert_eq!(counts.high, 3);
    assert_eq!(counts.medium, 0);
    assert_eq!(counts.low, 1);

    let keywords: Vec<&str> = report
        .patterns
        .top_keywords
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    for keyword in ["leak", "extortion", "threat"] {
        assert!(keywords.contains(&keyword), "missing {}", keyword);
    }

    // Email 20:00 UTC, WhatsApp 21:45 and 21:50, Slack 22:00 UTC
    let order: Vec<Platform> = report.timeline.iter().map(|e| e.platform).collect();
    assert_eq!(
        order,
        vec![
            Platform::Email,
            Platform::WhatsApp,
            Platform::WhatsApp,
            Platform::Slack
        ]
    );

    let correlation = &report.correlation;
    assert_eq!(correlation.merged.len(), 4);
    assert_eq!(correlation.unique_senders, vec!["alice", "bob"]);
    assert_eq!(correlation.counts_by_platform[&Platform::WhatsApp], 2);
    assert_eq!(correlation.counts_by_platform[&Platform::Slack], 1);
    assert_eq!(correlation.counts_by_platform[&Platform::Email], 1);

    assert_eq!(report.risk_summary.timeline, report.timeline);
    assert_eq!(report.risk_summary.patterns, report.patterns);
}

#[test]
fn test_plugged_scorer_crosses_threshold() {
    let grouped = IngestionCoordinator::default().ingest(&extortion_upload());
    let pipeline = AnalysisPipeline::default().with_scorer(Box::new(MoneyScorer));

    let envelope = pipeline.run(&grouped);
    let report = envelope.report().unwrap();

    let email = report
        .messages
        .iter()
        .find(|m| m.platform == Platform::Email)
        .unwrap();
    let analysis = email.incident_analysis.as_ref().unwrap();
    assert_eq!(analysis.score, 9.0);
    assert!(analysis.triggers.contains(&"threat".to_string()));
    assert!(analysis.triggers.contains(&THRESHOLD_MARKER.to_string()));
    assert_eq!(analysis.severity, Severity::High);
    assert!(email.flags.contains(&THRESHOLD_MARKER.to_string()));
}

#[test]
fn test_scorer_error_becomes_error_envelope() {
    let grouped = IngestionCoordinator::default().ingest(&extortion_upload());
    let pipeline = AnalysisPipeline::default().with_scorer(Box::new(BrokenScorer));

    let envelope = pipeline.run(&grouped);
    assert!(!envelope.is_ok());
    assert_eq!(envelope.status(), "error");
    assert!(envelope.error_message().unwrap().contains("model unavailable"));
    assert!(envelope.messages().is_empty());

    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json.get("trace").is_some());
}

#[test]
fn test_unorderable_timestamp_degrades_not_fails() {
    let messages = vec![
        Message::new(Platform::Skype, "1", "later").with_timestamp("2025-11-12T10:00:00"),
        Message::new(Platform::Skype, "2", "garbled").with_timestamp("yesterday-ish"),
        Message::new(Platform::Skype, "3", "no time"),
    ];

    let envelope = AnalysisPipeline::default().run_messages(&messages);
    let report = envelope.report().unwrap();

    // Unorderable and empty timestamps sort first, in input order
    let contents: Vec<&str> = report.timeline.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["garbled", "no time", "later"]);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.starts_with("timeline:")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.starts_with("correlation:")));
}

#[test]
fn test_run_is_deterministic() {
    let grouped = IngestionCoordinator::default().ingest(&extortion_upload());
    let pipeline = AnalysisPipeline::default();

    let first = serde_json::to_string(&pipeline.run(&grouped)).unwrap();
    let second = serde_json::to_string(&pipeline.run(&grouped)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_envelope_round_trips() {
    let grouped = IngestionCoordinator::default().ingest(&extortion_upload());
    let envelope = AnalysisPipeline::default().run(&grouped);

    let json = serde_json::to_string(&envelope).unwrap();
    let back: AnalysisEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(back, envelope);
}
