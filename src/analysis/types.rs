use crate::message::{Message, Platform, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a stage that can fall back instead of failing
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ok(T),
    /// Full output was produced, but some inputs needed a fallback
    Degraded { data: T, causes: Vec<String> },
}

impl<T> StageOutcome<T> {
    /// `Ok` when `causes` is empty, `Degraded` otherwise
    pub fn from_causes(data: T, causes: Vec<String>) -> Self {
        if causes.is_empty() {
            StageOutcome::Ok(data)
        } else {
            StageOutcome::Degraded { data, causes }
        }
    }

    pub fn data(&self) -> &T {
        match self {
            StageOutcome::Ok(data) => data,
            StageOutcome::Degraded { data, .. } => data,
        }
    }

    pub fn into_data(self) -> T {
        match self {
            StageOutcome::Ok(data) => data,
            StageOutcome::Degraded { data, .. } => data,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn causes(&self) -> &[String] {
        match self {
            StageOutcome::Ok(_) => &[],
            StageOutcome::Degraded { causes, .. } => causes,
        }
    }
}

/// Ranked senders and flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub top_senders: Vec<(String, usize)>,
    pub top_keywords: Vec<(String, usize)>,
}

/// One row of the merged stream or the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: String,
    pub platform: Platform,
    pub sender: String,
    pub content: String,
    pub score: f64,
    pub flags: Vec<String>,
}

impl TimelineEntry {
    /// Project a message, keeping its own sender label
    pub fn from_message(message: &Message, sender: impl Into<String>) -> Self {
        Self {
            timestamp: message.timestamp.clone(),
            platform: message.platform,
            sender: sender.into(),
            content: message.text.clone(),
            score: message.risk_score(),
            flags: message.flags.clone(),
        }
    }
}

/// Cross-platform merge of the message stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub merged: Vec<TimelineEntry>,
    pub counts_by_platform: BTreeMap<Platform, usize>,
    pub unique_senders: Vec<String>,
}

/// Messages per flagger severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl IncidentCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Final bundle read by report formatters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub incident_counts: IncidentCounts,
    pub patterns: PatternSummary,
    pub platform_correlation: CorrelationSummary,
    pub timeline: Vec<TimelineEntry>,
}

/// Payload of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub messages: Vec<Message>,
    pub patterns: PatternSummary,
    pub correlation: CorrelationSummary,
    pub timeline: Vec<TimelineEntry>,
    pub risk_summary: RiskSummary,
    /// Fallbacks taken by individual stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

static EMPTY_PATTERNS: PatternSummary = PatternSummary {
    top_senders: Vec::new(),
    top_keywords: Vec::new(),
};

/// Analysis result envelope; check the status before reading any field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisEnvelope {
    Ok(AnalysisReport),
    Error {
        error: String,
        #[serde(default)]
        trace: String,
    },
}

impl AnalysisEnvelope {
    pub fn error(error: impl Into<String>, trace: impl Into<String>) -> Self {
        AnalysisEnvelope::Error {
            error: error.into(),
            trace: trace.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisEnvelope::Ok(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            AnalysisEnvelope::Ok(_) => "ok",
            AnalysisEnvelope::Error { .. } => "error",
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisEnvelope::Ok(report) => Some(report),
            AnalysisEnvelope::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AnalysisEnvelope::Ok(_) => None,
            AnalysisEnvelope::Error { error, .. } => Some(error),
        }
    }

    /// Messages of a successful run, empty on error
    pub fn messages(&self) -> &[Message] {
        self.report().map(|r| r.messages.as_slice()).unwrap_or(&[])
    }

    pub fn patterns(&self) -> &PatternSummary {
        self.report().map(|r| &r.patterns).unwrap_or(&EMPTY_PATTERNS)
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        self.report().map(|r| r.timeline.as_slice()).unwrap_or(&[])
    }
}
