use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for commsift
#[derive(Error, Debug)]
pub enum CommsiftError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A single input file could not be parsed
    #[error("Failed to parse {filename}: {message}")]
    Parse { filename: String, message: String },

    /// The pluggable scorer rejected a message
    #[error("Scorer '{scorer}' failed: {message}")]
    Scoring { scorer: String, message: String },

    /// Structural failure inside one analysis stage
    #[error("Pipeline stage '{stage}' failed: {message}")]
    Pipeline { stage: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Delimited text errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CommsiftError {
    /// Render the error and every `source()` below it, one per line.
    ///
    /// Used as the diagnostic `trace` attached to failure records and error
    /// envelopes.
    pub fn trace(&self) -> String {
        let mut lines = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        lines.join("\n")
    }
}

/// Best-effort text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for commsift operations
pub type Result<T> = std::result::Result<T, CommsiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_includes_source_chain() {
        let err = CommsiftError::Io {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            context: "Failed to read export".to_string(),
        };
        let trace = err.trace();
        assert!(trace.starts_with("IO error: Failed to read export"));
        assert!(trace.contains("caused by: gone"));
    }

    #[test]
    fn test_panic_message_downcasts() {
        let payload = std::panic::catch_unwind(|| panic!("bad input")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad input");

        let payload = std::panic::catch_unwind(|| panic!("{} files", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "3 files");
    }

    #[test]
    fn test_trace_without_source() {
        let err = CommsiftError::Pipeline {
            stage: "scoring".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.trace(), "Pipeline stage 'scoring' failed: boom");
    }
}
