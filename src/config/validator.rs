use crate::config::{Config, CONFIG_SCHEMA_VERSION};
use crate::error::{CommsiftError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_parsing(config, &mut errors);
        Self::validate_analysis(config, &mut errors);
        Self::validate_correlation(config, &mut errors);
        Self::validate_logging(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CommsiftError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != CONFIG_SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        let cache_file = config.storage.cache_file.trim();
        if cache_file.is_empty() {
            errors.push(ValidationError::new(
                "storage.cache_file",
                "Cache file name cannot be empty",
            ));
        } else if cache_file.contains('/') || cache_file.contains('\\') {
            errors.push(ValidationError::new(
                "storage.cache_file",
                format!("Cache file must be a plain file name, got '{}'", cache_file),
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.schema_version.trim().is_empty() {
            errors.push(ValidationError::new(
                "cache.schema_version",
                "Cache schema version cannot be empty",
            ));
        }
    }

    fn validate_parsing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.parsing.csv_sniff_bytes == 0 {
            errors.push(ValidationError::new(
                "parsing.csv_sniff_bytes",
                "CSV sniff window must be greater than 0",
            ));
        }
    }

    fn validate_analysis(config: &Config, errors: &mut Vec<ValidationError>) {
        let threshold = config.analysis.risk_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            errors.push(ValidationError::new(
                "analysis.risk_threshold",
                format!("Risk threshold must be a non-negative number, got {}", threshold),
            ));
        }

        for (idx, keyword) in config.analysis.critical_keywords.iter().enumerate() {
            if keyword.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("analysis.critical_keywords[{}]", idx),
                    "Keyword cannot be empty",
                ));
            } else if keyword != &keyword.to_lowercase() {
                // Matching runs against lowercased text
                errors.push(ValidationError::new(
                    format!("analysis.critical_keywords[{}]", idx),
                    format!("Keyword must be lowercase, got '{}'", keyword),
                ));
            }
        }
    }

    fn validate_correlation(config: &Config, errors: &mut Vec<ValidationError>) {
        for (alias, canonical) in &config.correlation.aliases {
            if canonical.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("correlation.aliases.{}", alias),
                    "Alias target cannot be empty",
                ));
            }
        }
    }

    fn validate_logging(config: &Config, errors: &mut Vec<ValidationError>) {
        let level = config.logging.level.to_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "Level must be one of {:?}, got '{}'",
                    valid_levels, config.logging.level
                ),
            ));
        }
    }
}
