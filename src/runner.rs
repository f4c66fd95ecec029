// Analysis runner: fingerprint, cache check, ingest, analyze, cache store
use crate::analysis::{AnalysisEnvelope, AnalysisPipeline};
use crate::cache::{fingerprint, AnalysisCache};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestionCoordinator, InputFile, ParsedByPlatform};
use serde::{Deserialize, Serialize};

/// Error reported for a run with no input files
pub const NO_FILES_ERROR: &str = "No files uploaded.";

/// Whether the result came from the cache, and under which key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub used: bool,
    pub key: Option<String>,
}

/// Everything a host needs from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub parsed_by_platform: ParsedByPlatform,
    pub analysis: AnalysisEnvelope,
    pub cache: CacheStatus,
}

/// Host-facing entry point tying ingestion, cache and pipeline together
pub struct AnalysisRunner {
    coordinator: IngestionCoordinator,
    pipeline: AnalysisPipeline,
    cache: Option<AnalysisCache>,
}

impl AnalysisRunner {
    pub fn new(
        coordinator: IngestionCoordinator,
        pipeline: AnalysisPipeline,
        cache: Option<AnalysisCache>,
    ) -> Self {
        Self {
            coordinator,
            pipeline,
            cache,
        }
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = if config.cache.enabled {
            Some(AnalysisCache::new(
                config.cache_path()?,
                config.cache.schema_version.clone(),
            ))
        } else {
            None
        };

        Ok(Self::new(
            IngestionCoordinator::new(&config.parsing),
            AnalysisPipeline::from_config(config),
            cache,
        ))
    }

    pub fn cache(&self) -> Option<&AnalysisCache> {
        self.cache.as_ref()
    }

    /// Analyze one case's files, reusing a cached result when allowed
    pub fn analyze(&self, case_id: &str, files: &[InputFile], use_cache: bool) -> AnalysisRun {
        let span = tracing::info_span!("analysis", case = %case_id, files = files.len());
        let _enter = span.enter();

        if files.is_empty() {
            tracing::info!("No files to analyze");
            return AnalysisRun {
                parsed_by_platform: ParsedByPlatform::default(),
                analysis: AnalysisEnvelope::error(NO_FILES_ERROR, ""),
                cache: CacheStatus::default(),
            };
        }

        let (key, files_meta) = fingerprint(files);
        tracing::debug!(fingerprint = %key, "Computed fileset fingerprint");

        let cache = self.cache.as_ref().filter(|_| use_cache);
        if let Some(cache) = cache {
            if let Some(entry) = cache.lookup(&key) {
                tracing::info!("Cache hit for fileset");
                return AnalysisRun {
                    parsed_by_platform: entry.parsed_by_platform,
                    analysis: entry.analysis,
                    cache: CacheStatus {
                        used: true,
                        key: Some(key),
                    },
                };
            }
            tracing::info!("Cache miss for fileset");
        }

        let parsed_by_platform = self.coordinator.ingest(files);
        let analysis = self.pipeline.run(&parsed_by_platform);

        if let Some(cache) = cache {
            if analysis.is_ok() {
                cache.store(&key, &files_meta, &parsed_by_platform, &analysis);
            } else {
                tracing::info!("Not caching failed analysis");
            }
        }

        AnalysisRun {
            parsed_by_platform,
            analysis,
            cache: CacheStatus {
                used: false,
                key: Some(key),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> AnalysisRunner {
        AnalysisRunner::new(
            IngestionCoordinator::default(),
            AnalysisPipeline::default(),
            Some(AnalysisCache::new(dir.path().join("cache.json"), "1")),
        )
    }

    #[test]
    fn test_empty_fileset() {
        let temp_dir = TempDir::new().unwrap();
        let runner = runner(&temp_dir);
        let run = runner.analyze("case-1", &[], true);

        assert_eq!(run.analysis.error_message(), Some(NO_FILES_ERROR));
        assert!(run.analysis.messages().is_empty());
        assert!(run.analysis.patterns().top_senders.is_empty());
        assert!(run.analysis.timeline().is_empty());
        assert_eq!(run.cache, CacheStatus::default());
        assert!(!temp_dir.path().join("cache.json").exists());
    }

    #[test]
    fn test_second_run_hits_cache() {
        let temp_dir = TempDir::new().unwrap();
        let runner = runner(&temp_dir);
        let files = vec![InputFile::new("chat.txt", "[1/2/2024, 09:00] Alice: hi")];

        let first = runner.analyze("case-1", &files, true);
        assert!(!first.cache.used);
        assert!(first.analysis.is_ok());

        let second = runner.analyze("case-1", &files, true);
        assert!(second.cache.used);
        assert_eq!(second.cache.key, first.cache.key);
        assert_eq!(second.analysis, first.analysis);
        assert_eq!(second.parsed_by_platform, first.parsed_by_platform);
    }

    #[test]
    fn test_cache_bypass() {
        let temp_dir = TempDir::new().unwrap();
        let runner = runner(&temp_dir);
        let files = vec![InputFile::new("chat.txt", "[1/2/2024, 09:00] Alice: hi")];

        runner.analyze("case-1", &files, true);
        let run = runner.analyze("case-1", &files, false);
        assert!(!run.cache.used);
        assert!(run.cache.key.is_some());
    }

    #[test]
    fn test_without_cache() {
        let runner = AnalysisRunner::new(
            IngestionCoordinator::default(),
            AnalysisPipeline::default(),
            None,
        );
        let files = vec![InputFile::new("general.json", r#"[{"text": "hi"}]"#)];
        let first = runner.analyze("case-1", &files, true);
        let second = runner.analyze("case-1", &files, true);
        assert!(!first.cache.used);
        assert!(!second.cache.used);
    }
}
