//! Result cache keyed on the fileset fingerprint
//!
//! A single JSON document maps fingerprint to entry. Entries are decoded one
//! at a time, so an entry of another shape only hides itself. Writes go to a
//! uniquely named temp file in the same directory that is synced and renamed
//! over the original. A missing, unreadable or corrupt file reads as an empty
//! cache.

mod fingerprint;

pub use fingerprint::{fingerprint, hash_bytes, FileMeta, EMPTY_FILESET_KEY};

use crate::analysis::AnalysisEnvelope;
use crate::error::{CommsiftError, Result};
use crate::ingest::ParsedByPlatform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One stored analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub files: Vec<FileMeta>,
    pub parsed_by_platform: ParsedByPlatform,
    pub analysis: AnalysisEnvelope,
    /// RFC 3339, UTC
    pub created_at: String,
    pub schema_version: String,
}

/// On-disk cache of successful analyses
pub struct AnalysisCache {
    path: PathBuf,
    schema_version: String,
}

impl AnalysisCache {
    pub fn new(path: PathBuf, schema_version: impl Into<String>) -> Self {
        Self {
            path,
            schema_version: schema_version.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Entry for `key`, or `None` when absent, stored by another schema
    /// version, or not readable as an entry
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.load();
        let raw = entries.remove(key)?;

        let version = raw.get("schema_version").and_then(Value::as_str);
        if version != Some(self.schema_version.as_str()) {
            tracing::info!(
                "Cache entry {} has schema {}, expected {}; ignoring",
                short(key),
                version.unwrap_or("<none>"),
                self.schema_version
            );
            return None;
        }

        match serde_json::from_value(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Cache entry {} is unreadable, ignoring: {}", short(key), e);
                None
            }
        }
    }

    /// Store a finished analysis; failures are logged and swallowed
    pub fn store(
        &self,
        key: &str,
        files: &[FileMeta],
        parsed_by_platform: &ParsedByPlatform,
        analysis: &AnalysisEnvelope,
    ) -> bool {
        match self.try_store(key, files, parsed_by_platform, analysis) {
            Ok(()) => {
                tracing::info!("Stored analysis in cache under {}", short(key));
                true
            }
            Err(e) => {
                tracing::warn!("Failed to store analysis in cache: {}", e);
                false
            }
        }
    }

    /// Store a finished analysis, replacing any entry under the same key
    pub fn try_store(
        &self,
        key: &str,
        files: &[FileMeta],
        parsed_by_platform: &ParsedByPlatform,
        analysis: &AnalysisEnvelope,
    ) -> Result<()> {
        let entry = CacheEntry {
            files: files.to_vec(),
            parsed_by_platform: parsed_by_platform.clone(),
            analysis: analysis.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            schema_version: self.schema_version.clone(),
        };
        let entry = serde_json::to_value(&entry).map_err(|e| CommsiftError::Json {
            source: e,
            context: "Failed to serialize cache entry".to_string(),
        })?;

        // Other entries are carried over as stored, whatever their shape
        let mut entries = self.load();
        entries.insert(key.to_string(), entry);

        let data = serde_json::to_vec_pretty(&entries).map_err(|e| CommsiftError::Json {
            source: e,
            context: "Failed to serialize analysis cache".to_string(),
        })?;
        self.write_atomic(&data)
    }

    /// Number of stored entries, regardless of schema version or shape
    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self) -> BTreeMap<String, Value> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Cannot read cache file {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cache file {} is corrupt, treating as empty: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn write_atomic(&self, data: &[u8]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| CommsiftError::Config("Invalid cache path".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to create cache directory: {}", parent.display()),
        })?;

        // One temp file per writer; concurrent stores never share it
        let mut file = NamedTempFile::new_in(parent).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to create temp cache file in: {}", parent.display()),
        })?;
        file.write_all(data).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to write cache data: {}", file.path().display()),
        })?;
        file.as_file().sync_all().map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to sync cache file: {}", file.path().display()),
        })?;

        file.persist(&self.path).map_err(|e| CommsiftError::Io {
            context: format!(
                "Failed to rename temp cache to final location: {} -> {}",
                e.file.path().display(),
                self.path.display()
            ),
            source: e.error,
        })?;

        Ok(())
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}
