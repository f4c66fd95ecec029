//! Fileset fingerprinting with BLAKE3
//!
//! The key covers file names, exact bytes and upload order. Reordering the
//! same files yields a different key.

use crate::ingest::InputFile;
use serde::{Deserialize, Serialize};

/// Key used for an empty upload
pub const EMPTY_FILESET_KEY: &str = "EMPTY_FILES";

/// Identity of one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    /// BLAKE3 of the exact bytes, 64 hex characters
    pub hash: String,
}

/// Hash data using BLAKE3, full-length hex
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Compute the cache key and per-file metadata for an ordered fileset
pub fn fingerprint(files: &[InputFile]) -> (String, Vec<FileMeta>) {
    if files.is_empty() {
        return (EMPTY_FILESET_KEY.to_string(), Vec::new());
    }

    let files_meta: Vec<FileMeta> = files
        .iter()
        .map(|f| FileMeta {
            name: f.name.clone(),
            hash: hash_bytes(f.bytes()),
        })
        .collect();

    let combined = files_meta
        .iter()
        .map(|m| format!("{}:{}", m.name, m.hash))
        .collect::<Vec<_>>()
        .join("|");

    (hash_bytes(combined.as_bytes()), files_meta)
}
