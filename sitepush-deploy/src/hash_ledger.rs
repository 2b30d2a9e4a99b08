//! Local record of content hashes for uploaded files.
//!
//! Used only by [`CompareMode::Hash`](crate::config::CompareMode::Hash): a
//! file whose remote size matches is still re-sent unless the ledger holds
//! the same SHA-256 from an earlier successful upload.

use crate::error::DeployResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// One uploaded file as last seen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sha256: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Relative path -> last uploaded content hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashLedger {
    #[serde(default)]
    entries: BTreeMap<String, LedgerEntry>,
}

impl HashLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ledger. Missing or unreadable ledgers load empty, which only
    /// costs re-uploads.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("could not read hash ledger {}: {e}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("ignoring corrupt hash ledger {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Writes the ledger atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> DeployResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!("saved {} ledger entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// True if the ledger saw exactly this content at `relative`.
    pub fn matches(&self, relative: &str, size: u64, sha256: &str) -> bool {
        self.entries
            .get(relative)
            .is_some_and(|e| e.size == size && e.sha256 == sha256)
    }

    pub fn record(&mut self, relative: &str, size: u64, sha256: String) {
        self.entries.insert(
            relative.to_string(),
            LedgerEntry {
                sha256,
                size,
                uploaded_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, relative: &str) -> Option<&LedgerEntry> {
        self.entries.get(relative)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hex SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
