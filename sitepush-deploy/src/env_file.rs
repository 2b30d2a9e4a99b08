//! `.env`-style credential loading.
//!
//! Best-effort local I/O: a missing file yields an empty set so callers fall
//! back to defaults, and lines without `=` are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

pub const KEY_HOST: &str = "FTP_HOST";
pub const KEY_USER: &str = "FTP_USER";
pub const KEY_PASS: &str = "FTP_PASS";
pub const KEY_PORT: &str = "FTP_PORT";
pub const KEY_REMOTE_ROOT: &str = "FTP_REMOTE_ROOT";
pub const KEY_SITE_URL: &str = "SITE_URL";

/// Named secrets and settings read once at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Loads credentials from `path`. A missing or unreadable file yields an
    /// empty set.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let creds = Self::parse(&contents);
                debug!("loaded {} keys from {}", creds.len(), path.display());
                creds
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no credential file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("could not read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Parses `KEY=value` lines.
    pub fn parse(contents: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only; values may hold secrets.
        f.debug_struct("Credentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Strips one layer of matching single or double quotes.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_strips_matching_pair_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("\"\"x\"\""), "\"x\"");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("''"), "");
    }
}
