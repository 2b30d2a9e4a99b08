//! Deploy configuration.

use crate::env_file::{
    Credentials, KEY_HOST, KEY_PASS, KEY_PORT, KEY_REMOTE_ROOT, KEY_SITE_URL, KEY_USER,
};
use crate::error::{DeployError, DeployResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How the engine decides whether a remote file is already up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Remote size equals local size.
    #[default]
    Size,
    /// Size equality plus a matching SHA-256 in the local hash ledger.
    Hash,
}

impl std::str::FromStr for CompareMode {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "size" => Ok(CompareMode::Size),
            "hash" => Ok(CompareMode::Hash),
            other => Err(DeployError::Config(format!("unknown compare mode: {other}"))),
        }
    }
}

/// Configuration for a deploy run.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Remote FTP host.
    pub host: String,

    /// Control-channel port.
    pub port: u16,

    pub user: String,

    #[serde(skip_serializing)]
    #[serde(default)]
    pub password: String,

    /// Remote directory every relative path is placed under.
    pub remote_root: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Upload attempts per file, including the first.
    pub retry_attempts: u32,

    /// Fixed pause between attempts in milliseconds.
    pub retry_backoff_ms: u64,

    /// Successful uploads after which a session is closed and reopened.
    pub session_cycle_threshold: u32,

    pub compare: CompareMode,

    /// Public location printed after a successful run.
    pub site_url: Option<String>,
}

pub const DEFAULT_HOST: &str = "pixie-ss1-ftp.porkbun.com";

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 21,
            user: String::new(),
            password: String::new(),
            remote_root: "/".to_string(),
            connect_timeout_secs: 30,
            retry_attempts: 3,
            retry_backoff_ms: 2000,
            session_cycle_threshold: 50,
            compare: CompareMode::Size,
            site_url: None,
        }
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_root", &self.remote_root)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("session_cycle_threshold", &self.session_cycle_threshold)
            .field("compare", &self.compare)
            .field("site_url", &self.site_url)
            .finish()
    }
}

impl DeployConfig {
    /// Builds a config from defaults overlaid with recognised credential keys.
    pub fn from_credentials(creds: &Credentials) -> DeployResult<Self> {
        let mut config = Self::default();

        if let Some(host) = creds.get(KEY_HOST).filter(|h| !h.is_empty()) {
            config.host = host.to_string();
        }
        if let Some(user) = creds.get(KEY_USER) {
            config.user = user.to_string();
        }
        if let Some(pass) = creds.get(KEY_PASS) {
            config.password = pass.to_string();
        }
        if let Some(port) = creds.get(KEY_PORT).filter(|p| !p.is_empty()) {
            config.port = port
                .parse()
                .map_err(|_| DeployError::Config(format!("{KEY_PORT} is not a port: {port}")))?;
        }
        if let Some(root) = creds.get(KEY_REMOTE_ROOT).filter(|r| !r.is_empty()) {
            config.remote_root = normalize_remote_root(root);
        }
        if let Some(url) = creds.get(KEY_SITE_URL).filter(|u| !u.is_empty()) {
            config.site_url = Some(url.to_string());
        }

        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> DeployResult<()> {
        if self.host.trim().is_empty() {
            return Err(DeployError::Config("host must not be empty".into()));
        }
        if self.retry_attempts == 0 {
            return Err(DeployError::Config("retry_attempts must be at least 1".into()));
        }
        if self.session_cycle_threshold == 0 {
            return Err(DeployError::Config(
                "session_cycle_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Config with no backoff, for tests.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            host: "localhost".to_string(),
            retry_backoff_ms: 0,
            connect_timeout_secs: 1,
            ..Self::default()
        }
    }
}

/// Forces a leading `/` and drops trailing ones, keeping `/` itself.
pub fn normalize_remote_root(root: &str) -> String {
    let trimmed = root.trim().replace('\\', "/");
    let inner = trimmed.trim_matches('/');
    if inner.is_empty() {
        "/".to_string()
    } else {
        format!("/{inner}")
    }
}
