//! Resilient incremental uploader for FTPS-hosted sites.
//!
//! Mirrors a local directory tree onto a remote file store with:
//! - Size-equality skip logic (optional SHA-256 ledger on top)
//! - Bounded per-file retries with a fixed backoff
//! - Proactive session cycling after a configurable number of transfers
//! - Best-effort directory creation and size probes that never abort a run
//! - Targeted push of individual files

pub mod config;
pub mod env_file;
pub mod error;
pub mod ftps_transport;
pub mod hash_ledger;
pub mod scan;
pub mod session;
pub mod sync_engine;
pub mod types;

pub use config::{CompareMode, DeployConfig};
pub use env_file::Credentials;
pub use error::{DeployError, DeployResult, SessionError, SessionResult};
pub use types::*;
