//! Incremental upload engine.
//!
//! One run is one sequential pass over an enumerated file list. For each
//! file the engine:
//! - opens a session if none is live (and re-enters the remote root)
//! - skips the file if the remote copy is current
//! - otherwise ensures the parent directories and uploads with a bounded
//!   retry loop, reconnecting between attempts
//! - cycles the session once it has carried `session_cycle_threshold`
//!   uploads
//!
//! The live session is threaded through [`SyncEngine::step`] by value; the
//! engine never stores it.

use crate::config::{CompareMode, DeployConfig};
use crate::error::{DeployResult, SessionResult};
use crate::hash_ledger::{HashLedger, file_sha256};
use crate::scan::{LocalFile, remote_parent, remote_target_path};
use crate::session::{RemoteSession, RemoteSize, SessionConnector, SessionManager, UploadError};
use crate::types::{FileResult, SyncReport, TransferOutcome};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Retry, cycling and comparison policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Upload attempts per file, including the first.
    pub retry_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_backoff: Duration,
    /// Uploads a session may carry before it is closed and reopened.
    pub session_cycle_threshold: u32,
    pub compare: CompareMode,
}

impl SyncPolicy {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            session_cycle_threshold: config.session_cycle_threshold.max(1),
            compare: config.compare,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from_config(&DeployConfig::default())
    }
}

/// A live session plus the uploads it has carried so far.
pub struct LiveSession<S> {
    session: S,
    transfers: u32,
}

/// Sequential uploader over a single session at a time.
pub struct SyncEngine<C: SessionConnector> {
    sessions: SessionManager<C>,
    policy: SyncPolicy,
    remote_root: String,
    ledger: HashLedger,
    opened_this_run: usize,
}

/// Creates an engine from a deploy config and a connector.
pub fn create_sync_engine<C: SessionConnector>(
    config: &DeployConfig,
    connector: C,
) -> DeployResult<SyncEngine<C>> {
    config.validate()?;
    Ok(SyncEngine::new(
        SessionManager::new(connector),
        SyncPolicy::from_config(config),
        config.remote_root.clone(),
    ))
}

impl<C: SessionConnector> SyncEngine<C> {
    pub fn new(sessions: SessionManager<C>, policy: SyncPolicy, remote_root: String) -> Self {
        Self {
            sessions,
            policy,
            remote_root: crate::config::normalize_remote_root(&remote_root),
            ledger: HashLedger::default(),
            opened_this_run: 0,
        }
    }

    /// Seeds the hash ledger consulted in [`CompareMode::Hash`].
    #[must_use]
    pub fn with_ledger(mut self, ledger: HashLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &HashLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Runs one full pass, skipping files whose remote copy is current.
    pub fn run(&mut self, files: &[LocalFile]) -> SyncReport {
        info!(
            "deploying {} files to {}{}",
            files.len(),
            self.sessions.connector().describe(),
            self.remote_root
        );
        self.pass(files, false)
    }

    /// Uploads every listed file unconditionally.
    pub fn push(&mut self, files: &[LocalFile]) -> SyncReport {
        info!(
            "pushing {} files to {}{}",
            files.len(),
            self.sessions.connector().describe(),
            self.remote_root
        );
        self.pass(files, true)
    }

    fn pass(&mut self, files: &[LocalFile], force: bool) -> SyncReport {
        let started = Instant::now();
        self.opened_this_run = 0;

        let mut report = SyncReport::default();
        let mut live = None;
        for file in files {
            let (next, result) = self.step(live, file, force);
            live = next;
            report.record(result);
        }
        if let Some(current) = live {
            self.discard(current);
        }

        report.sessions_opened = self.opened_this_run;
        report.elapsed = started.elapsed();
        info!(
            "run complete: {} uploaded, {} skipped, {} failed",
            report.uploaded, report.skipped, report.failed
        );
        report
    }

    /// Drives one file to a terminal outcome, returning the session to use
    /// for the next file.
    pub fn step(
        &mut self,
        mut live: Option<LiveSession<C::Session>>,
        file: &LocalFile,
        force: bool,
    ) -> (Option<LiveSession<C::Session>>, FileResult) {
        let remote = remote_target_path(&self.remote_root, &file.relative);
        let max = self.policy.retry_attempts;
        let mut probed = force;
        let mut dirs_ready = false;
        let mut local_hash: Option<String> = None;
        let mut attempts = 0;

        while attempts < max {
            let mut current = match live.take() {
                Some(current) => current,
                None => match self.open() {
                    Ok(current) => current,
                    Err(e) => {
                        attempts += 1;
                        error!("connection failed (attempt {attempts}/{max}): {e}");
                        if attempts < max {
                            self.pause();
                        }
                        continue;
                    }
                },
            };

            if !probed {
                probed = true;
                if self.is_current(&mut current, file, &remote, &mut local_hash) {
                    debug!("= {} unchanged", file.relative);
                    return (Some(current), file_result(file, TransferOutcome::Skipped, 0));
                }
            }

            if !dirs_ready {
                dirs_ready = true;
                self.prepare_parent(&mut current.session, &remote);
            }

            if self.policy.compare == CompareMode::Hash && local_hash.is_none() {
                local_hash = file_sha256(&file.path).ok();
            }

            attempts += 1;
            info!("↑ {} ({} bytes)", file.relative, file.size);
            match self.sessions.upload(&mut current.session, &file.path, &remote) {
                Ok(_) => {
                    current.transfers += 1;
                    if let Some(hash) = local_hash.take() {
                        self.ledger.record(&file.relative, file.size, hash);
                    }
                    let next = self.cycle_if_due(current);
                    return (next, file_result(file, TransferOutcome::Uploaded, attempts));
                }
                Err(UploadError::Local(e)) => {
                    error!("cannot read {}: {e}", file.path.display());
                    return (Some(current), file_result(file, TransferOutcome::Failed, attempts));
                }
                Err(UploadError::Remote(e)) => {
                    error!("✗ {} (attempt {attempts}/{max}): {e}", file.relative);
                    self.discard(current);
                    if attempts < max {
                        info!("reconnecting (attempt {}/{max})", attempts + 1);
                        self.pause();
                    }
                }
            }
        }

        error!("FAILED after {max} attempts: {}", file.relative);
        (live, file_result(file, TransferOutcome::Failed, attempts))
    }

    /// Connects and enters the remote root.
    fn open(&mut self) -> SessionResult<LiveSession<C::Session>> {
        info!("connecting to {}", self.sessions.connector().describe());
        let mut session = self.sessions.connect()?;
        self.opened_this_run += 1;

        if session.change_dir(&self.remote_root).is_err() {
            let report = self.sessions.ensure_directory(&mut session, &self.remote_root);
            if let Err(e) = session.change_dir(&self.remote_root) {
                warn!(
                    "cannot enter remote root {} ({} created): {e}",
                    self.remote_root, report.created
                );
            }
        }

        Ok(LiveSession {
            session,
            transfers: 0,
        })
    }

    fn is_current(
        &self,
        current: &mut LiveSession<C::Session>,
        file: &LocalFile,
        remote: &str,
        local_hash: &mut Option<String>,
    ) -> bool {
        let remote_size = match self.sessions.remote_size(&mut current.session, remote) {
            RemoteSize::Present(size) => size,
            RemoteSize::Absent => return false,
            RemoteSize::Fault(e) => {
                warn!("size probe for {remote} failed, treating as absent: {e}");
                return false;
            }
        };
        if remote_size != file.size {
            return false;
        }

        match self.policy.compare {
            CompareMode::Size => true,
            CompareMode::Hash => match file_sha256(&file.path) {
                Ok(hash) => {
                    let unchanged = self.ledger.matches(&file.relative, file.size, &hash);
                    *local_hash = Some(hash);
                    unchanged
                }
                Err(e) => {
                    warn!("cannot hash {}: {e}", file.path.display());
                    false
                }
            },
        }
    }

    fn prepare_parent(&self, session: &mut C::Session, remote: &str) {
        let Some(parent) = remote_parent(remote) else {
            return;
        };
        if parent == self.remote_root {
            return;
        }

        let report = self.sessions.ensure_directory(session, parent);
        for (dir, e) in report.transport_faults() {
            warn!("directory {dir} may be missing: {e}");
        }
        // ensure_directory leaves the session inside `parent`.
        if let Err(e) = session.change_dir(&self.remote_root) {
            debug!("could not return to {}: {e}", self.remote_root);
        }
    }

    fn cycle_if_due(&self, current: LiveSession<C::Session>) -> Option<LiveSession<C::Session>> {
        if current.transfers < self.policy.session_cycle_threshold {
            return Some(current);
        }
        info!("cycling session after {} uploads", current.transfers);
        self.discard(current);
        None
    }

    fn discard(&self, current: LiveSession<C::Session>) {
        if let Some(e) = self.sessions.close(current.session) {
            warn!("ignoring error while closing session: {e}");
        }
    }

    fn pause(&self) {
        if !self.policy.retry_backoff.is_zero() {
            std::thread::sleep(self.policy.retry_backoff);
        }
    }
}

fn file_result(file: &LocalFile, outcome: TransferOutcome, attempts: u32) -> FileResult {
    FileResult {
        relative_path: file.relative.clone(),
        size: file.size,
        outcome,
        attempts,
    }
}
