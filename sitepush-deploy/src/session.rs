//! Remote session lifecycle.
//!
//! A session is one authenticated, stateful conversation with the remote
//! store, including its notion of the current directory. At most one is
//! live at a time and it is only ever driven from a single thread.
//!
//! The transport is abstracted behind [`SessionConnector`] / [`RemoteSession`]
//! so the engine can run against FTPS in production and an in-memory store in
//! tests. [`SessionManager`] layers the best-effort semantics on top: size
//! probes and directory creation report faults instead of raising them, and
//! closing never fails.

use crate::error::{SessionError, SessionResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// One live connection to the remote store.
pub trait RemoteSession {
    /// Changes the current remote directory.
    fn change_dir(&mut self, path: &str) -> SessionResult<()>;

    /// Creates a single remote directory.
    fn make_dir(&mut self, path: &str) -> SessionResult<()>;

    /// Returns the byte size of a remote file.
    fn size(&mut self, path: &str) -> SessionResult<u64>;

    /// Streams `reader` to `path`, replacing any existing content.
    fn store(&mut self, path: &str, reader: &mut dyn std::io::Read) -> SessionResult<u64>;

    /// Ends the conversation.
    fn quit(&mut self) -> SessionResult<()>;
}

/// Opens fresh sessions.
pub trait SessionConnector {
    type Session: RemoteSession;

    /// Connects, secures the channel and authenticates. Must give up after a
    /// bounded timeout.
    fn connect(&self) -> SessionResult<Self::Session>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}

/// Result of a remote size probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSize {
    Present(u64),
    /// The server says there is nothing at the path.
    Absent,
    /// The probe itself broke; callers proceed as if absent.
    Fault(SessionError),
}

impl RemoteSize {
    pub fn bytes(&self) -> Option<u64> {
        match self {
            RemoteSize::Present(size) => Some(*size),
            _ => None,
        }
    }
}

/// What `ensure_directory` found along a directory chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    pub existing: usize,
    pub created: usize,
    /// Segments that could neither be entered nor created.
    pub unresolved: Vec<(String, SessionError)>,
}

impl DirectoryReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Faults other than plain refusals, worth surfacing in logs.
    pub fn transport_faults(&self) -> impl Iterator<Item = &(String, SessionError)> {
        self.unresolved.iter().filter(|(_, e)| !e.is_rejection())
    }
}

/// Failure of a single upload attempt.
#[derive(Debug)]
pub enum UploadError {
    /// The local file could not be read. Reconnecting will not help.
    Local(std::io::Error),
    /// The remote side failed; the session should be discarded.
    Remote(SessionError),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Local(e) => write!(f, "local read failed: {e}"),
            UploadError::Remote(e) => write!(f, "{e}"),
        }
    }
}

/// Owns the connector and applies the lifecycle rules to its sessions.
pub struct SessionManager<C: SessionConnector> {
    connector: C,
}

impl<C: SessionConnector> SessionManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Establishes a new secured, authenticated session.
    pub fn connect(&self) -> SessionResult<C::Session> {
        debug!("connecting to {}", self.connector.describe());
        self.connector.connect()
    }

    /// Terminates a session. Never fails; a fault during quit is handed back
    /// for logging only.
    pub fn close(&self, mut session: C::Session) -> Option<SessionError> {
        match session.quit() {
            Ok(()) => {
                debug!("session closed");
                None
            }
            Err(e) => {
                debug!("session close reported: {e}");
                Some(e)
            }
        }
    }

    /// Queries the byte size at `path`.
    pub fn remote_size(&self, session: &mut C::Session, path: &str) -> RemoteSize {
        match session.size(path) {
            Ok(size) => RemoteSize::Present(size),
            Err(e) if e.is_rejection() => RemoteSize::Absent,
            Err(e) => RemoteSize::Fault(e),
        }
    }

    /// Makes sure every segment of `path` exists. Segments that cannot be
    /// entered are created; failures to create are recorded and skipped.
    pub fn ensure_directory(&self, session: &mut C::Session, path: &str) -> DirectoryReport {
        let mut report = DirectoryReport::default();
        let mut current = String::new();

        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);

            if session.change_dir(&current).is_ok() {
                report.existing += 1;
                continue;
            }
            match session.make_dir(&current) {
                Ok(()) => {
                    debug!("created remote directory {current}");
                    report.created += 1;
                }
                Err(e) => {
                    if !e.is_rejection() {
                        warn!("could not create {current}: {e}");
                    }
                    report.unresolved.push((current.clone(), e));
                }
            }
        }

        report
    }

    /// Uploads `local` to `remote`, overwriting. Returns bytes sent.
    pub fn upload(
        &self,
        session: &mut C::Session,
        local: &Path,
        remote: &str,
    ) -> Result<u64, UploadError> {
        let file = File::open(local).map_err(UploadError::Local)?;
        let mut reader = BufReader::new(file);
        session
            .store(remote, &mut reader)
            .map_err(UploadError::Remote)
    }
}
