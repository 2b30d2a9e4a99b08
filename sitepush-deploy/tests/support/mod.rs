//! In-memory remote store for engine and session tests.
//!
//! Behaves like a small FTP server: directories must exist before files are
//! stored in them, missing paths are refused with a rejection, and every
//! command is appended to an operation log.

#![allow(dead_code)]

use sitepush_deploy::error::{SessionError, SessionResult};
use sitepush_deploy::scan::{LocalFile, TreeScanner};
use sitepush_deploy::session::{RemoteSession, SessionConnector, SessionManager};
use sitepush_deploy::sync_engine::{SyncEngine, SyncPolicy};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A command observed by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    ConnectRefused,
    Cwd(String),
    Mkd(String),
    Size(String),
    Stor(String),
    StorFailed(String),
    Quit,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    log: Vec<Op>,
    refuse_connects: usize,
    fail_stores: HashMap<String, usize>,
    broken_size_probes: bool,
    broken_quit: bool,
}

/// Shared handle to the fake server. Clones see the same state.
#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<State>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Places a file (and its parent directories) on the server.
    pub fn put(&self, path: &str, contents: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let mut current = String::new();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            current.push('/');
            current.push_str(part);
            state.dirs.insert(current.clone());
        }
        state.files.insert(path.to_string(), contents.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn size_of(&self, path: &str) -> Option<u64> {
        self.file(path).map(|f| f.len() as u64)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_connects(&self, n: usize) {
        self.state.lock().unwrap().refuse_connects = n;
    }

    /// Fail the next `n` uploads to `path` with a transport fault.
    pub fn fail_stores(&self, path: &str, n: usize) {
        self.state
            .lock()
            .unwrap()
            .fail_stores
            .insert(path.to_string(), n);
    }

    /// Make every size probe fail with a transport fault.
    pub fn break_size_probes(&self) {
        self.state.lock().unwrap().broken_size_probes = true;
    }

    /// Make QUIT fail.
    pub fn break_quit(&self) {
        self.state.lock().unwrap().broken_quit = true;
    }

    pub fn log(&self) -> Vec<Op> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.state.lock().unwrap().log.iter().filter(|op| pred(*op)).count()
    }

    pub fn stores_of(&self, path: &str) -> usize {
        self.count(|op| matches!(op, Op::Stor(p) | Op::StorFailed(p) if p == path))
    }

    pub fn connects(&self) -> usize {
        self.count(|op| *op == Op::Connect)
    }
}

pub struct MemoryConnector {
    server: MemoryServer,
}

impl SessionConnector for MemoryConnector {
    type Session = MemorySession;

    fn connect(&self) -> SessionResult<MemorySession> {
        let mut state = self.server.state.lock().unwrap();
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            state.log.push(Op::ConnectRefused);
            return Err(SessionError::Connect("connection refused".into()));
        }
        state.log.push(Op::Connect);
        Ok(MemorySession {
            server: self.server.clone(),
            cwd: "/".to_string(),
        })
    }

    fn describe(&self) -> String {
        "memory://test".to_string()
    }
}

pub struct MemorySession {
    server: MemoryServer,
    cwd: String,
}

impl MemorySession {
    fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else if self.cwd == "/" {
            format!("/{path}")
        } else {
            format!("{}/{path}", self.cwd)
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

impl RemoteSession for MemorySession {
    fn change_dir(&mut self, path: &str) -> SessionResult<()> {
        let path = self.absolute(path);
        let mut state = self.server.state.lock().unwrap();
        state.log.push(Op::Cwd(path.clone()));
        if state.dirs.contains(&path) {
            self.cwd = path;
            Ok(())
        } else {
            Err(SessionError::Rejected(format!("550 {path}: no such directory")))
        }
    }

    fn make_dir(&mut self, path: &str) -> SessionResult<()> {
        let path = self.absolute(path);
        let mut state = self.server.state.lock().unwrap();
        state.log.push(Op::Mkd(path.clone()));
        if state.dirs.contains(&path) || state.files.contains_key(&path) {
            return Err(SessionError::Rejected(format!("550 {path}: file exists")));
        }
        if !state.dirs.contains(&parent_of(&path)) {
            return Err(SessionError::Rejected(format!("550 {path}: no parent")));
        }
        state.dirs.insert(path);
        Ok(())
    }

    fn size(&mut self, path: &str) -> SessionResult<u64> {
        let path = self.absolute(path);
        let mut state = self.server.state.lock().unwrap();
        state.log.push(Op::Size(path.clone()));
        if state.broken_size_probes {
            return Err(SessionError::Transport("connection reset".into()));
        }
        state
            .files
            .get(&path)
            .map(|f| f.len() as u64)
            .ok_or_else(|| SessionError::Rejected(format!("550 {path}: not found")))
    }

    fn store(&mut self, path: &str, reader: &mut dyn std::io::Read) -> SessionResult<u64> {
        let path = self.absolute(path);
        let mut guard = self.server.state.lock().unwrap();
        let state = &mut *guard;
        if let Some(remaining) = state.fail_stores.get_mut(&path) {
            if *remaining > 0 {
                *remaining -= 1;
                state.log.push(Op::StorFailed(path.clone()));
                return Err(SessionError::Transport("data connection dropped".into()));
            }
        }
        if !state.dirs.contains(&parent_of(&path)) {
            state.log.push(Op::StorFailed(path.clone()));
            return Err(SessionError::Rejected(format!("553 {path}: no such directory")));
        }
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        let len = buf.len() as u64;
        state.log.push(Op::Stor(path.clone()));
        state.files.insert(path, buf);
        Ok(len)
    }

    fn quit(&mut self) -> SessionResult<()> {
        let mut state = self.server.state.lock().unwrap();
        state.log.push(Op::Quit);
        if state.broken_quit {
            Err(SessionError::Transport("broken pipe".into()))
        } else {
            Ok(())
        }
    }
}

/// Policy with no backoff.
pub fn fast_policy() -> SyncPolicy {
    SyncPolicy {
        retry_backoff: Duration::ZERO,
        ..SyncPolicy::default()
    }
}

pub fn engine(server: &MemoryServer) -> SyncEngine<MemoryConnector> {
    engine_with(server, fast_policy(), "/")
}

pub fn engine_with(
    server: &MemoryServer,
    policy: SyncPolicy,
    remote_root: &str,
) -> SyncEngine<MemoryConnector> {
    SyncEngine::new(
        SessionManager::new(server.connector()),
        policy,
        remote_root.to_string(),
    )
}

/// Writes `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn scan(root: &Path) -> Vec<LocalFile> {
    TreeScanner::new(root).scan().unwrap()
}
