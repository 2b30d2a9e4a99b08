//! FTP over explicit TLS.
//!
//! Each session negotiates `AUTH TLS` on the control channel, authenticates,
//! and switches the data channel to private protection (`PBSZ 0` / `PROT P`)
//! before any transfer. All operations block the calling thread.

use crate::config::DeployConfig;
use crate::error::{SessionError, SessionResult};
use crate::session::{RemoteSession, SessionConnector};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};
use tracing::debug;

/// Opens FTPS sessions against one host.
#[derive(Clone)]
pub struct FtpsConnector {
    host: String,
    port: u16,
    user: String,
    password: String,
    connect_timeout: Duration,
}

impl FtpsConnector {
    pub fn new(
        host: String,
        port: u16,
        user: String,
        password: String,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            host,
            port,
            user,
            password,
            connect_timeout,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.user.clone(),
            config.password.clone(),
            config.connect_timeout(),
        )
    }

    fn resolve(&self) -> SessionResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| SessionError::Connect(format!("cannot resolve {}: {e}", self.host)))?
            .next()
            .ok_or_else(|| SessionError::Connect(format!("no address for {}", self.host)))
    }
}

impl fmt::Debug for FtpsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpsConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionConnector for FtpsConnector {
    type Session = FtpsSession;

    fn connect(&self) -> SessionResult<FtpsSession> {
        let addr = self.resolve()?;
        let stream = NativeTlsFtpStream::connect_timeout(addr, self.connect_timeout)
            .map_err(|e| SessionError::Connect(format!("{addr}: {e}")))?;

        let tls = TlsConnector::new()
            .map_err(|e| SessionError::Connect(format!("TLS setup failed: {e}")))?;
        let mut stream = stream
            .into_secure(NativeTlsConnector::from(tls), &self.host)
            .map_err(|e| SessionError::Connect(format!("TLS negotiation failed: {e}")))?;

        stream
            .login(self.user.as_str(), self.password.as_str())
            .map_err(|e| SessionError::Connect(format!("login failed for {}: {e}", self.user)))?;
        stream.transfer_type(FileType::Binary).map_err(classify)?;

        debug!("secured session established with {}:{}", self.host, self.port);
        Ok(FtpsSession { stream })
    }

    fn describe(&self) -> String {
        format!("ftps://{}@{}:{}", self.user, self.host, self.port)
    }
}

/// A live FTPS conversation.
pub struct FtpsSession {
    stream: NativeTlsFtpStream,
}

impl RemoteSession for FtpsSession {
    fn change_dir(&mut self, path: &str) -> SessionResult<()> {
        self.stream.cwd(path).map_err(classify)
    }

    fn make_dir(&mut self, path: &str) -> SessionResult<()> {
        self.stream.mkdir(path).map_err(classify)
    }

    fn size(&mut self, path: &str) -> SessionResult<u64> {
        self.stream.size(path).map(|s| s as u64).map_err(classify)
    }

    fn store(&mut self, path: &str, reader: &mut dyn std::io::Read) -> SessionResult<u64> {
        let mut reader = reader;
        self.stream.put_file(path, &mut reader).map_err(classify)
    }

    fn quit(&mut self) -> SessionResult<()> {
        self.stream.quit().map_err(classify)
    }
}

/// A negative server reply is a rejection; anything else broke the session.
fn classify(err: FtpError) -> SessionError {
    match err {
        FtpError::UnexpectedResponse(_) => SessionError::Rejected(err.to_string()),
        other => SessionError::Transport(other.to_string()),
    }
}
