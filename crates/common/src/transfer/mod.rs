//! Secure copy of a local byte stream to a remote host.
//!
//! [`ScpClient`] opens one SSH session per copy:
//! 1. resolve and connect to `host:port` within the configured timeout
//! 2. SSH handshake
//! 3. check the presented host key against the [`HostIdentityPolicy`]
//! 4. public key authentication
//! 5. SCP upload of exactly `size` bytes with mode `0655`
//!
//! Nothing is retried and remote directories are never created. The session is
//! disconnected on every exit path once the handshake has completed.

mod identity;
mod progress;

use std::fmt;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ssh2::Session;

pub use identity::{HostFingerprint, HostIdentityPolicy, IdentityMismatch, Verification};
pub use progress::{NoopTransferObserver, ProgressReader, TransferObserver};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Permissions of every uploaded file
pub const REMOTE_FILE_MODE: i32 = 0o655;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot resolve remote address {remote}: {source}")]
    Resolve {
        remote: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot connect to {remote}: {source}")]
    Connect {
        remote: String,
        #[source]
        source: io::Error,
    },
    #[error("ssh session error: {0}")]
    Session(#[source] ssh2::Error),
    #[error("remote host presented no host key")]
    NoHostKey,
    #[error(transparent)]
    Identity(#[from] IdentityMismatch),
    #[error("authentication failed for {username}: {source}")]
    Auth {
        username: String,
        #[source]
        source: ssh2::Error,
    },
    #[error("remote host did not authenticate {0}")]
    NotAuthenticated(String),
    #[error("copy to {dest} failed: {source}")]
    Copy {
        dest: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot read local file {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source ended early: expected {expected} bytes, copied {copied}")]
    ShortRead { expected: u64, copied: u64 },
}

impl TransferError {
    /// True when the session was never established
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            TransferError::Resolve { .. } | TransferError::Connect { .. } | TransferError::Session(_)
        )
    }
}

/// Private key used to authenticate
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMaterial {
    /// Path to a private key file
    Path(PathBuf),
    /// Private key text (PEM / OpenSSH format)
    Inline(String),
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Path(path) => f.debug_tuple("Path").field(path).finish(),
            KeyMaterial::Inline(_) => f.debug_tuple("Inline").field(&"<redacted>").finish(),
        }
    }
}

/// Everything needed to reach and authenticate against the remote host
#[derive(Clone)]
pub struct ScpConfig {
    /// `host:port`
    pub remote: String,
    pub username: String,
    pub key: KeyMaterial,
    pub passphrase: Option<String>,
    /// Bounds the TCP connect and every blocking SSH operation
    pub timeout: Duration,
    pub host_identity: HostIdentityPolicy,
}

impl fmt::Debug for ScpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScpConfig")
            .field("remote", &self.remote)
            .field("username", &self.username)
            .field("key", &self.key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("host_identity", &self.host_identity)
            .finish()
    }
}

/// Streams a source of known length to a path on a remote host.
pub trait RemoteCopy: Send + Sync {
    /// Copy exactly `size` bytes from `src` to `dest`.
    ///
    /// `dest`'s parent directory must already exist on the remote.
    fn copy(&self, src: &mut dyn Read, dest: &str, size: u64) -> Result<(), TransferError>;
}

#[derive(Debug, Clone)]
pub struct ScpClient {
    config: ScpConfig,
}

/// An established, host-checked, authenticated session.
/// Disconnects when dropped.
struct Connection {
    session: Session,
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "backuper: done", None) {
            tracing::debug!(error = %e, "ssh disconnect failed");
        }
    }
}

impl ScpClient {
    pub fn new(config: ScpConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Connection, TransferError> {
        let remote = &self.config.remote;
        let addr = remote
            .to_socket_addrs()
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "no addresses for host")
                })
            })
            .map_err(|source| TransferError::Resolve {
                remote: remote.clone(),
                source,
            })?;

        tracing::debug!(%remote, %addr, timeout = ?self.config.timeout, "connecting");
        let tcp = TcpStream::connect_timeout(&addr, self.config.timeout).map_err(|source| {
            TransferError::Connect {
                remote: remote.clone(),
                source,
            }
        })?;

        let mut session = Session::new().map_err(TransferError::Session)?;
        session.set_timeout(u32::try_from(self.config.timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(TransferError::Session)?;

        let conn = Connection { session };
        self.check_host(&conn.session)?;
        self.authenticate(&conn.session)?;
        Ok(conn)
    }

    fn check_host(&self, session: &Session) -> Result<Verification, TransferError> {
        let (key, kind) = session.host_key().ok_or(TransferError::NoHostKey)?;
        let presented = HostFingerprint::from_host_key(key, kind);
        Ok(self.config.host_identity.verify(&presented)?)
    }

    fn authenticate(&self, session: &Session) -> Result<(), TransferError> {
        let username = &self.config.username;
        let passphrase = self.config.passphrase.as_deref();

        let result = match &self.config.key {
            KeyMaterial::Path(path) => {
                session.userauth_pubkey_file(username, None, path, passphrase)
            }
            KeyMaterial::Inline(key) => {
                session.userauth_pubkey_memory(username, None, key, passphrase)
            }
        };
        result.map_err(|source| TransferError::Auth {
            username: username.clone(),
            source,
        })?;

        if !session.authenticated() {
            return Err(TransferError::NotAuthenticated(username.clone()));
        }
        Ok(())
    }
}

impl RemoteCopy for ScpClient {
    fn copy(&self, src: &mut dyn Read, dest: &str, size: u64) -> Result<(), TransferError> {
        let conn = self.connect()?;

        let copy_err = |source: io::Error| TransferError::Copy {
            dest: dest.to_string(),
            source,
        };

        let mut channel = conn
            .session
            .scp_send(Path::new(dest), REMOTE_FILE_MODE, size, None)
            .map_err(|e| copy_err(e.into()))?;

        let mut limited = src.take(size);
        let copied = io::copy(&mut limited, &mut channel).map_err(copy_err)?;
        if copied != size {
            return Err(TransferError::ShortRead {
                expected: size,
                copied,
            });
        }

        channel.send_eof().map_err(|e| copy_err(e.into()))?;
        channel.wait_eof().map_err(|e| copy_err(e.into()))?;
        channel.close().map_err(|e| copy_err(e.into()))?;
        channel.wait_close().map_err(|e| copy_err(e.into()))?;

        tracing::info!(
            remote = %self.config.remote,
            dest,
            bytes = copied,
            "transfer complete"
        );
        Ok(())
    }
}
