//! SSH: run command lines on a remote Docker host over an exec channel.
//!
//! `ssh2` is blocking, so each call runs on tokio's blocking pool with its
//! own TCP connection and session. The session timeout bounds connection
//! setup and the same deadline bounds output collection, so a hung remote
//! surfaces as an [`ExecutionError`].

use std::fmt;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ssh2::{HashType, Session};
use tracing::{debug, warn};

use super::{failed_command, BoxFuture, CommandExecutor, ExecutionError};

/// Sleep between polls of a channel with no pending output.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the executor authenticates as [`SshTarget::user`].
#[derive(Clone)]
pub enum SshCredential {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Identities offered by a running ssh-agent.
    Agent,
}

impl fmt::Debug for SshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshCredential::Password(_) => f.write_str("Password(***)"),
            SshCredential::KeyFile { path, .. } => {
                f.debug_struct("KeyFile").field("path", path).finish_non_exhaustive()
            }
            SshCredential::Agent => f.write_str("Agent"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: SshCredential,
    /// Expected SHA-256 host key fingerprint (hex, `:` separators allowed).
    /// When absent any host key is accepted.
    pub host_key_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    timeout: Duration,
}

impl SshExecutor {
    pub fn new(target: SshTarget, timeout: Duration) -> Self {
        if target.host_key_sha256.is_none() {
            warn!(
                host = %target.host,
                "No SSH host key fingerprint configured; any host key will be accepted"
            );
        }
        Self { target, timeout }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

impl CommandExecutor for SshExecutor {
    fn execute<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String, ExecutionError>> {
        let target = self.target.clone();
        let timeout = self.timeout;
        let command = command.to_string();

        Box::pin(async move {
            debug!(host = %target.host, command = %command, "Running remote command");
            tokio::task::spawn_blocking(move || exec_blocking(&target, timeout, &command))
                .await
                .map_err(|e| ExecutionError::new(format!("SSH worker failed: {}", e)))?
        })
    }
}

fn exec_blocking(target: &SshTarget, timeout: Duration, command: &str) -> Result<String, ExecutionError> {
    let session = connect_session(target, timeout)?;

    let mut channel = session.channel_session().map_err(map_ssh_error)?;
    channel.exec(command).map_err(map_ssh_error)?;

    session.set_blocking(false);
    let mut out_stream = channel.stream(0);
    let mut err_stream = channel.stderr();
    let drained = drain_streams(&mut out_stream, &mut err_stream, Instant::now() + timeout);
    session.set_blocking(true);
    let (stdout, stderr) = drained?;

    channel.wait_close().map_err(map_ssh_error)?;
    let status = channel.exit_status().map_err(map_ssh_error)?;

    if status != 0 {
        return Err(failed_command(Some(status), &stderr));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn connect_session(target: &SshTarget, timeout: Duration) -> Result<Session, ExecutionError> {
    let addrs = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| ExecutionError::new(format!("Failed to resolve {}: {}", target.host, e)))?;

    let mut last_error = None;
    let mut tcp = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => last_error = Some(e),
        }
    }
    let tcp = tcp.ok_or_else(|| {
        ExecutionError::new(format!(
            "Failed to connect SSH to {}:{}: {}",
            target.host,
            target.port,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses".to_string())
        ))
    })?;

    let mut session = Session::new().map_err(map_ssh_error)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake().map_err(map_ssh_error)?;

    if let Some(expected) = target.host_key_sha256.as_deref() {
        let observed = session.host_key_hash(HashType::Sha256).map(hex_fingerprint);
        if observed.as_deref() != Some(normalize_fingerprint(expected).as_str()) {
            return Err(ExecutionError::new(format!(
                "SSH host key mismatch (expected {}, got {})",
                expected,
                observed.unwrap_or_else(|| "unknown".to_string())
            )));
        }
    }

    match &target.credential {
        SshCredential::Password(password) => session
            .userauth_password(&target.user, password)
            .map_err(map_ssh_error)?,
        SshCredential::KeyFile { path, passphrase } => session
            .userauth_pubkey_file(&target.user, None, path, passphrase.as_deref())
            .map_err(map_ssh_error)?,
        SshCredential::Agent => session.userauth_agent(&target.user).map_err(map_ssh_error)?,
    }

    if !session.authenticated() {
        return Err(ExecutionError::new(format!(
            "SSH authentication failed for {}@{}",
            target.user, target.host
        )));
    }

    Ok(session)
}

/// Read stdout and stderr in turn until both hit EOF, so a command that
/// fills one stream's window never stalls while the other is read.
/// Both readers must be non-blocking.
fn drain_streams<O: Read, E: Read>(
    stdout: &mut O,
    stderr: &mut E,
    deadline: Instant,
) -> Result<(Vec<u8>, Vec<u8>), ExecutionError> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut out_open = true;
    let mut err_open = true;
    let mut buf = [0u8; 8192];

    while out_open || err_open {
        let mut progressed = false;
        if out_open {
            progressed |= read_some(stdout, &mut buf, &mut out, &mut out_open, "stdout")?;
        }
        if err_open {
            progressed |= read_some(stderr, &mut buf, &mut err, &mut err_open, "stderr")?;
        }
        if !progressed {
            if Instant::now() >= deadline {
                return Err(ExecutionError::new("SSH command timed out waiting for output"));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    Ok((out, err))
}

fn read_some<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
    open: &mut bool,
    name: &str,
) -> Result<bool, ExecutionError> {
    match reader.read(buf) {
        Ok(0) => {
            *open = false;
            Ok(true)
        }
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(false),
        Err(e) => Err(ExecutionError::new(format!("SSH {} read failed: {}", name, e))),
    }
}

fn map_ssh_error(err: ssh2::Error) -> ExecutionError {
    ExecutionError::new(format!("SSH error: {}", err))
}

fn hex_fingerprint(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

fn normalize_fingerprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
