//! libssh2 transport. Every libssh2 call blocks, so each one runs on the
//! blocking pool with the session behind a mutex.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::os::raw::c_int;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ssh2::{Channel, ErrorCode, KeyboardInteractivePrompt, Prompt, Session};
use tracing::debug;

use atacfg_common::error::SessionError;

use super::{Credentials, ShellChannel, ShellConnector};

pub const SSH_PORT: u16 = 22;

const LIBSSH2_ERROR_AUTHENTICATION_FAILED: c_int = -18;

/// Answers every keyboard-interactive prompt with the password.
struct PasswordPrompt {
    password: String,
}

impl KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SshConnector {
    timeout: Duration,
}

impl SshConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(
        &self,
        addr: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShellChannel>, SessionError> {
        let timeout = self.timeout;
        let credentials = credentials.clone();

        let shell = tokio::task::spawn_blocking(move || open_shell(addr, &credentials, timeout))
            .await
            .map_err(|e| SessionError::Protocol(format!("ssh task failed: {e}")))??;

        debug!(%addr, "interactive shell open");
        Ok(Box::new(SshChannel {
            inner: Arc::new(Mutex::new(shell)),
        }))
    }
}

struct SshShell {
    session: Session,
    channel: Channel,
    timeout: Duration,
}

fn protocol(err: ssh2::Error) -> SessionError {
    SessionError::Protocol(err.to_string())
}

/// Only a refused password counts as a rejection. Timeouts and dropped
/// links during authentication are transport faults.
fn rejected(err: &ssh2::Error) -> bool {
    err.code() == ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED)
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX).max(1)
}

fn open_shell(
    addr: Ipv4Addr,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<SshShell, SessionError> {
    let tcp = TcpStream::connect_timeout(&SocketAddr::from((addr, SSH_PORT)), timeout)
        .map_err(SessionError::Unreachable)?;

    let mut session = Session::new().map_err(protocol)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(millis(timeout));
    session.handshake().map_err(protocol)?;

    if let Err(err) = session.userauth_password(&credentials.username, &credentials.password) {
        if !rejected(&err) {
            return Err(protocol(err));
        }
    }
    if !session.authenticated() {
        let mut prompter = PasswordPrompt {
            password: credentials.password.clone(),
        };
        session
            .userauth_keyboard_interactive(&credentials.username, &mut prompter)
            .map_err(|err| {
                if rejected(&err) {
                    SessionError::AuthRejected
                } else {
                    protocol(err)
                }
            })?;
    }
    if !session.authenticated() {
        return Err(SessionError::AuthRejected);
    }

    let mut channel = session.channel_session().map_err(protocol)?;
    channel
        .request_pty("vt100", None, Some((120, 40, 0, 0)))
        .map_err(protocol)?;
    channel.shell().map_err(protocol)?;

    Ok(SshShell {
        session,
        channel,
        timeout,
    })
}

impl SshShell {
    fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.channel
            .write_all(line.as_bytes())
            .and_then(|_| self.channel.write_all(b"\n"))
            .and_then(|_| self.channel.flush())
            .map_err(|e| SessionError::Protocol(e.to_string()))
    }

    /// Reads until `window` passes with no new bytes. A device that never
    /// stops talking is cut off after a few windows.
    fn read_window(&mut self, window: Duration) -> Result<Vec<String>, SessionError> {
        self.session.set_timeout(millis(window));
        let deadline = Instant::now() + window * 8;

        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        let result = loop {
            if Instant::now() >= deadline {
                break Ok(());
            }
            match self.channel.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    break Ok(());
                }
                Err(e) => break Err(SessionError::Protocol(e.to_string())),
            }
        };
        self.session.set_timeout(millis(self.timeout));
        result?;

        Ok(String::from_utf8_lossy(&collected)
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.trim().is_empty())
            .collect())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let _ = self.channel.send_eof();
        let _ = self.channel.close();
        self.session
            .disconnect(None, "bye", None)
            .map_err(protocol)
    }
}

struct SshChannel {
    inner: Arc<Mutex<SshShell>>,
}

impl SshChannel {
    async fn with_shell<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SshShell) -> Result<T, SessionError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut shell = inner.lock().map_err(|_| SessionError::Closed)?;
            f(&mut shell)
        })
        .await
        .map_err(|e| SessionError::Protocol(format!("ssh task failed: {e}")))?
    }
}

#[async_trait]
impl ShellChannel for SshChannel {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let line = line.to_string();
        self.with_shell(move |shell| shell.send_line(&line)).await
    }

    async fn read_lines(&mut self, window: Duration) -> Result<Vec<String>, SessionError> {
        self.with_shell(move |shell| shell.read_window(window)).await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.with_shell(|shell| shell.close()).await
    }
}
