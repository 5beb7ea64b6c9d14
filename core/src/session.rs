//! # Remote Session
//!
//! An authenticated interactive shell on the adapter. The transport sits
//! behind [`ShellConnector`] / [`ShellChannel`] so the workflow can be driven
//! against a scripted device in tests.
//!
//! A session is bound to one set of credentials. Changing the password means
//! building a new session, never mutating an open one.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use atacfg_common::config::Timings;
use atacfg_common::error::{ProvisionError, SessionError};
use atacfg_common::operator::Operator;
use atacfg_common::script::CommandScript;
use atacfg_common::version::{DeviceStatus, parse_status};

pub mod ssh;

/// Upper bound on read windows spent waiting for `status` output.
const STATUS_READ_ROUNDS: usize = 25;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn with_password(&self, password: impl Into<String>) -> Self {
        Self::new(self.username.clone(), password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[async_trait]
pub trait ShellChannel: Send {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Everything the device printed until `window` passed without output.
    async fn read_lines(&mut self, window: Duration) -> Result<Vec<String>, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn connect(
        &self,
        addr: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShellChannel>, SessionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    AuthFailed,
}

pub struct RemoteSession {
    addr: Ipv4Addr,
    credentials: Credentials,
    state: SessionState,
    channel: Option<Box<dyn ShellChannel>>,
}

impl RemoteSession {
    pub fn new(addr: Ipv4Addr, credentials: Credentials) -> Self {
        Self {
            addr,
            credentials,
            state: SessionState::Disconnected,
            channel: None,
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn connect(&mut self, connector: &dyn ShellConnector) -> Result<(), SessionError> {
        match connector.connect(self.addr, &self.credentials).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = if e.is_auth() {
                    SessionState::AuthFailed
                } else {
                    SessionState::Disconnected
                };
                Err(e)
            }
        }
    }

    fn channel(&mut self) -> Result<&mut Box<dyn ShellChannel>, SessionError> {
        match self.state {
            SessionState::Connected => self.channel.as_mut().ok_or(SessionError::Closed),
            _ => Err(SessionError::Closed),
        }
    }

    pub async fn send(&mut self, command: &str) -> Result<(), SessionError> {
        self.channel()?.send_line(command).await
    }

    pub async fn read_lines(&mut self, window: Duration) -> Result<Vec<String>, SessionError> {
        self.channel()?.read_lines(window).await
    }

    /// Sends every step in order, pausing after each. Nothing is read back.
    pub async fn run_script(&mut self, script: &CommandScript) -> Result<(), SessionError> {
        debug!(kind = ?script.kind(), steps = script.steps().len(), "running script");
        for step in script.steps() {
            if let Some(milestone) = step.milestone {
                info!("{milestone}");
            }
            debug!(command = %step.redacted(), "send");
            self.send(&step.command).await?;
            tokio::time::sleep(step.delay).await;
        }
        Ok(())
    }

    /// Issues `status` and reads until the device goes quiet.
    pub async fn query_status(&mut self, window: Duration) -> Result<DeviceStatus, SessionError> {
        self.send("status").await?;

        let mut lines = Vec::new();
        for _ in 0..STATUS_READ_ROUNDS {
            let batch = self.read_lines(window).await?;
            if batch.is_empty() {
                break;
            }
            lines.extend(batch);
        }

        let status = parse_status(&lines);
        debug!(model = ?status.model, version = ?status.version, "status parsed");
        Ok(status)
    }

    /// Best effort. Errors are logged, never returned.
    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!(addr = %self.addr, "closing session: {e}");
            }
        }
        self.state = SessionState::Disconnected;
    }
}

/// Connects with `credentials`, falling back to operator-supplied passwords
/// when the device rejects them.
pub async fn establish(
    connector: &dyn ShellConnector,
    operator: &dyn Operator,
    addr: Ipv4Addr,
    credentials: Credentials,
    max_attempts: usize,
) -> Result<RemoteSession, ProvisionError> {
    let mut session = RemoteSession::new(addr, credentials.clone());
    match session.connect(connector).await {
        Ok(()) => return Ok(session),
        Err(e) if e.is_auth() => warn!("The adapter rejected the expected password"),
        Err(source) => return Err(ProvisionError::Session { addr, source }),
    }

    for attempt in 0..max_attempts {
        let Some(password) = operator.password(attempt) else {
            break;
        };

        let mut session = RemoteSession::new(addr, credentials.with_password(password));
        match session.connect(connector).await {
            Ok(()) => return Ok(session),
            Err(e) if e.is_auth() => {
                warn!("Password rejected ({} of {max_attempts})", attempt + 1)
            }
            Err(source) => return Err(ProvisionError::Session { addr, source }),
        }
    }

    Err(ProvisionError::PasswordsExhausted {
        attempts: max_attempts,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before the first attempt, while the device reboots.
    pub settle: Duration,
    pub interval: Duration,
    pub attempts: u32,
}

impl From<&Timings> for ReconnectPolicy {
    fn from(timings: &Timings) -> Self {
        Self {
            settle: timings.settle,
            interval: timings.reconnect_interval,
            attempts: timings.reconnect_attempts,
        }
    }
}

/// Polls until one of `candidates` opens a session, trying them in order on
/// every round. `None` once the attempts run out.
pub async fn reconnect(
    connector: &dyn ShellConnector,
    addr: Ipv4Addr,
    candidates: &[Credentials],
    policy: ReconnectPolicy,
) -> Option<RemoteSession> {
    tokio::time::sleep(policy.settle).await;

    for attempt in 1..=policy.attempts {
        for credentials in candidates {
            let mut session = RemoteSession::new(addr, credentials.clone());
            match session.connect(connector).await {
                Ok(()) => {
                    info!("Reconnected to {addr}");
                    return Some(session);
                }
                Err(e) => debug!(%addr, attempt, "not back yet: {e}"),
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    None
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
