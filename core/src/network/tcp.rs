use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// What a single connect attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The handshake completed.
    Connected,
    /// The host answered with a reset: alive, port closed.
    Refused,
    /// Nothing answered within the budget.
    Silent,
}

impl ProbeOutcome {
    /// Something at the address answered at all.
    pub fn answered(self) -> bool {
        matches!(self, ProbeOutcome::Connected | ProbeOutcome::Refused)
    }
}

#[async_trait]
pub trait PortProber: Send + Sync {
    /// `Err` is reserved for faults that say nothing about the remote host,
    /// such as running out of sockets. Callers must not treat it as a miss.
    async fn probe(&self, addr: SocketAddrV4) -> io::Result<ProbeOutcome>;
}

/// Plain TCP handshake with a short per-attempt budget.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    budget: Duration,
}

impl TcpProber {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

#[async_trait]
impl PortProber for TcpProber {
    async fn probe(&self, addr: SocketAddrV4) -> io::Result<ProbeOutcome> {
        match timeout(self.budget, TcpStream::connect(SocketAddr::V4(addr))).await {
            Ok(Ok(_stream)) => Ok(ProbeOutcome::Connected),
            Ok(Err(err)) => classify(err),
            Err(_elapsed) => Ok(ProbeOutcome::Silent),
        }
    }
}

fn classify(err: io::Error) -> io::Result<ProbeOutcome> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Ok(ProbeOutcome::Refused),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::TimedOut
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable => Ok(ProbeOutcome::Silent),
        _ => Err(err),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
