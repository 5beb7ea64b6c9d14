//! # Firmware Server
//!
//! A throwaway static file server the adapter downloads its firmware from.
//! It shuts itself down once the device has gone quiet for the idle period,
//! so the caller can simply await it.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use atacfg_common::error::ProvisionError;

/// Budget for the "is something already listening" check.
const COLLISION_PROBE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("something is already listening on {0}")]
    PortInUse(SocketAddrV4),
    #[error("asset directory {} does not exist", .0.display())]
    MissingRoot(PathBuf),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("server stopped unexpectedly: {0}")]
    Serve(String),
}

impl From<ServerError> for ProvisionError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::PortInUse(addr) => ProvisionError::PortInUse { addr },
            other => ProvisionError::Server {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeReport {
    pub requests: usize,
    pub elapsed: Duration,
}

pub struct FirmwareServer {
    root: PathBuf,
    addr: SocketAddrV4,
    idle: Duration,
}

impl FirmwareServer {
    pub fn new(root: impl Into<PathBuf>, addr: SocketAddrV4, idle: Duration) -> Self {
        Self {
            root: root.into(),
            addr,
            idle,
        }
    }

    /// Binds and serves in the background.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        if !tokio::fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
        {
            return Err(ServerError::MissingRoot(self.root));
        }
        ensure_port_free(self.addr).await?;

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: self.addr,
            source,
        })?;

        let (activity_tx, activity_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let app = Router::new()
            .fallback_service(ServeDir::new(&self.root))
            .layer(middleware::from_fn_with_state(activity_tx, track_request));

        let idle = self.idle;
        let shutdown = async move {
            let requests = idle_watchdog(activity_rx, idle, stop_rx).await;
            let _ = done_tx.send(requests);
        };

        info!("Serving {} on {local_addr}", self.root.display());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        });

        Ok(RunningServer {
            local_addr,
            started: Instant::now(),
            handle,
            done: done_rx,
            stop: stop_tx,
        })
    }

    /// Serves until the idle period passes without a request.
    pub async fn run(self) -> Result<ServeReport, ServerError> {
        self.start().await?.wait().await
    }
}

pub struct RunningServer {
    local_addr: SocketAddr,
    started: Instant,
    handle: JoinHandle<io::Result<()>>,
    done: oneshot::Receiver<usize>,
    stop: oneshot::Sender<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn wait(self) -> Result<ServeReport, ServerError> {
        let RunningServer {
            started,
            handle,
            done,
            stop,
            ..
        } = self;
        let report = finish(started, handle, done).await;
        drop(stop);
        report
    }

    /// Stops without waiting for the idle period.
    pub async fn stop(self) -> Result<ServeReport, ServerError> {
        let _ = self.stop.send(());
        finish(self.started, self.handle, self.done).await
    }
}

async fn finish(
    started: Instant,
    handle: JoinHandle<io::Result<()>>,
    done: oneshot::Receiver<usize>,
) -> Result<ServeReport, ServerError> {
    handle
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    let report = ServeReport {
        requests: done.await.unwrap_or_default(),
        elapsed: started.elapsed(),
    };
    info!(
        "Update server stopped after {} request(s) in {:.0?}",
        report.requests, report.elapsed
    );
    Ok(report)
}

/// Refuses to start when anything already answers on `addr`.
pub async fn ensure_port_free(addr: SocketAddrV4) -> Result<(), ServerError> {
    if addr.port() == 0 {
        return Ok(());
    }
    match timeout(COLLISION_PROBE, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => Err(ServerError::PortInUse(addr)),
        _ => Ok(()),
    }
}

async fn track_request(
    State(activity): State<mpsc::UnboundedSender<String>>,
    request: Request,
    next: Next,
) -> Response {
    let _ = activity.send(request.uri().path().to_string());
    next.run(request).await
}

/// Resolves once `idle` passes with no request, or when the stop handle
/// fires or is dropped.
/// Returns the number of requests seen.
async fn idle_watchdog(
    mut activity: mpsc::UnboundedReceiver<String>,
    idle: Duration,
    mut stop: oneshot::Receiver<()>,
) -> usize {
    let mut requests = 0;
    loop {
        tokio::select! {
            seen = activity.recv() => match seen {
                Some(path) => {
                    requests += 1;
                    info!("Update stage {requests}");
                    debug!(%path, "request");
                }
                None => break,
            },
            _ = tokio::time::sleep(idle) => {
                debug!(?idle, "no requests within the idle period");
                break;
            }
            _ = &mut stop => break,
        }
    }
    requests
}

#[async_trait]
pub trait FirmwareHost: Send + Sync {
    /// Fails early when the port is taken, before the device is told to
    /// download anything.
    async fn ensure_available(&self, addr: SocketAddrV4) -> Result<(), ServerError>;

    async fn serve(&self, addr: SocketAddrV4) -> Result<ServeReport, ServerError>;
}

pub struct HttpFirmwareHost {
    root: PathBuf,
    idle: Duration,
}

impl HttpFirmwareHost {
    pub fn new(root: impl Into<PathBuf>, idle: Duration) -> Self {
        Self {
            root: root.into(),
            idle,
        }
    }
}

#[async_trait]
impl FirmwareHost for HttpFirmwareHost {
    async fn ensure_available(&self, addr: SocketAddrV4) -> Result<(), ServerError> {
        ensure_port_free(addr).await
    }

    async fn serve(&self, addr: SocketAddrV4) -> Result<ServeReport, ServerError> {
        FirmwareServer::new(self.root.clone(), addr, self.idle)
            .run()
            .await
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
