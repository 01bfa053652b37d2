//! Listening socket and graceful shutdown orchestration.
//!
//! Sequence:
//!
//! 1. register SIGTERM/SIGINT listeners
//! 2. bind the socket (`Starting -> Listening`)
//! 3. tell the supervisor we are ready
//! 4. serve until a signal or supervisor message arrives
//!    (`Listening -> ShuttingDown`)
//! 5. stop accepting and drain in-flight requests, racing a grace timer
//!    (`ShuttingDown -> Terminated`)

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use strum::Display;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::lifecycle::{
    spawn_supervised, wait_for_shutdown, Lifecycle, LifecycleState, ShutdownReason,
    ShutdownSignals, Supervisor, FAILURE_EXIT_CODE,
};
use crate::middleware::AccessLog;

/// Pending-connection backlog for the listening socket.
const LISTEN_BACKLOG: u32 = 1024;

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownOutcome {
    /// All in-flight requests finished within the grace period.
    #[strum(serialize = "clean")]
    Clean,
    /// The grace period expired first.
    #[strum(serialize = "forced")]
    Forced,
}

impl ShutdownOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Forced => FAILURE_EXIT_CODE,
        }
    }
}

/// HTTP server with lifecycle management.
#[derive(Debug)]
pub struct Server {
    router: Router,
    grace: Duration,
    lifecycle: Lifecycle,
}

impl Server {
    /// Create a server for `router` with the given drain grace period.
    pub fn new(router: Router, grace: Duration) -> Self {
        Self {
            router,
            grace,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Create the standard server from configuration.
    pub fn from_config(config: &Config) -> Self {
        let access_log = AccessLog {
            trust_proxy: config.trust_proxy,
        };
        Self::new(create_router(access_log), config.shutdown_timeout())
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Bind the listening socket.
    ///
    /// With `reuse_port`, several worker processes can bind the same port and
    /// the kernel spreads connections across them.
    pub fn bind(&self, addr: SocketAddr, reuse_port: bool) -> Result<TcpListener> {
        match bind_listener(addr, reuse_port) {
            Ok(listener) => Ok(listener),
            Err(source) => {
                self.lifecycle.transition(LifecycleState::Terminated)?;
                Err(ServerError::Bind { addr, source })
            }
        }
    }

    /// Serve on `listener` until `signal` resolves or the supervisor asks
    /// for shutdown, then drain.
    pub async fn serve<F>(
        self,
        listener: TcpListener,
        mut supervisor: Supervisor,
        signal: F,
    ) -> Result<ShutdownOutcome>
    where
        F: Future<Output = ShutdownReason> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        self.lifecycle.transition(LifecycleState::Listening)?;
        info!(
            "Server is running on http://localhost:{} [PID: {}]",
            addr.port(),
            std::process::id()
        );

        match supervisor.notify_ready().await {
            Ok(()) => info!(supervisor = supervisor.kind(), "Readiness signalled"),
            Err(e) => warn!(supervisor = supervisor.kind(), error = %e, "Failed to signal readiness"),
        }

        let (reason_tx, reason_rx) = oneshot::channel();
        let trigger = async move {
            let reason = wait_for_shutdown(&mut supervisor, signal).await;
            let _ = reason_tx.send(reason);
        };

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let mut server = spawn_supervised("http-server", async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(trigger)
                .await
        });

        let reason = match reason_rx.await {
            Ok(reason) => reason,
            Err(_) => {
                error!("HTTP server stopped before shutdown was requested");
                return Err(ServerError::Serve(std::io::Error::other(
                    "server stopped unexpectedly",
                )));
            }
        };

        self.lifecycle.transition(LifecycleState::ShuttingDown)?;
        info!(reason = %reason, "Server is shutting down gracefully...");

        let outcome = match tokio::time::timeout(self.grace, &mut server).await {
            Ok(Ok(())) => {
                info!("Server closed");
                ShutdownOutcome::Clean
            }
            Ok(Err(e)) => {
                error!(error = %e, "HTTP server task failed during shutdown");
                ShutdownOutcome::Forced
            }
            Err(_) => {
                server.abort();
                error!(
                    grace_ms = self.grace.as_millis() as u64,
                    "Forced shutdown after timeout"
                );
                ShutdownOutcome::Forced
            }
        };

        self.lifecycle.transition(LifecycleState::Terminated)?;
        Ok(outcome)
    }
}

fn bind_listener(addr: SocketAddr, reuse_port: bool) -> std::io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    if reuse_port {
        socket.set_reuseport(true)?;
    }
    #[cfg(not(unix))]
    let _ = reuse_port;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Run the configured server until shutdown.
pub async fn run(config: &Config) -> Result<ShutdownOutcome> {
    config.validate().map_err(ServerError::InvalidConfig)?;
    // Armed before readiness so an early SIGTERM still drains.
    let signals = ShutdownSignals::install();
    let supervisor = Supervisor::connect(config).await?;
    let server = Server::from_config(config);
    let listener = server.bind(config.bind_addr(), config.reuse_port)?;
    server.serve(listener, supervisor, signals.recv()).await
}
