//! Shutdown triggers: termination signals and supervisor messages.

use strum::Display;
use tracing::{info, warn};

use super::supervisor::Supervisor;

/// Why graceful shutdown started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShutdownReason {
    /// SIGINT or Ctrl+C.
    #[strum(serialize = "SIGINT")]
    Interrupt,
    /// SIGTERM.
    #[strum(serialize = "SIGTERM")]
    Terminate,
    /// Shutdown message from the supervisor.
    #[strum(serialize = "supervisor message")]
    Message,
}

/// SIGTERM and SIGINT listeners.
///
/// Until a listener is registered the default action applies and either
/// signal kills the process outright, so install these before the socket is
/// bound and before readiness is reported.
#[derive(Debug)]
pub struct ShutdownSignals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Register the listeners now. Must be called inside the runtime.
    ///
    /// A listener that cannot be registered is logged and never fires; the
    /// other triggers still work.
    pub fn install() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let register = |kind: SignalKind, name: &str| match signal(kind) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, signal = name, "Failed to register signal handler");
                None
            }
        };

        Self {
            terminate: register(SignalKind::terminate(), "SIGTERM"),
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
        }
    }

    /// Wait for the first signal.
    pub async fn recv(mut self) -> ShutdownReason {
        use tokio::signal::unix::Signal;

        async fn next(signal: Option<&mut Signal>) {
            match signal {
                Some(s) => {
                    s.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        }

        tokio::select! {
            _ = next(self.terminate.as_mut()) => {
                info!("Received SIGTERM");
                ShutdownReason::Terminate
            }
            _ = next(self.interrupt.as_mut()) => {
                info!("Received SIGINT");
                ShutdownReason::Interrupt
            }
        }
    }
}

#[cfg(not(unix))]
impl ShutdownSignals {
    /// Ctrl+C is the only trigger off unix; tokio registers it on first poll.
    pub fn install() -> Self {
        Self {}
    }

    /// Wait for Ctrl+C.
    pub async fn recv(self) -> ShutdownReason {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to wait for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
        ShutdownReason::Interrupt
    }
}

/// Wait for whichever shutdown trigger fires first, `signal` or a supervisor
/// message, then tell the supervisor we are stopping.
pub async fn wait_for_shutdown<F>(supervisor: &mut Supervisor, signal: F) -> ShutdownReason
where
    F: std::future::Future<Output = ShutdownReason>,
{
    let reason = tokio::select! {
        reason = signal => reason,
        _ = supervisor.shutdown_requested() => ShutdownReason::Message,
    };

    if let Err(e) = supervisor.notify_stopping().await {
        warn!(error = %e, "Failed to notify supervisor of shutdown");
    }
    reason
}
