//! External process supervisor integration.
//!
//! The server only needs two things from a supervisor: a way to say "ready"
//! once the socket is listening, and a way to hear "shut down". Three
//! backends are supported:
//!
//! - `Standalone`: nothing to talk to; shutdown comes from signals only.
//! - `Systemd`: `sd_notify` datagrams on `NOTIFY_SOCKET` (`Type=notify` units).
//! - `ControlSocket`: a unix stream socket speaking newline-delimited text.
//!   The server writes `ready` and reacts to `shutdown`.

use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
#[cfg(unix)]
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use crate::config::{Config, SupervisorMode};
use crate::error::SupervisorError;

/// Message written to the control socket once listening.
pub const READY_MESSAGE: &str = "ready";

/// Message from the control socket that requests graceful shutdown.
pub const SHUTDOWN_MESSAGE: &str = "shutdown";

/// A message received from the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Begin graceful shutdown.
    Shutdown,
    /// Anything else; logged and ignored.
    Other(String),
}

impl ControlMessage {
    /// Parse one line from the control socket.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == SHUTDOWN_MESSAGE {
            ControlMessage::Shutdown
        } else {
            ControlMessage::Other(line.to_string())
        }
    }
}

/// Connection to the process supervisor.
#[derive(Debug)]
pub enum Supervisor {
    /// No supervisor.
    Standalone,
    /// systemd notify socket.
    #[cfg(unix)]
    Systemd(NotifySocket),
    /// Line-oriented control socket.
    #[cfg(unix)]
    ControlSocket(ControlChannel),
}

impl Supervisor {
    /// Connect to the supervisor selected by `config`.
    pub async fn connect(config: &Config) -> Result<Self, SupervisorError> {
        match config.effective_supervisor() {
            SupervisorMode::Auto | SupervisorMode::None => Ok(Supervisor::Standalone),
            SupervisorMode::Systemd => {
                let path = config
                    .notify_socket
                    .clone()
                    .ok_or(SupervisorError::MissingEndpoint {
                        mode: "systemd",
                        variable: "NOTIFY_SOCKET",
                    })?;
                Self::systemd(path)
            }
            SupervisorMode::Socket => {
                let path = config
                    .control_socket
                    .clone()
                    .ok_or(SupervisorError::MissingEndpoint {
                        mode: "socket",
                        variable: "CONTROL_SOCKET",
                    })?;
                Self::control_socket(path).await
            }
        }
    }

    #[cfg(unix)]
    fn systemd(path: String) -> Result<Self, SupervisorError> {
        Ok(Supervisor::Systemd(NotifySocket::new(path)))
    }

    #[cfg(not(unix))]
    fn systemd(_path: String) -> Result<Self, SupervisorError> {
        Err(SupervisorError::Unsupported("systemd"))
    }

    #[cfg(unix)]
    async fn control_socket(path: String) -> Result<Self, SupervisorError> {
        Ok(Supervisor::ControlSocket(ControlChannel::connect(path).await?))
    }

    #[cfg(not(unix))]
    async fn control_socket(_path: String) -> Result<Self, SupervisorError> {
        Err(SupervisorError::Unsupported("socket"))
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Supervisor::Standalone => "standalone",
            #[cfg(unix)]
            Supervisor::Systemd(_) => "systemd",
            #[cfg(unix)]
            Supervisor::ControlSocket(_) => "control-socket",
        }
    }

    /// Tell the supervisor the server is accepting connections.
    pub async fn notify_ready(&mut self) -> Result<(), SupervisorError> {
        match self {
            Supervisor::Standalone => Ok(()),
            #[cfg(unix)]
            Supervisor::Systemd(socket) => {
                socket.send(&format!("READY=1\nMAINPID={}", std::process::id()))
            }
            #[cfg(unix)]
            Supervisor::ControlSocket(channel) => channel.send(READY_MESSAGE).await,
        }
    }

    /// Tell the supervisor shutdown has begun.
    pub async fn notify_stopping(&mut self) -> Result<(), SupervisorError> {
        match self {
            #[cfg(unix)]
            Supervisor::Systemd(socket) => socket.send("STOPPING=1"),
            _ => Ok(()),
        }
    }

    /// Resolve once the supervisor asks for a graceful shutdown.
    ///
    /// Never resolves for supervisors that only use signals.
    pub async fn shutdown_requested(&mut self) {
        match self {
            #[cfg(unix)]
            Supervisor::ControlSocket(channel) => channel.wait_for_shutdown().await,
            _ => std::future::pending().await,
        }
    }
}

/// systemd `sd_notify` endpoint.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct NotifySocket {
    path: String,
}

#[cfg(unix)]
impl NotifySocket {
    /// Create a notifier for the given `NOTIFY_SOCKET` value.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Send one notification datagram.
    pub fn send(&self, message: &str) -> Result<(), SupervisorError> {
        use std::os::unix::net::UnixDatagram;

        let send_err = |source| SupervisorError::Send {
            message: message.to_string(),
            source,
        };

        let socket = UnixDatagram::unbound().map_err(send_err)?;
        match self.path.strip_prefix('@') {
            Some(name) => send_abstract(&socket, name, message).map_err(send_err)?,
            None => {
                socket
                    .send_to(message.as_bytes(), &self.path)
                    .map_err(send_err)?;
            }
        }
        debug!(path = %self.path, message, "Sent systemd notification");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn send_abstract(
    socket: &std::os::unix::net::UnixDatagram,
    name: &str,
    message: &str,
) -> std::io::Result<()> {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    socket.send_to_addr(message.as_bytes(), &addr)?;
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn send_abstract(
    _socket: &std::os::unix::net::UnixDatagram,
    _name: &str,
    _message: &str,
) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "abstract notify sockets are linux-only",
    ))
}

/// Newline-delimited control socket.
#[cfg(unix)]
#[derive(Debug)]
pub struct ControlChannel {
    path: String,
    lines: Option<Lines<BufReader<OwnedReadHalf>>>,
    writer: OwnedWriteHalf,
}

#[cfg(unix)]
impl ControlChannel {
    /// Connect to the control socket at `path`.
    pub async fn connect(path: impl Into<String>) -> Result<Self, SupervisorError> {
        let path = path.into();
        let stream = tokio::net::UnixStream::connect(&path)
            .await
            .map_err(|source| SupervisorError::Connect {
                path: path.clone(),
                source,
            })?;
        let (read, writer) = stream.into_split();
        info!(path = %path, "Connected to supervisor control socket");

        Ok(Self {
            path,
            lines: Some(BufReader::new(read).lines()),
            writer,
        })
    }

    /// Write one line.
    pub async fn send(&mut self, message: &str) -> Result<(), SupervisorError> {
        let line = format!("{message}\n");
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|source| SupervisorError::Send {
                message: message.to_string(),
                source,
            })?;
        debug!(path = %self.path, message, "Sent control message");
        Ok(())
    }

    /// Read lines until `shutdown` arrives.
    ///
    /// A closed or broken channel can no longer deliver a shutdown request,
    /// so after that this never resolves.
    pub async fn wait_for_shutdown(&mut self) {
        while let Some(lines) = self.lines.as_mut() {
            match lines.next_line().await {
                Ok(Some(line)) => match ControlMessage::parse(&line) {
                    ControlMessage::Shutdown => {
                        info!("Received shutdown message from supervisor");
                        return;
                    }
                    ControlMessage::Other(other) => {
                        debug!(message = %other, "Ignoring control message");
                    }
                },
                Ok(None) => {
                    warn!(path = %self.path, "Supervisor control socket closed");
                    self.lines = None;
                }
                Err(e) => {
                    warn!(path = %self.path, error = %e, "Supervisor control socket read failed");
                    self.lines = None;
                }
            }
        }
        std::future::pending::<()>().await
    }
}
