//! Unified error types for the greeter server.

use std::net::SocketAddr;

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Unified error type for the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Listening socket could not be created.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Supervisor control channel error.
    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Lifecycle state machine error.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Errors talking to the external process supervisor.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The supervisor mode needs an env variable that is not set.
    #[error("{mode} supervisor requires {variable} to be set")]
    MissingEndpoint {
        /// Supervisor mode.
        mode: &'static str,
        /// Missing variable name.
        variable: &'static str,
    },

    /// Could not connect to the control socket.
    #[error("failed to connect to control socket {path}: {source}")]
    Connect {
        /// Socket path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Could not deliver a notification.
    #[error("failed to send {message:?} to supervisor: {source}")]
    Send {
        /// The message that was being sent.
        message: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The platform has no support for this supervisor.
    #[error("{0} supervisor is not supported on this platform")]
    Unsupported(&'static str),
}

/// Lifecycle state machine errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    /// Attempted a transition the state machine does not allow.
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServerError>;
