//! Application configuration loaded from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use strum::Display;

/// Which supervisor control channel to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SupervisorMode {
    /// Detect from the environment.
    #[default]
    Auto,
    /// Run without a supervisor.
    None,
    /// systemd `sd_notify` protocol.
    Systemd,
    /// Line-oriented unix control socket.
    Socket,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Set `SO_REUSEPORT` so several workers can share one port.
    #[serde(default = "default_true")]
    pub reuse_port: bool,

    /// Grace period for draining connections on shutdown.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Take the client address from the first `X-Forwarded-For` entry.
    #[serde(default = "default_true")]
    pub trust_proxy: bool,

    // === Supervisor ===
    /// Supervisor control channel.
    #[serde(default)]
    pub supervisor: SupervisorMode,

    /// systemd notify socket, set by systemd for `Type=notify` units.
    #[serde(default)]
    pub notify_socket: Option<String>,

    /// Path of a unix stream socket speaking the line protocol.
    #[serde(default)]
    pub control_socket: Option<String>,

    // === Logging ===
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            reuse_port: default_true(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            trust_proxy: default_true(),
            supervisor: SupervisorMode::default(),
            notify_socket: None,
            control_socket: None,
            rust_log: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if self.shutdown_timeout_ms == 0 {
            return Err("SHUTDOWN_TIMEOUT_MS must be non-zero".to_string());
        }

        match self.supervisor {
            SupervisorMode::Socket if self.control_socket.is_none() => {
                Err("SUPERVISOR=socket requires CONTROL_SOCKET".to_string())
            }
            SupervisorMode::Systemd if self.notify_socket.is_none() => {
                Err("SUPERVISOR=systemd requires NOTIFY_SOCKET".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Grace period before a forced exit.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Supervisor mode after resolving `auto` against the environment.
    pub fn effective_supervisor(&self) -> SupervisorMode {
        match self.supervisor {
            SupervisorMode::Auto if self.control_socket.is_some() => SupervisorMode::Socket,
            SupervisorMode::Auto if self.notify_socket.is_some() => SupervisorMode::Systemd,
            SupervisorMode::Auto => SupervisorMode::None,
            mode => mode,
        }
    }
}
