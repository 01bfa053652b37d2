//! Minimal greeting HTTP server.
//!
//! Three static routes wrapped in the plumbing a supervised worker process
//! needs:
//!
//! ```text
//! GET /        -> 200 "💗 HELLO AXUM!"
//! GET /hello   -> 200 {"message": "💗 HELLO AXUM FROM JSON!"}
//! GET /health  -> 200 "💗 AXUM: HEALTH CHECK SUCCESS"
//! ```
//!
//! Requests to a non-root path with trailing slashes are redirected (301)
//! to the stripped path, every request is access-logged, and the process
//! drains connections on SIGINT/SIGTERM or a supervisor `shutdown` message,
//! exiting 1 if the drain outlives the grace period.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`api`]: Route handlers and router assembly
//! - [`middleware`]: Trailing-slash redirects and access logging
//! - [`lifecycle`]: State machine, signals, supervisor and fault handling
//! - [`server`]: Socket binding and graceful shutdown

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod server;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::{Server, ShutdownOutcome};
