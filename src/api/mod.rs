//! HTTP API module: greeting, JSON and health endpoints.

pub mod handlers;
pub mod routes;

pub use routes::{create_router, routes};
