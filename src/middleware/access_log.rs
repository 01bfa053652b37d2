//! Access logging.
//!
//! One line per request, written once the response is produced (status and
//! headers known, before the body is streamed):
//!
//! ```text
//! [2025-01-01T12:00:00.000Z] 127.0.0.1 - GET /hello 200 - 3ms
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use tracing::info;

/// Header carrying the proxy chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Placeholder when no client address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Access logger settings.
#[derive(Debug, Clone, Copy)]
pub struct AccessLog {
    /// Honour `X-Forwarded-For`.
    pub trust_proxy: bool,
}

impl Default for AccessLog {
    fn default() -> Self {
        Self { trust_proxy: true }
    }
}

/// Resolve the client address for logging.
///
/// With `trust_proxy`, the first `X-Forwarded-For` entry wins; otherwise the
/// connection's peer address is used.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get(X_FORWARDED_FOR))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => normalize_ip(addr),
        (None, Some(ip)) => normalize_ip(&ip.to_string()),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

/// Strip the IPv4-mapped prefix and map `::1` to `127.0.0.1`.
pub fn normalize_ip(addr: &str) -> String {
    let addr = addr.trim();
    if addr.is_empty() {
        return UNKNOWN_CLIENT.to_string();
    }

    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) if v6.is_loopback() => "127.0.0.1".to_string(),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Ok(IpAddr::V4(v4)) => v4.to_string(),
        Err(_) => addr
            .strip_prefix("::ffff:")
            .unwrap_or(addr)
            .to_string(),
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Middleware emitting the access log line once the response is produced.
pub async fn log_request(State(settings): State<AccessLog>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = resolve_client_ip(request.headers(), peer, settings.trust_proxy);

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();
    info!(
        target: "access",
        client_ip = %client_ip,
        method = %method,
        path = %path,
        status,
        duration_ms = duration_ms as u64,
        "[{}] {} - {} {} {} - {}ms",
        timestamp(),
        client_ip,
        method,
        path,
        status,
        duration_ms
    );

    response
}
