//! HTTP API route definitions.

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health, hello, root};
use crate::middleware::{log_request, strip_trailing_slash, AccessLog};

/// The bare routes, without middleware.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/hello", get(hello))
        // Health endpoint
        .route("/health", get(health))
}

/// Create the API router.
///
/// Middleware runs outermost first: trailing-slash redirect, access log,
/// then a per-request trace span. Redirects are answered before the access
/// logger sees them.
pub fn create_router(access_log: AccessLog) -> Router {
    with_middleware(routes(), access_log)
}

/// Wrap any router in the standard middleware stack.
pub fn with_middleware(router: Router, access_log: AccessLog) -> Router {
    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(access_log, log_request))
        .layer(middleware::from_fn(strip_trailing_slash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::{HelloResponse, GREETING, HEALTH_OK, JSON_GREETING};
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    async fn get_from(uri: &str, peer: SocketAddr) -> axum::response::Response {
        let request = Request::builder()
            .uri(uri)
            .extension(ConnectInfo(peer))
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap()
    }

    fn app() -> Router {
        create_router(AccessLog::default())
    }

    async fn get(uri: &str) -> axum::response::Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_returns_greeting() {
        let response = get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, GREETING);
    }

    #[tokio::test]
    async fn hello_returns_json_message() {
        let response = get("/hello").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body: HelloResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.message, JSON_GREETING);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, HEALTH_OK);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = get("/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn trailing_slash_redirects_permanently() {
        let response = get("/hello/?a=1").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/hello?a=1");
    }

    #[tokio::test]
    async fn repeated_trailing_slashes_redirect() {
        let response = get("/foo///").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/foo");
    }

    #[tokio::test]
    async fn root_with_query_is_served() {
        let response = get("/?a=1").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn access_log_line_per_response() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let peer: SocketAddr = "[::1]:52000".parse().unwrap();

        let health = get_from("/health", peer).await;
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_string(health).await, HEALTH_OK);

        let missing = get_from("/missing", peer).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let redirect = get_from("/health/", peer).await;
        assert_eq!(redirect.status(), StatusCode::MOVED_PERMANENTLY);

        let access: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains(" access: "))
            .collect();
        assert_eq!(access.len(), 2, "one line per routed response: {access:?}");

        let line = &access[0];
        let message = &line[line.find(" access: [").unwrap() + " access: ".len()..];
        let (ts, rest) = message[1..].split_once("] ").unwrap();
        assert_eq!(ts.len(), "2025-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
        assert!(rest.starts_with("127.0.0.1 - GET /health 200 - "), "{rest}");
        let duration = rest["127.0.0.1 - GET /health 200 - ".len()..]
            .split_whitespace()
            .next()
            .unwrap();
        assert!(duration.ends_with("ms"));
        assert!(duration.trim_end_matches("ms").parse::<u64>().is_ok());

        assert!(access[1].contains("127.0.0.1 - GET /missing 404 - "));
    }
}
