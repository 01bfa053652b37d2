//! Trailing-slash normalization.
//!
//! `GET /hello/?a=1` is answered with `301 Location: /hello?a=1`. The root
//! path is left alone. The path is parsed with the WHATWG URL parser so
//! percent-encoded characters and repeated slashes are handled the way a
//! browser would; the query string is copied through byte for byte.

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use url::Url;

/// Where to redirect `uri`, or `None` to let the request through.
///
/// `host` is the request's `Host` header, used only as the parse base.
/// Parse failures also yield `None`.
pub fn redirect_target(uri: &Uri, host: Option<&str>) -> Option<String> {
    let path = uri.path();
    if path == "/" || !path.ends_with('/') {
        return None;
    }

    let base = format!("http://{}", host.unwrap_or("localhost"));
    let parsed = match Url::parse(&base).and_then(|base| base.join(path)) {
        Ok(url) => url,
        Err(e) => {
            warn!(path, error = %e, "Failed to parse request URL, skipping normalization");
            return None;
        }
    };

    let trimmed = parsed.path().trim_end_matches('/');
    let mut target = if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    };

    if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    Some(target)
}

/// Middleware issuing the permanent redirect.
pub async fn strip_trailing_slash(request: Request, next: Next) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok());

    let Some(target) = redirect_target(request.uri(), host) else {
        return next.run(request).await;
    };

    match HeaderValue::from_str(&target) {
        Ok(location) => {
            debug!(from = %request.uri(), to = %target, "Redirecting trailing slash");
            (
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
                format!("Moved Permanently. Redirecting to {target}"),
            )
                .into_response()
        }
        Err(e) => {
            warn!(target = %target, error = %e, "Invalid redirect location, skipping normalization");
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target(uri: &str) -> Option<String> {
        redirect_target(&uri.parse::<Uri>().unwrap(), Some("example.com"))
    }

    #[test]
    fn root_is_never_redirected() {
        assert_eq!(target("/"), None);
        assert_eq!(target("/?a=1"), None);
    }

    #[test]
    fn paths_without_trailing_slash_pass_through() {
        assert_eq!(target("/hello"), None);
        assert_eq!(target("/hello?next=/"), None);
    }

    #[test]
    fn strips_single_trailing_slash() {
        assert_eq!(target("/foo/"), Some("/foo".to_string()));
    }

    #[test]
    fn strips_repeated_trailing_slashes() {
        assert_eq!(target("/foo///"), Some("/foo".to_string()));
        assert_eq!(target("/a/b//"), Some("/a/b".to_string()));
    }

    #[test]
    fn keeps_query_string() {
        assert_eq!(target("/foo/?a=1"), Some("/foo?a=1".to_string()));
        assert_eq!(
            target("/foo//?a=1&b=%2F&c='x'"),
            Some("/foo?a=1&b=%2F&c='x'".to_string())
        );
    }

    #[test]
    fn empty_query_is_dropped() {
        assert_eq!(target("/foo/?"), Some("/foo".to_string()));
    }

    #[test]
    fn keeps_percent_encoding() {
        assert_eq!(target("/a%20b/"), Some("/a%20b".to_string()));
        assert_eq!(target("/a%2Fb/"), Some("/a%2Fb".to_string()));
    }

    #[test]
    fn dot_segments_resolve_to_root() {
        assert_eq!(target("/a/../"), Some("/".to_string()));
    }

    #[test]
    fn unparseable_input_passes_through() {
        // Scheme-relative: the URL parser reads an empty host.
        assert_eq!(target("//"), None);
        let uri: Uri = "/foo/".parse().unwrap();
        assert_eq!(redirect_target(&uri, Some("bad host")), None);
    }

    #[test]
    fn missing_host_uses_localhost() {
        let uri: Uri = "/foo/".parse().unwrap();
        assert_eq!(redirect_target(&uri, None), Some("/foo".to_string()));
    }
}
