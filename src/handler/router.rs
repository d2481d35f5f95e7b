//! Request entry point
//!
//! Method validation, header extraction, dispatch to the file handler, and
//! access logging.

use crate::config::AppState;
use crate::handler::static_files;
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Raw (still percent-encoded) URL path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    pub range_header: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn from_parts(parts: &'a Parts) -> Self {
        let headers = &parts.headers;
        Self {
            path: parts.uri.path(),
            query: parts.uri.query(),
            is_head: parts.method == Method::HEAD,
            if_none_match: header_str(headers, "if-none-match"),
            if_modified_since: header_str(headers, "if-modified-since"),
            range_header: header_str(headers, "range"),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Main entry point for HTTP request handling
///
/// Request bodies are never read; only the head matters to a file server.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();

    let mut response = match check_http_method(&parts.method) {
        Some(resp) => resp,
        None => static_files::serve(&RequestContext::from_parts(&parts), &state).await,
    };

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert("Server", server);
    }

    if state.access_log() {
        log_access(&parts, &response, peer_addr, started, &state);
    }

    Ok(response)
}

/// Answer anything other than GET/HEAD without touching the file system
fn check_http_method(method: &Method) -> Option<HttpResponse> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn log_access(
    req: &Parts,
    response: &HttpResponse,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method.to_string(),
        req.uri.path().to_string(),
    );
    entry.query = req.uri.query().map(ToString::to_string);
    entry.http_version = match req.version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().filter(|&n| n > 0);
    entry.referer = header_str(&req.headers, "referer").map(ToString::to_string);
    entry.user_agent = header_str(&req.headers, "user-agent").map(ToString::to_string);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::body::Bytes;
    use hyper::StatusCode;
    use std::path::PathBuf;

    fn state_for(name: &str) -> (Arc<AppState>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("clock-router-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("static")).unwrap();
        std::fs::create_dir_all(dir.join("empty")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>clock</h1>").unwrap();
        std::fs::write(dir.join("static/app.js"), "const DEFAULT_SECONDS = 120;").unwrap();

        let mut config = Config::default();
        config.server.root = Some(dir.to_string_lossy().into_owned());
        config.logging.access_log = false;
        (Arc::new(AppState::new(config).unwrap()), dir)
    }

    async fn call(state: &Arc<AppState>, method: Method, uri: &str) -> HttpResponse {
        let req = Request::builder().method(method).uri(uri).body(()).unwrap();
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        handle_request(req, Arc::clone(state), peer).await.unwrap()
    }

    async fn body_of(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_serves_file_with_type() {
        let (state, dir) = state_for("file");
        let response = call(&state, Method::GET, "/static/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Content-Type"], "text/javascript; charset=utf-8");
        assert!(response.headers()["Server"].to_str().unwrap().starts_with("clock_server/"));
        assert_eq!(body_of(response).await, "const DEFAULT_SECONDS = 120;");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let (state, dir) = state_for("index");
        let response = call(&state, Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "<h1>clock</h1>");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_directory_redirect_keeps_query() {
        let (state, dir) = state_for("redirect");
        let response = call(&state, Method::GET, "/static?x=1").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["Location"], "/static/?x=1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_directory_redirect_stays_on_host() {
        let (state, dir) = state_for("redirect-host");
        for uri in ["//static", "///static", "/./static"] {
            let response = call(&state, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY, "{uri}");
            assert_eq!(response.headers()["Location"], "/static/", "{uri}");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_listing_and_disabled_listing() {
        let (state, dir) = state_for("listing");
        let response = call(&state, Method::GET, "/static/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_of(response).await;
        assert!(String::from_utf8_lossy(&body).contains("href=\"app.js\""));

        let mut config = state.config.clone();
        config.http.directory_listing = false;
        let quiet = Arc::new(AppState::new(config).unwrap());
        assert_eq!(call(&quiet, Method::GET, "/empty/").await.status(), StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (state, dir) = state_for("errors");
        assert_eq!(call(&state, Method::GET, "/missing.css").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(call(&state, Method::GET, "/%2e%2e/etc/passwd").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(call(&state, Method::GET, "/bad%zz").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(call(&state, Method::POST, "/index.html").await.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(call(&state, Method::OPTIONS, "/").await.status(), StatusCode::NO_CONTENT);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_path_is_500() {
        let (state, dir) = state_for("io-error");
        std::os::unix::fs::symlink(dir.join("spin"), dir.join("spin")).unwrap();

        let response = call(&state, Method::GET, "/spin").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let (state, dir) = state_for("head");
        let response = call(&state, Method::HEAD, "/index.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Content-Length"], "14");
        assert!(body_of(response).await.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_conditional_and_range() {
        let (state, dir) = state_for("conditional");
        let first = call(&state, Method::GET, "/index.html").await;
        let etag = first.headers()["ETag"].to_str().unwrap().to_string();

        let req = Request::builder()
            .uri("/index.html")
            .header("If-None-Match", etag)
            .body(())
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let response = handle_request(req, Arc::clone(&state), peer).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        let req = Request::builder()
            .uri("/index.html")
            .header("Range", "bytes=1-2")
            .body(())
            .unwrap();
        let response = handle_request(req, Arc::clone(&state), peer).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body_of(response).await, "h1");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
