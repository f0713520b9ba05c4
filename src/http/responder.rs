//! The canned responses served on every transport.
//!
//! # Responsibilities
//! - Classify each request as sleep, hello, or method-not-allowed
//! - Hold `/sleep/<n>` requests for `n` seconds before answering
//! - Emit the same header set on every successful response

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use chrono::Local;
use percent_encoding::percent_decode_str;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::net::Transport;

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = "gophr";

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sleep for the given number of seconds, then answer.
    Sleep(u64),
    /// Answer immediately with the greeting.
    Hello,
    /// Anything that is not a GET.
    MethodNotAllowed,
}

/// Extract `<n>` from `/sleep/<n>`.
///
/// Returns 0 for any path that is not exactly two segments with `sleep` first
/// and a non-negative integer second.
pub fn parse_sleep_seconds(path: &str) -> u64 {
    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(""), Some("sleep"), Some(n), None) => match n.parse::<u64>() {
            Ok(secs) => secs,
            Err(e) => {
                tracing::debug!(segment = n, error = %e, "Ignoring malformed sleep duration");
                0
            }
        },
        _ => 0,
    }
}

/// The percent-decoded request path, as routing sees it.
pub fn decoded_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Decide what to do with a request. `path` is already decoded.
pub fn classify(method: &Method, path: &str) -> Outcome {
    if method != Method::GET {
        return Outcome::MethodNotAllowed;
    }
    match parse_sleep_seconds(path) {
        0 => Outcome::Hello,
        secs => Outcome::Sleep(secs),
    }
}

/// Request handler shared by the HTTP and FastCGI servers.
#[derive(Debug, Clone)]
pub struct Responder {
    keep_alive_secs: u64,
}

impl Responder {
    /// `keep_alive_secs` of zero omits the `Keep-Alive` header.
    pub fn new(keep_alive_secs: u64) -> Self {
        Self { keep_alive_secs }
    }

    /// Build the Axum router. Every path and method lands on one handler.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(respond)
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// The headers attached to every 200 response.
    pub fn headers(&self, content_length: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        if self.keep_alive_secs != 0 {
            if let Ok(value) = HeaderValue::from_str(&format!("timeout={}", self.keep_alive_secs)) {
                headers.insert(KEEP_ALIVE, value);
            }
        }
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
        headers
    }

    fn text(&self, body: String) -> Response {
        (StatusCode::OK, self.headers(body.len()), body).into_response()
    }
}

/// Body of the `/sleep/<n>` response.
pub fn slept_body(start: &str, end: &str, secs: u64) -> String {
    format!("[{end}] slept for {secs} seconds starting @{start}")
}

/// Body of the greeting response.
pub fn hello_body(now: &str) -> String {
    format!("[{now}] Hello World\n")
}

async fn respond(State(responder): State<Responder>, request: Request<Body>) -> Response {
    let transport = request
        .extensions()
        .get::<Transport>()
        .copied()
        .unwrap_or(Transport::Http);
    let method = request.method().clone();
    let path = decoded_path(request.uri().path());

    tracing::debug!(
        transport = %transport,
        method = %method,
        path = %path,
        "Handling request"
    );

    match classify(&method, &path) {
        Outcome::Sleep(secs) => {
            let start = Local::now();
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let end = Local::now();
            tracing::debug!(transport = %transport, secs, "Sleep finished");
            responder.text(slept_body(&start.to_string(), &end.to_string(), secs))
        }
        Outcome::Hello => responder.text(hello_body(&Local::now().to_string())),
        Outcome::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[test]
    fn sleep_path_parses() {
        assert_eq!(parse_sleep_seconds("/sleep/5"), 5);
        assert_eq!(parse_sleep_seconds("/sleep/60"), 60);
        assert_eq!(parse_sleep_seconds("/sleep/0"), 0);
    }

    #[test]
    fn malformed_sleep_paths_are_zero() {
        for path in [
            "/sleep",
            "/sleep/",
            "/sleep/abc",
            "/sleep/-3",
            "/sleep/1.5",
            "/sleep/5/",
            "/sleep/5/extra",
            "/sleepy/5",
            "sleep/5",
            "/",
        ] {
            assert_eq!(parse_sleep_seconds(path), 0, "{path}");
        }
    }

    #[test]
    fn paths_are_percent_decoded() {
        assert_eq!(decoded_path("/sleep/%31"), "/sleep/1");
        assert_eq!(decoded_path("/sleep%2F2"), "/sleep/2");
        assert_eq!(decoded_path("/plain"), "/plain");
        assert_eq!(parse_sleep_seconds(&decoded_path("/%73leep/4")), 4);
    }

    #[test]
    fn classify_by_method_and_path() {
        assert_eq!(classify(&Method::GET, "/sleep/3"), Outcome::Sleep(3));
        assert_eq!(classify(&Method::GET, "/sleep/abc"), Outcome::Hello);
        assert_eq!(classify(&Method::GET, "/anything"), Outcome::Hello);
        assert_eq!(classify(&Method::POST, "/"), Outcome::MethodNotAllowed);
        assert_eq!(classify(&Method::POST, "/sleep/3"), Outcome::MethodNotAllowed);
        assert_eq!(classify(&Method::HEAD, "/"), Outcome::MethodNotAllowed);
    }

    #[test]
    fn header_set_with_keep_alive() {
        let headers = Responder::new(60).headers(12);
        assert_eq!(headers[header::SERVER], "gophr");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers["keep-alive"], "timeout=60");
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::CONTENT_LENGTH], "12");
    }

    #[test]
    fn zero_keep_alive_omits_header() {
        let headers = Responder::new(0).headers(0);
        assert!(headers.get("keep-alive").is_none());
        assert_eq!(headers[header::CONNECTION], "keep-alive");
    }

    #[test]
    fn bodies() {
        assert_eq!(hello_body("now"), "[now] Hello World\n");
        assert_eq!(
            slept_body("a", "b", 2),
            "[b] slept for 2 seconds starting @a"
        );
    }

    #[tokio::test]
    async fn router_answers_get_with_hello() {
        let router = Responder::new(60).router();
        let request = Request::builder().uri("/sleep/abc").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let length: usize = response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), length);
        assert!(String::from_utf8_lossy(&body).contains("Hello World"));
    }

    #[tokio::test]
    async fn router_rejects_post() {
        let router = Responder::new(60).router();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn router_sleeps_on_encoded_path() {
        let router = Responder::new(60).router();
        let request = Request::builder().uri("/sleep/%31").body(Body::empty()).unwrap();
        let started = tokio::time::Instant::now();
        let response = router.oneshot(request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("slept for 1 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn router_sleeps_before_answering() {
        let router = Responder::new(60).router();
        let request = Request::builder().uri("/sleep/30").body(Body::empty()).unwrap();
        let started = tokio::time::Instant::now();
        let response = router.oneshot(request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("slept for 30 seconds"));
    }
}
