//! Mapping between CGI variables and `http` types.

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};

use crate::fcgi::FcgiError;

/// CGI variables of one request.
pub type Params = HashMap<String, String>;

/// Collect decoded name-value pairs, replacing invalid UTF-8.
pub fn params_from_pairs(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Params {
    pairs
        .into_iter()
        .map(|(name, value)| {
            (
                String::from_utf8_lossy(&name).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            )
        })
        .collect()
}

fn non_empty<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

/// Rebuild the request a web server forwarded to us.
///
/// The URI comes from `REQUEST_URI` when present, otherwise from
/// `SCRIPT_NAME`, `PATH_INFO` and `QUERY_STRING`.
pub fn request_from_params(params: &Params, body: Vec<u8>) -> Result<Request<Body>, FcgiError> {
    let method = non_empty(params, "REQUEST_METHOD").unwrap_or("GET");

    let uri = match non_empty(params, "REQUEST_URI") {
        Some(uri) => uri.to_string(),
        None => {
            let mut uri = format!(
                "{}{}",
                params.get("SCRIPT_NAME").map(String::as_str).unwrap_or(""),
                params.get("PATH_INFO").map(String::as_str).unwrap_or("")
            );
            if uri.is_empty() {
                uri.push('/');
            }
            if let Some(query) = non_empty(params, "QUERY_STRING") {
                uri.push('?');
                uri.push_str(query);
            }
            uri
        }
    };

    let mut builder = Request::builder().method(method).uri(uri);

    for (name, value) in params {
        if let Some(suffix) = name.strip_prefix("HTTP_") {
            let header_name = suffix.to_ascii_lowercase().replace('_', "-");
            builder = builder.header(header_name, value.as_str());
        }
    }
    if let Some(content_type) = non_empty(params, "CONTENT_TYPE") {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(length) = non_empty(params, "CONTENT_LENGTH") {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    Ok(builder.body(Body::from(body))?)
}

/// Serialise a response as CGI output: a `Status:` line, headers, a blank
/// line, then the body.
pub async fn response_to_cgi(response: Response) -> Vec<u8> {
    let (parts, body) = response.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to collect response body");
            return error_output(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut out = status_line(parts.status).into_bytes();
    for (name, value) in &parts.headers {
        write_header(&mut out, name.as_str(), value);
    }
    if !parts.headers.contains_key(header::CONTENT_LENGTH) {
        write_header(&mut out, "content-length", &HeaderValue::from(body.len()));
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&body);
    out
}

/// CGI output for a request we could not hand to the router.
pub fn error_output(status: StatusCode) -> Vec<u8> {
    let mut out = status_line(status).into_bytes();
    out.extend_from_slice(b"content-length: 0\r\n\r\n");
    out
}

fn status_line(status: StatusCode) -> String {
    format!(
        "Status: {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &HeaderValue) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}
