//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use latent_responder::fcgi::protocol::{self, BeginRequest, RecordType};
use latent_responder::{lifecycle, ResponderConfig, Running};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

static SOCKET_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A socket path unique to this process and call.
pub fn temp_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "latent-responder-{}-{}.sock",
        std::process::id(),
        SOCKET_COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}

/// Configuration bound to ephemeral loopback ports and a private socket.
pub fn test_config() -> ResponderConfig {
    ResponderConfig {
        http_addr: "127.0.0.1:0".into(),
        fcgi_addr: "127.0.0.1:0".into(),
        fcgi_sock: temp_socket_path(),
        ..Default::default()
    }
}

/// A started responder whose private socket file is removed on drop.
pub struct TestResponder(Running);

impl std::ops::Deref for TestResponder {
    type Target = Running;

    fn deref(&self) -> &Running {
        &self.0
    }
}

impl Drop for TestResponder {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.0.fcgi_sock());
    }
}

pub async fn start(config: ResponderConfig) -> TestResponder {
    TestResponder(lifecycle::start(config).await.expect("responder should start"))
}

/// HTTP client without connection pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A parsed CGI response from the FastCGI transport.
#[derive(Debug)]
pub struct FcgiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FcgiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Send one FastCGI request and collect the STDOUT stream until END_REQUEST.
pub async fn fcgi_request<S>(mut stream: S, method: &str, uri: &str) -> FcgiResponse
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut out = Vec::new();
    BeginRequest {
        role: protocol::ROLE_RESPONDER,
        flags: 0,
    }
    .encode(1, &mut out);

    let mut params = Vec::new();
    protocol::encode_pair(&mut params, b"REQUEST_METHOD", method.as_bytes());
    protocol::encode_pair(&mut params, b"REQUEST_URI", uri.as_bytes());
    protocol::encode_pair(&mut params, b"SERVER_PROTOCOL", b"HTTP/1.1");
    protocol::encode_stream(&mut out, RecordType::Params, 1, &params);
    protocol::encode_stream(&mut out, RecordType::Stdin, 1, &[]);
    stream.write_all(&out).await.unwrap();

    let mut stdout = Vec::new();
    loop {
        let record = protocol::read_record(&mut stream)
            .await
            .unwrap()
            .expect("connection closed before END_REQUEST");
        match record.record_type() {
            Some(RecordType::Stdout) => stdout.extend_from_slice(&record.content),
            Some(RecordType::EndRequest) => break,
            _ => {}
        }
    }

    parse_cgi(&String::from_utf8(stdout).unwrap())
}

fn parse_cgi(output: &str) -> FcgiResponse {
    let (head, body) = output.split_once("\r\n\r\n").expect("CGI header terminator");
    let mut status = 200;
    let mut headers = Vec::new();
    for line in head.split("\r\n") {
        let (name, value) = line.split_once(": ").expect("header line");
        if name.eq_ignore_ascii_case("status") {
            status = value[..3].parse().unwrap();
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }
    FcgiResponse {
        status,
        headers,
        body: body.to_string(),
    }
}
