//! FastCGI responder over TCP or Unix listeners.
//!
//! # Responsibilities
//! - Run the accept loop for a FastCGI listener
//! - Demultiplex records into per-request state
//! - Dispatch completed requests to the router, one task each
//! - Answer management records (GET_VALUES, unknown types)
//!
//! A single writer task owns the write half of each connection; request
//! tasks hand it fully encoded responses over a channel. The connection is
//! shut down once the reader has stopped and every request task has
//! delivered its response.

use std::collections::HashMap;

use axum::{http::StatusCode, Router};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;

use crate::fcgi::cgi::{self, Params};
use crate::fcgi::protocol::{self, BeginRequest, ProtocolStatus, Record, RecordType};
use crate::fcgi::FcgiError;
use crate::net::{self, Connection, ConnectionTracker, Listener, Transport};

/// Advertised in GET_VALUES_RESULT.
const MAX_CONNS: &str = "1024";
const MAX_REQS: &str = "1024";

/// FastCGI server for the responder.
pub struct FcgiServer {
    router: Router,
    transport: Transport,
}

impl FcgiServer {
    pub fn new(router: Router, transport: Transport) -> Self {
        Self { router, transport }
    }

    /// Accept connections until shutdown is broadcast.
    pub async fn run(
        self,
        listener: Listener,
        shutdown: broadcast::Receiver<()>,
        tracker: ConnectionTracker,
    ) {
        let Self { router, transport } = self;
        net::serve(listener, shutdown, tracker, move |conn| {
            handle_connection(conn, router.clone(), transport)
        })
        .await;
        tracing::info!(transport = %transport, "FastCGI server stopped");
    }
}

async fn handle_connection(conn: Connection, router: Router, transport: Transport) {
    let Connection {
        stream,
        peer,
        guard,
    } = conn;

    if let Err(e) = serve_records(stream, router, transport).await {
        tracing::debug!(
            transport = %transport,
            peer_addr = %peer,
            connection_id = %guard.id(),
            error = %e,
            "FastCGI connection error"
        );
    }
}

#[derive(Debug)]
struct PendingRequest {
    keep_conn: bool,
    params: Vec<u8>,
    stdin: Vec<u8>,
}

/// Serve one connection until the peer hangs up or a request without
/// FCGI_KEEP_CONN has been answered.
pub async fn serve_records<S>(
    stream: S,
    router: Router,
    transport: Transport,
) -> Result<(), FcgiError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx));

    let mut pending: HashMap<u16, PendingRequest> = HashMap::new();

    while let Some(record) = protocol::read_record(&mut reader).await? {
        let id = record.request_id;
        match record.record_type() {
            Some(RecordType::GetValues) => {
                let mut bytes = Vec::new();
                get_values_result(&record, &mut bytes)?;
                send(&tx, bytes);
            }
            Some(RecordType::BeginRequest) => {
                let begin = BeginRequest::parse(&record.content)?;
                if begin.role != protocol::ROLE_RESPONDER {
                    tracing::debug!(request_id = id, role = begin.role, "Rejecting FastCGI role");
                    let mut bytes = Vec::new();
                    protocol::encode_end_request(&mut bytes, id, 0, ProtocolStatus::UnknownRole);
                    send(&tx, bytes);
                    if !begin.keep_conn() {
                        break;
                    }
                    continue;
                }
                pending.insert(
                    id,
                    PendingRequest {
                        keep_conn: begin.keep_conn(),
                        params: Vec::new(),
                        stdin: Vec::new(),
                    },
                );
            }
            Some(RecordType::AbortRequest) => {
                if let Some(request) = pending.remove(&id) {
                    tracing::debug!(request_id = id, "FastCGI request aborted");
                    let mut bytes = Vec::new();
                    protocol::encode_end_request(&mut bytes, id, 0, ProtocolStatus::RequestComplete);
                    send(&tx, bytes);
                    if !request.keep_conn {
                        break;
                    }
                }
            }
            Some(RecordType::Params) => {
                if let Some(request) = pending.get_mut(&id) {
                    request.params.extend_from_slice(&record.content);
                }
            }
            Some(RecordType::Stdin) => {
                let done = record.content.is_empty();
                if let Some(request) = pending.get_mut(&id) {
                    request.stdin.extend_from_slice(&record.content);
                }
                if done {
                    if let Some(request) = pending.remove(&id) {
                        let keep_conn = request.keep_conn;
                        tokio::spawn(dispatch(id, request, router.clone(), transport, tx.clone()));
                        if !keep_conn {
                            break;
                        }
                    }
                }
            }
            Some(RecordType::Data) => {}
            _ if id == protocol::MANAGEMENT_ID => {
                let mut bytes = Vec::new();
                protocol::encode_unknown_type(&mut bytes, record.kind);
                send(&tx, bytes);
            }
            _ => {
                tracing::debug!(request_id = id, kind = record.kind, "Ignoring FastCGI record");
            }
        }
    }

    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(FcgiError::Io(std::io::Error::other(e))),
    }
}

fn send(tx: &mpsc::UnboundedSender<Vec<u8>>, bytes: Vec<u8>) {
    // A closed channel means the writer already failed; the reader sees
    // the same error on its next read.
    let _ = tx.send(bytes);
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Result<(), FcgiError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn dispatch(
    id: u16,
    request: PendingRequest,
    router: Router,
    transport: Transport,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut bytes = Vec::new();

    let built = protocol::parse_pairs(&request.params)
        .map(cgi::params_from_pairs)
        .and_then(|params: Params| cgi::request_from_params(&params, request.stdin));

    match built {
        Ok(mut http_request) => {
            http_request.extensions_mut().insert(transport);
            let response = router
                .oneshot(http_request)
                .await
                .unwrap_or_else(|never| match never {});
            let output = cgi::response_to_cgi(response).await;
            protocol::encode_stream(&mut bytes, RecordType::Stdout, id, &output);
        }
        Err(e) => {
            tracing::warn!(transport = %transport, request_id = id, error = %e, "Bad FastCGI request");
            let output = cgi::error_output(StatusCode::INTERNAL_SERVER_ERROR);
            protocol::encode_stream(&mut bytes, RecordType::Stdout, id, &output);
            protocol::encode_stream(&mut bytes, RecordType::Stderr, id, e.to_string().as_bytes());
        }
    }

    protocol::encode_end_request(&mut bytes, id, 0, ProtocolStatus::RequestComplete);
    tracing::trace!(request_id = id, keep_conn = request.keep_conn, "FastCGI request complete");
    send(&tx, bytes);
}

fn get_values_result(record: &Record, out: &mut Vec<u8>) -> Result<(), FcgiError> {
    let mut content = Vec::new();
    for (name, _) in protocol::parse_pairs(&record.content)? {
        let value = match name.as_slice() {
            n if n == protocol::MPXS_CONNS.as_bytes() => "1",
            n if n == protocol::MAX_CONNS.as_bytes() => MAX_CONNS,
            n if n == protocol::MAX_REQS.as_bytes() => MAX_REQS,
            _ => continue,
        };
        protocol::encode_pair(&mut content, &name, value.as_bytes());
    }
    protocol::encode_record(out, RecordType::GetValuesResult, protocol::MANAGEMENT_ID, &content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Responder;
    use tokio::io::duplex;

    fn begin(buf: &mut Vec<u8>, id: u16, role: u16, flags: u8) {
        BeginRequest { role, flags }.encode(id, buf);
    }

    fn params(buf: &mut Vec<u8>, id: u16, pairs: &[(&str, &str)]) {
        let mut content = Vec::new();
        for (name, value) in pairs {
            protocol::encode_pair(&mut content, name.as_bytes(), value.as_bytes());
        }
        protocol::encode_stream(buf, RecordType::Params, id, &content);
    }

    async fn exchange(input: Vec<u8>) -> Vec<Record> {
        let (client, server) = duplex(1 << 20);
        let router = Responder::new(60).router();
        let task = tokio::spawn(serve_records(server, router, Transport::FcgiTcp));

        let (mut read, mut write) = tokio::io::split(client);
        write.write_all(&input).await.unwrap();

        let mut records = Vec::new();
        while let Some(record) = protocol::read_record(&mut read).await.unwrap() {
            records.push(record);
        }
        task.await.unwrap().unwrap();
        records
    }

    fn stdout_of(records: &[Record], id: u16) -> String {
        let bytes: Vec<u8> = records
            .iter()
            .filter(|r| r.request_id == id && r.record_type() == Some(RecordType::Stdout))
            .flat_map(|r| r.content.clone())
            .collect();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn get_request_is_answered_and_connection_closed() {
        let mut input = Vec::new();
        begin(&mut input, 1, protocol::ROLE_RESPONDER, 0);
        params(&mut input, 1, &[("REQUEST_METHOD", "GET"), ("REQUEST_URI", "/")]);
        protocol::encode_stream(&mut input, RecordType::Stdin, 1, &[]);

        let records = exchange(input).await;
        let out = stdout_of(&records, 1);
        assert!(out.starts_with("Status: 200 OK\r\n"));
        assert!(out.contains("server: gophr\r\n"));
        assert!(out.contains("Hello World"));

        let end = records.last().unwrap();
        assert_eq!(end.record_type(), Some(RecordType::EndRequest));
        assert_eq!(end.content[4], ProtocolStatus::RequestComplete as u8);
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let mut input = Vec::new();
        begin(&mut input, 5, protocol::ROLE_AUTHORIZER, 0);

        let records = exchange(input).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type(), Some(RecordType::EndRequest));
        assert_eq!(records[0].request_id, 5);
        assert_eq!(records[0].content[4], ProtocolStatus::UnknownRole as u8);
    }

    #[tokio::test]
    async fn management_records() {
        let mut input = Vec::new();
        let mut names = Vec::new();
        protocol::encode_pair(&mut names, protocol::MPXS_CONNS.as_bytes(), b"");
        protocol::encode_pair(&mut names, b"FCGI_UNHEARD_OF", b"");
        protocol::encode_record(&mut input, RecordType::GetValues, 0, &names);
        protocol::encode_record(&mut input, RecordType::Stdout, 0, &[]);
        // Non-keep-conn request so the server hangs up afterwards.
        begin(&mut input, 1, protocol::ROLE_RESPONDER, 0);
        params(&mut input, 1, &[("REQUEST_METHOD", "POST")]);
        protocol::encode_stream(&mut input, RecordType::Stdin, 1, &[]);

        let records = exchange(input).await;

        assert_eq!(records[0].record_type(), Some(RecordType::GetValuesResult));
        let values = protocol::parse_pairs(&records[0].content).unwrap();
        assert_eq!(values, vec![(b"FCGI_MPXS_CONNS".to_vec(), b"1".to_vec())]);

        assert_eq!(records[1].record_type(), Some(RecordType::UnknownType));
        assert_eq!(records[1].content[0], RecordType::Stdout as u8);

        assert!(stdout_of(&records, 1).starts_with("Status: 405 Method Not Allowed\r\n"));
    }

    #[tokio::test]
    async fn keep_conn_serves_several_requests() {
        let mut input = Vec::new();
        for id in [1u16, 2] {
            begin(&mut input, id, protocol::ROLE_RESPONDER, protocol::FLAG_KEEP_CONN);
            params(&mut input, id, &[("REQUEST_URI", "/sleep/abc")]);
            protocol::encode_stream(&mut input, RecordType::Stdin, id, &[]);
        }
        // Last request lets the server close.
        begin(&mut input, 3, protocol::ROLE_RESPONDER, 0);
        params(&mut input, 3, &[("REQUEST_URI", "/")]);
        protocol::encode_stream(&mut input, RecordType::Stdin, 3, &[]);

        let records = exchange(input).await;
        for id in [1u16, 2, 3] {
            assert!(stdout_of(&records, id).contains("Hello World"), "request {id}");
            assert!(records
                .iter()
                .any(|r| r.request_id == id && r.record_type() == Some(RecordType::EndRequest)));
        }
    }

    #[tokio::test]
    async fn aborted_request_gets_end_request() {
        let mut input = Vec::new();
        begin(&mut input, 4, protocol::ROLE_RESPONDER, 0);
        params(&mut input, 4, &[("REQUEST_URI", "/sleep/100")]);
        protocol::encode_record(&mut input, RecordType::AbortRequest, 4, &[]);

        let records = exchange(input).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type(), Some(RecordType::EndRequest));
        assert_eq!(records[0].request_id, 4);
    }
}
