//! FastCGI record codec.
//!
//! Every record is an 8-byte header followed by `content_length` bytes of
//! content and `padding_length` bytes of padding:
//!
//! ```text
//! version:u8 type:u8 request_id:u16 content_length:u16 padding_length:u8 reserved:u8
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::fcgi::FcgiError;

pub const VERSION_1: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize;

/// Request id reserved for management records.
pub const MANAGEMENT_ID: u16 = 0;

/// `flags` bit asking the application to keep the connection open.
pub const FLAG_KEEP_CONN: u8 = 1;

pub const ROLE_RESPONDER: u16 = 1;
pub const ROLE_AUTHORIZER: u16 = 2;
pub const ROLE_FILTER: u16 = 3;

pub const MAX_CONNS: &str = "FCGI_MAX_CONNS";
pub const MAX_REQS: &str = "FCGI_MAX_REQS";
pub const MPXS_CONNS: &str = "FCGI_MPXS_CONNS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    UnknownType = 11,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::BeginRequest,
            2 => Self::AbortRequest,
            3 => Self::EndRequest,
            4 => Self::Params,
            5 => Self::Stdin,
            6 => Self::Stdout,
            7 => Self::Stderr,
            8 => Self::Data,
            9 => Self::GetValues,
            10 => Self::GetValuesResult,
            11 => Self::UnknownType,
            _ => return None,
        })
    }
}

/// `protocol_status` of an END_REQUEST record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolStatus {
    RequestComplete = 0,
    CantMpxConn = 1,
    Overloaded = 2,
    UnknownRole = 3,
}

/// A decoded record with padding stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Raw record type, kept as a byte so unknown types can be echoed back.
    pub kind: u8,
    pub request_id: u16,
    pub content: Vec<u8>,
}

impl Record {
    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::from_u8(self.kind)
    }
}

/// Body of a BEGIN_REQUEST record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequest {
    pub role: u16,
    pub flags: u8,
}

impl BeginRequest {
    pub fn parse(content: &[u8]) -> Result<Self, FcgiError> {
        if content.len() < 8 {
            return Err(FcgiError::Malformed("short BEGIN_REQUEST body"));
        }
        Ok(Self {
            role: u16::from_be_bytes([content[0], content[1]]),
            flags: content[2],
        })
    }

    pub fn keep_conn(&self) -> bool {
        self.flags & FLAG_KEEP_CONN != 0
    }

    pub fn encode(&self, request_id: u16, buf: &mut Vec<u8>) {
        let [hi, lo] = self.role.to_be_bytes();
        encode_record(
            buf,
            RecordType::BeginRequest,
            request_id,
            &[hi, lo, self.flags, 0, 0, 0, 0, 0],
        );
    }
}

/// Read one record. Returns `Ok(None)` when the peer closed the connection
/// between records.
pub async fn read_record<R>(reader: &mut R) -> Result<Option<Record>, FcgiError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    if header[0] != VERSION_1 {
        return Err(FcgiError::UnsupportedVersion(header[0]));
    }

    let content_length = u16::from_be_bytes([header[4], header[5]]) as usize;
    let padding_length = header[6] as usize;

    let mut content = vec![0u8; content_length + padding_length];
    reader.read_exact(&mut content).await?;
    content.truncate(content_length);

    Ok(Some(Record {
        kind: header[1],
        request_id: u16::from_be_bytes([header[2], header[3]]),
        content,
    }))
}

/// Append one record, padded to an 8-byte boundary.
///
/// `content` must fit in a single record.
pub fn encode_record(buf: &mut Vec<u8>, kind: RecordType, request_id: u16, content: &[u8]) {
    debug_assert!(content.len() <= MAX_CONTENT_LEN);
    let padding = (8 - content.len() % 8) % 8;
    let [id_hi, id_lo] = request_id.to_be_bytes();
    let [len_hi, len_lo] = (content.len() as u16).to_be_bytes();

    buf.extend_from_slice(&[
        VERSION_1,
        kind as u8,
        id_hi,
        id_lo,
        len_hi,
        len_lo,
        padding as u8,
        0,
    ]);
    buf.extend_from_slice(content);
    buf.resize(buf.len() + padding, 0);
}

/// Append a whole stream (STDOUT, STDERR, PARAMS, STDIN) split into
/// records, followed by the empty record that closes it.
pub fn encode_stream(buf: &mut Vec<u8>, kind: RecordType, request_id: u16, data: &[u8]) {
    for chunk in data.chunks(MAX_CONTENT_LEN) {
        encode_record(buf, kind, request_id, chunk);
    }
    encode_record(buf, kind, request_id, &[]);
}

pub fn encode_end_request(
    buf: &mut Vec<u8>,
    request_id: u16,
    app_status: u32,
    protocol_status: ProtocolStatus,
) {
    let [a, b, c, d] = app_status.to_be_bytes();
    encode_record(
        buf,
        RecordType::EndRequest,
        request_id,
        &[a, b, c, d, protocol_status as u8, 0, 0, 0],
    );
}

/// Answer a management record of a type we do not understand.
pub fn encode_unknown_type(buf: &mut Vec<u8>, kind: u8) {
    encode_record(
        buf,
        RecordType::UnknownType,
        MANAGEMENT_ID,
        &[kind, 0, 0, 0, 0, 0, 0, 0],
    );
}

fn encode_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
    } else {
        buf.extend_from_slice(&(len as u32 | 0x8000_0000).to_be_bytes());
    }
}

/// Append one name-value pair.
pub fn encode_pair(buf: &mut Vec<u8>, name: &[u8], value: &[u8]) {
    encode_length(buf, name.len());
    encode_length(buf, value.len());
    buf.extend_from_slice(name);
    buf.extend_from_slice(value);
}

fn decode_length(content: &[u8], pos: &mut usize) -> Result<usize, FcgiError> {
    let first = *content
        .get(*pos)
        .ok_or(FcgiError::Malformed("truncated pair length"))?;
    if first & 0x80 == 0 {
        *pos += 1;
        return Ok(first as usize);
    }
    let bytes = content
        .get(*pos..*pos + 4)
        .ok_or(FcgiError::Malformed("truncated pair length"))?;
    *pos += 4;
    Ok((u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & 0x7fff_ffff) as usize)
}

/// Decode a buffer of name-value pairs.
pub fn parse_pairs(content: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, FcgiError> {
    let mut pairs = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let name_len = decode_length(content, &mut pos)?;
        let value_len = decode_length(content, &mut pos)?;
        let end = pos
            .checked_add(name_len)
            .and_then(|n| n.checked_add(value_len))
            .filter(|end| *end <= content.len())
            .ok_or(FcgiError::Malformed("truncated pair"))?;
        let name = content[pos..pos + name_len].to_vec();
        let value = content[pos + name_len..end].to_vec();
        pairs.push((name, value));
        pos = end;
    }
    Ok(pairs)
}
