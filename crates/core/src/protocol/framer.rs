//! RTSP message framing over a byte stream.
//!
//! Reads one start line, the header block up to the empty line, and a
//! body sized by `Content-Length`. Provisional `100 Continue` responses
//! are swallowed, and `$`-interleaved data blocks sharing the connection
//! are surfaced as [`Frame::Interleaved`].

use std::io::{BufRead, Read};

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::headers::Headers;
use crate::protocol::request::{Method, RtspRequest, Version};
use crate::protocol::response::RtspResponse;
use crate::transport::interleaved;

/// Longest accepted start or header line, in bytes.
pub const MAX_LINE: usize = 65536;

/// Most header lines accepted in one message.
pub const MAX_HEADERS: usize = 100;

const CONTINUE: u16 = 100;

/// A framed RTSP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtspMessage {
    Request(RtspRequest),
    Response(RtspResponse),
}

impl RtspMessage {
    pub fn headers(&self) -> &Headers {
        match self {
            RtspMessage::Request(req) => &req.headers,
            RtspMessage::Response(resp) => &resp.headers,
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        match self {
            RtspMessage::Request(req) => req.body.as_deref(),
            RtspMessage::Response(resp) => resp.body.as_deref(),
        }
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers().get(name)
    }

    /// Parse a complete message held in memory.
    ///
    /// Unlike [`read_message`], a missing `Content-Length` makes the rest
    /// of the buffer the body.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        parse_message(raw)
    }
}

/// Either an RTSP message or an interleaved binary block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(RtspMessage),
    Interleaved { channel: u8, data: Vec<u8> },
}

enum StartLine {
    Request {
        method: Method,
        uri: String,
        version: Version,
    },
    Status {
        version: Version,
        code: u16,
        reason: String,
    },
}

/// Read the next message or interleaved block from `reader`.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Frame> {
    loop {
        let first = reader.fill_buf()?.first().copied();
        match first {
            None => return Err(RtspError::ConnectionLost),
            Some(interleaved::MAGIC) => {
                let (channel, data) = interleaved::read_block(reader)?;
                return Ok(Frame::Interleaved { channel, data });
            }
            Some(b'\r' | b'\n') => reader.consume(1),
            Some(_) => break,
        }
    }

    let (start, headers) = read_head(reader)?;
    let body = match headers.content_length() {
        Some(len) if len > 0 => Some(read_body(reader, len)?),
        _ => None,
    };
    Ok(Frame::Message(assemble(start, headers, body)))
}

/// Read the next RTSP message, skipping any interleaved blocks in between.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<RtspMessage> {
    loop {
        match read_frame(reader)? {
            Frame::Message(msg) => return Ok(msg),
            Frame::Interleaved { channel, data } => {
                tracing::trace!(channel, len = data.len(), "skipping interleaved data");
            }
        }
    }
}

/// Parse a complete message held in memory. Without a valid
/// `Content-Length`, the remainder of the buffer is the body.
pub fn parse_message(raw: &[u8]) -> Result<RtspMessage> {
    let mut cursor = raw;
    let (start, headers) = read_head(&mut cursor)?;
    let body = match headers.content_length() {
        Some(0) => None,
        Some(len) => Some(read_body(&mut cursor, len)?),
        None if cursor.is_empty() => None,
        None => Some(cursor.to_vec()),
    };
    Ok(assemble(start, headers, body))
}

fn assemble(start: StartLine, headers: Headers, body: Option<Vec<u8>>) -> RtspMessage {
    match start {
        StartLine::Request {
            method,
            uri,
            version,
        } => RtspMessage::Request(RtspRequest {
            method,
            uri,
            version,
            headers,
            body,
        }),
        StartLine::Status {
            version,
            code,
            reason,
        } => RtspMessage::Response(RtspResponse {
            version,
            status_code: code,
            reason,
            headers,
            body,
        }),
    }
}

fn read_head<R: BufRead>(reader: &mut R) -> Result<(StartLine, Headers)> {
    loop {
        let line = loop {
            let line = read_line(reader)?.ok_or(RtspError::ConnectionLost)?;
            if !line.trim().is_empty() {
                break line;
            }
        };

        let start = parse_start_line(&line)?;
        let headers = read_headers(reader)?;

        if let StartLine::Status { code: CONTINUE, .. } = start {
            tracing::debug!("skipping 100 Continue");
            continue;
        }
        return Ok((start, headers));
    }
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let malformed = || RtspError::parse(ParseErrorKind::MalformedStartLine);
    let line = line.trim();

    if line.starts_with("RTSP/") {
        let (version, rest) = split_token(line);
        let (code, reason) = split_token(rest);
        let version = Version::parse(version)?;

        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let code: u16 = code.parse().map_err(|_| malformed())?;
        if code < 100 {
            return Err(malformed());
        }
        return Ok(StartLine::Status {
            version,
            code,
            reason: reason.trim().to_string(),
        });
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let (method, uri, version) = match parts.as_slice() {
        [method, uri] => (*method, *uri, Version::V1_0),
        [method, uri, version] => (*method, *uri, Version::parse(version)?),
        _ => return Err(malformed()),
    };
    Ok(StartLine::Request {
        method: Method::from(method),
        uri: uri.to_string(),
        version,
    })
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn read_headers<R: BufRead>(reader: &mut R) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut count = 0;
    loop {
        let line = read_line(reader)?.ok_or(RtspError::ConnectionLost)?;
        if line.is_empty() {
            return Ok(headers);
        }
        count += 1;
        if count > MAX_HEADERS {
            return Err(RtspError::parse(ParseErrorKind::TooManyHeaders));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(RtspError::parse(ParseErrorKind::InvalidHeader))?;
        headers.append(name.trim(), value.trim());
    }
}

/// Read one CRLF (or bare LF) terminated line, without the terminator.
/// `None` at end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    // Room for the CRLF plus one byte to detect overflow.
    let n = reader
        .by_ref()
        .take(MAX_LINE as u64 + 3)
        .read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    let terminated = buf.last() == Some(&b'\n');
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    if buf.len() > MAX_LINE {
        if !terminated {
            discard_line(reader)?;
        }
        return Err(RtspError::parse(ParseErrorKind::LineTooLong));
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Consume bytes through the next `\n` without buffering them.
fn discard_line<R: BufRead>(reader: &mut R) -> Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// After a head that failed to parse, drop lines through the next empty
/// one so the following message starts on a clean boundary.
pub fn skip_head<R: BufRead>(reader: &mut R) -> Result<()> {
    loop {
        match read_line(reader) {
            Ok(Some(line)) if line.is_empty() => return Ok(()),
            Ok(Some(_)) => {}
            Ok(None) => return Err(RtspError::ConnectionLost),
            Err(RtspError::Parse {
                kind: ParseErrorKind::LineTooLong,
            }) => {}
            Err(e) => return Err(e),
        }
    }
}

fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut body)?;
    if body.len() != len {
        return Err(RtspError::ConnectionLost);
    }
    Ok(body)
}
