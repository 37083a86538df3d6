use std::fmt;

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::headers::Headers;

/// RTSP protocol version carried on every start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    V1_0,
    V2_0,
}

impl Version {
    /// Parse an `RTSP/<major>.<minor>` token.
    ///
    /// Tokens that do not start with `RTSP/` are malformed; any other
    /// version than 1.0 or 2.0 is unsupported.
    pub fn parse(token: &str) -> Result<Self> {
        let number = token
            .strip_prefix("RTSP/")
            .ok_or(RtspError::parse(ParseErrorKind::MalformedStartLine))?;
        match number {
            "1.0" => Ok(Version::V1_0),
            "2.0" => Ok(Version::V2_0),
            _ => Err(RtspError::parse(ParseErrorKind::UnsupportedVersion(
                token.to_string(),
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_0 => "RTSP/1.0",
            Version::V2_0 => "RTSP/2.0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RTSP methods (RFC 2326 §10).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    Pause,
    Teardown,
    GetParameter,
    /// Extension or unsupported method, kept verbatim.
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Options => "OPTIONS",
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
            Method::GetParameter => "GET_PARAMETER",
            Method::Other(other) => other,
        }
    }
}

impl From<&str> for Method {
    fn from(token: &str) -> Self {
        match token {
            "OPTIONS" => Method::Options,
            "DESCRIBE" => Method::Describe,
            "SETUP" => Method::Setup,
            "PLAY" => Method::Play,
            "PAUSE" => Method::Pause,
            "TEARDOWN" => Method::Teardown,
            "GET_PARAMETER" => Method::GetParameter,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed or outgoing RTSP request (RFC 2326 §6).
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    pub method: Method,
    /// Request-URI (e.g. `rtsp://host:port/stream/track1`).
    pub uri: String,
    pub version: Version,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        RtspRequest {
            method,
            uri: uri.to_string(),
            version: Version::V1_0,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Parse a complete request held in memory. Without a
    /// `Content-Length`, everything after the header block is the body.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        match crate::protocol::framer::parse_message(raw)? {
            crate::protocol::RtspMessage::Request(req) => Ok(req),
            crate::protocol::RtspMessage::Response(_) => {
                Err(RtspError::parse(ParseErrorKind::MalformedStartLine))
            }
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a header value by name (case-insensitive, RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The CSeq header value (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// Session id from the `Session` header, without `;timeout=` suffix.
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim())
    }

    /// Serialize to the RTSP wire format. `Content-Length` is set
    /// automatically when a body is present.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        let mut headers = self.headers.clone();
        if let Some(body) = &self.body {
            headers.set("Content-Length", body.len().to_string());
        }
        headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options_request() {
        let raw = b"OPTIONS rtsp://localhost:8554/test RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Options);
        assert_eq!(req.uri, "rtsp://localhost:8554/test");
        assert_eq!(req.version, Version::V1_0);
        assert_eq!(req.cseq(), Some("1"));
    }

    #[test]
    fn parse_setup_with_transport() {
        let raw = b"SETUP rtsp://localhost:8554/test/track1 RTSP/1.0\r\n\
                   CSeq: 3\r\n\
                   Transport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Setup);
        assert_eq!(
            req.get_header("transport"),
            Some("RTP/AVP/TCP;unicast;interleaved=0-1")
        );
    }

    #[test]
    fn request_without_length_keeps_remainder_as_body() {
        let raw = b"GET_PARAMETER rtsp://cam/ RTSP/1.0\r\nCSeq: 9\r\n\r\nposition\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"position\r\n"[..]));
    }

    #[test]
    fn two_token_request_line_defaults_version() {
        let req = RtspRequest::parse(b"GET_PARAMETER SESSION\r\nCSeq: 4\r\n\r\n").unwrap();
        assert_eq!(req.method, Method::GetParameter);
        assert_eq!(req.version, Version::V1_0);
    }

    #[test]
    fn session_id_strips_timeout() {
        let req = RtspRequest::new(Method::Play, "rtsp://cam/")
            .with_header("Session", "123456;timeout=60");
        assert_eq!(req.session_id(), Some("123456"));
    }

    #[test]
    fn serialize_sets_content_length() {
        let req = RtspRequest::new(Method::GetParameter, "rtsp://cam/stream")
            .with_header("CSeq", "7")
            .with_body("position\r\n");
        let wire = String::from_utf8(req.serialize()).unwrap();
        assert!(wire.starts_with("GET_PARAMETER rtsp://cam/stream RTSP/1.0\r\n"));
        assert!(wire.contains("CSeq: 7\r\n"));
        assert!(wire.contains("Content-Length: 10\r\n\r\nposition\r\n"));
    }

    #[test]
    fn version_tokens() {
        assert_eq!(Version::parse("RTSP/2.0").unwrap(), Version::V2_0);
        assert!(matches!(
            Version::parse("RTSP/1.1"),
            Err(RtspError::Parse {
                kind: ParseErrorKind::UnsupportedVersion(_)
            })
        ));
        assert!(matches!(
            Version::parse("HTTP/1.1"),
            Err(RtspError::Parse {
                kind: ParseErrorKind::MalformedStartLine
            })
        ));
    }
}
