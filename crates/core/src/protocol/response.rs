use crate::protocol::headers::Headers;
use crate::protocol::request::Version;

/// An RTSP response (RFC 2326 §7).
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub version: Version,
    pub status_code: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// Server identification string included in every RTSP response
/// per RFC 2326 §12.36.
pub const SERVER_AGENT: &str = "rtsp-stack/0.1";

impl RtspResponse {
    pub fn new(status_code: u16, reason: &str) -> Self {
        let mut headers = Headers::new();
        headers.set("Server", SERVER_AGENT);
        RtspResponse {
            version: Version::V1_0,
            status_code,
            reason: reason.to_string(),
            headers,
            body: None,
        }
    }

    /// Build a response carrying the standard reason phrase for `code`.
    pub fn with_status(code: u16) -> Self {
        Self::new(code, reason_phrase(code))
    }

    /// 200 OK, success (RFC 2326 §7.1.1).
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// 400 Bad Request, malformed or missing required header.
    pub fn bad_request() -> Self {
        Self::with_status(400)
    }

    /// 404 Not Found, the requested resource does not exist.
    pub fn not_found() -> Self {
        Self::with_status(404)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Serialize to the RTSP wire format.
    ///
    /// If a body is present, `Content-Length` is set automatically
    /// (RFC 2326 §12.14).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out =
            format!("{} {} {}\r\n", self.version, self.status_code, self.reason).into_bytes();
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

/// Standard reason phrase for the status codes this stack emits.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        454 => "Session Not Found",
        455 => "Method Not Valid in This State",
        461 => "Unsupported Transport",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
