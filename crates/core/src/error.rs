//! Error types for the RTSP protocol stack.

use std::fmt;
use std::io;

/// Errors that can occur anywhere in the stack.
///
/// Variants map to specific failure modes:
///
/// - **Framing**: [`Parse`](Self::Parse), malformed RTSP messages.
/// - **RTP**: [`TruncatedHeader`](Self::TruncatedHeader),
///   [`InvalidRtpField`](Self::InvalidRtpField).
/// - **Auth**: [`UnsupportedQop`](Self::UnsupportedQop),
///   [`MissingAuthParameter`](Self::MissingAuthParameter),
///   [`StaleNonce`](Self::StaleNonce), [`Unauthorized`](Self::Unauthorized).
/// - **Session**: [`InvalidStateTransition`](Self::InvalidStateTransition),
///   [`TransportNegotiationFailed`](Self::TransportNegotiationFailed).
/// - **Transport**: [`ConnectionLost`](Self::ConnectionLost),
///   [`Timeout`](Self::Timeout), [`Io`](Self::Io).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Failed to frame an RTSP message (RFC 2326 §6, §7).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// Fewer than 12 bytes were supplied to the RTP decoder.
    #[error("RTP header truncated: got {len} bytes, need 12")]
    TruncatedHeader { len: usize },

    /// An RTP header field is out of range for its bit width.
    #[error("invalid RTP header field: {0}")]
    InvalidRtpField(&'static str),

    /// A single frame cannot be carried in one interleaved data block.
    #[error("frame of {0} bytes exceeds interleaved block size")]
    FrameTooLarge(usize),

    /// The digest `qop` value is neither empty, `auth` nor `auth-int`.
    #[error("unsupported qop: {0}")]
    UnsupportedQop(String),

    /// The digest `algorithm` value is not a known hash.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// `nc` or `cnonce` missing while a qop is in effect.
    #[error("missing digest parameter: {0}")]
    MissingAuthParameter(&'static str),

    /// The server flagged the nonce as stale.
    #[error("server reported a stale nonce")]
    StaleNonce,

    /// A `WWW-Authenticate` header could not be understood.
    #[error("invalid authentication challenge: {0}")]
    InvalidChallenge(String),

    /// The server still rejected the request after one authenticated retry,
    /// or no credentials were available to answer the challenge.
    #[error("authentication rejected by server")]
    Unauthorized,

    /// Method issued in a session state that does not allow it.
    #[error("{method} not valid in state {state}")]
    InvalidStateTransition { method: String, state: String },

    /// The `Transport` header was missing, malformed or not TCP interleaved.
    #[error("transport negotiation failed: {0}")]
    TransportNegotiationFailed(String),

    /// A `Session` header was malformed or named an unknown session.
    #[error("invalid Session header: {0}")]
    InvalidSessionHeader(String),

    /// A response answered a request that was never sent, or carried no
    /// usable `CSeq`.
    #[error("response CSeq {got:?} does not match request {expected}")]
    UnexpectedCSeq { expected: u32, got: Option<String> },

    /// The server answered with a non-success status.
    #[error("server replied {code} {reason}")]
    Status { code: u16, reason: String },

    /// The target URL is not a usable `rtsp://` URL.
    #[error("invalid RTSP url: {0}")]
    InvalidUrl(String),

    /// The peer closed the connection or the socket broke.
    #[error("connection lost")]
    ConnectionLost,

    /// A blocking network call timed out. Recoverable.
    #[error("network operation timed out")]
    Timeout,

    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// No mount registered at the requested path.
    #[error("mount not found: {0}")]
    MountNotFound(String),

    /// The frame source behind a mount could not be opened or read.
    #[error("stream source unavailable: {0}")]
    SourceUnavailable(String),

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

impl RtspError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        RtspError::Parse { kind }
    }

    pub(crate) fn invalid_state(method: impl fmt::Display, state: impl fmt::Debug) -> Self {
        RtspError::InvalidStateTransition {
            method: method.to_string(),
            state: format!("{state:?}"),
        }
    }

    /// RTSP status code a server should reply with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Parse { .. } | Self::TransportNegotiationFailed(_) => 400,
            Self::Unauthorized | Self::StaleNonce => 401,
            Self::MountNotFound(_) => 404,
            Self::InvalidSessionHeader(_) => 454,
            Self::InvalidStateTransition { .. } => 455,
            Self::SourceUnavailable(_) => 503,
            Self::Status { code, .. } => *code,
            _ => 500,
        }
    }
}

impl From<io::Error> for RtspError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => RtspError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => RtspError::ConnectionLost,
            _ => RtspError::Io(err),
        }
    }
}

/// Specific kind of RTSP framing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Start line is neither a valid request line nor a valid status line.
    MalformedStartLine,
    /// Version other than `RTSP/1.0` or `RTSP/2.0`.
    UnsupportedVersion(String),
    /// A line exceeded [`MAX_LINE`](crate::protocol::framer::MAX_LINE) bytes.
    LineTooLong,
    /// More than [`MAX_HEADERS`](crate::protocol::framer::MAX_HEADERS) header lines.
    TooManyHeaders,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedStartLine => write!(f, "malformed start line"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported version {v}"),
            Self::LineTooLong => write!(f, "line too long"),
            Self::TooManyHeaders => write!(f, "too many headers"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
