//! RTSP protocol implementation (RFC 2326, RFC 7826).
//!
//! This module handles the text-based RTSP signaling protocol: framing
//! requests and responses off a byte stream, building replies, and
//! reading/writing SDP session descriptions.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! Key differences from HTTP:
//! - Stateful: sessions persist across requests (RFC 2326 §3).
//! - Different methods: OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN.
//! - Session header carries a server-assigned ID (RFC 2326 §12.37).
//! - Binary `$` blocks may share the connection with interleaved transport.
//!
//! ## Supported methods
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability discovery |
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//! | SETUP | §10.4 | Negotiate transport (TCP interleaved) |
//! | PLAY | §10.5 | Start media delivery |
//! | PAUSE | §10.6 | Suspend media delivery |
//! | TEARDOWN | §10.7 | Destroy session |
//! | GET_PARAMETER | §10.8 | Keepalive / parameter query |

pub mod framer;
pub mod headers;
pub mod request;
pub mod response;
pub mod sdp;

pub use framer::{Frame, RtspMessage, read_frame, read_message};
pub use headers::Headers;
pub use request::{Method, RtspRequest, Version};
pub use response::RtspResponse;
