//! Network transport for RTSP signaling and RTP media delivery.
//!
//! Everything travels on the one TCP connection:
//!
//! - **Signaling** ([`tcp`]): RTSP requests and responses. One thread
//!   per accepted connection.
//!
//! - **Media** ([`interleaved`]): RTP packets framed as `$` blocks
//!   (RFC 2326 §10.12) between RTSP messages.

pub mod interleaved;
pub mod tcp;
