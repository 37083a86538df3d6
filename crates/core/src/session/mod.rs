//! Server-side RTSP sessions (RFC 2326 §3, §12.37, §A.1).
//!
//! Each accepted connection gets one [`ServerSession`]. The session id is
//! assigned on SETUP and returned in the `Session` header with a timeout.
//!
//! ## Session lifecycle
//!
//! ```text
//! Init     --SETUP-->    Ready
//! Ready    --SETUP-->    Ready     (different resource: rebind, new id)
//! Ready    --PLAY-->     Playing   (delivery thread started)
//! Playing  --PAUSE-->    Ready     (delivery thread cancelled and joined)
//! Ready|Playing --TEARDOWN--> (terminated)
//! TCP disconnect         (terminated, same cleanup as TEARDOWN)
//! ```

pub mod delivery;
pub mod registry;
pub mod transport;
pub mod worker;

pub use registry::{SessionEntry, SessionRegistry};
pub use transport::InterleavedTransport;
pub use worker::ServerSession;

/// Default session timeout in seconds (RFC 2326 §12.37).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

/// Session state (RFC 2326 §A.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Init,
    Ready,
    Playing,
}
