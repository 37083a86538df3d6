pub mod auth;
pub mod client;
pub mod error;
pub mod media;
pub mod mount;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
pub mod transport;

pub use auth::Credentials;
pub use client::{ClientConfig, ClientSession, ClientState};
pub use error::{Result, RtspError};
pub use media::{FramePacketizer, Packetizer};
pub use mount::MountParams;
pub use server::{Server, ServerConfig, Viewer};
pub use source::{FrameSource, SourceFactory, VecSource};
