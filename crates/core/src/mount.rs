use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, RtspError};
use crate::media::FramePacketizer;
use crate::source::{FrameSource, SourceFactory};

pub const DEFAULT_MOUNT_PATH: &str = "/stream";

/// Media parameters advertised in DESCRIBE and used for packetization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountParams {
    /// RTP payload type (26 = JPEG, RFC 3551).
    pub payload_type: u8,
    /// Encoding name for `a=rtpmap`.
    pub encoding: String,
    pub clock_rate: u32,
    pub frame_rate: u32,
}

impl Default for MountParams {
    fn default() -> Self {
        Self {
            payload_type: 26,
            encoding: "JPEG".to_string(),
            clock_rate: 90000,
            frame_rate: 20,
        }
    }
}

impl MountParams {
    /// RTP timestamp ticks per frame.
    pub fn timestamp_increment(&self) -> u32 {
        self.clock_rate / self.frame_rate.max(1)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

/// A named stream endpoint (e.g. `/stream`, `/camera1`).
///
/// Owns the factory that opens frame sources for it. Every bound session
/// opens its own source.
pub struct Mount {
    path: String,
    factory: Arc<dyn SourceFactory>,
    params: MountParams,
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Mount {
    pub fn new(path: &str, factory: Arc<dyn SourceFactory>, params: MountParams) -> Self {
        Self {
            path: path.to_string(),
            factory,
            params,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &MountParams {
        &self.params
    }

    /// Open a fresh frame source. Any factory failure is reported as
    /// [`RtspError::SourceUnavailable`].
    pub fn open(&self) -> Result<Box<dyn FrameSource>> {
        self.factory.open(&self.path).map_err(|e| match e {
            RtspError::SourceUnavailable(_) => e,
            other => RtspError::SourceUnavailable(format!("{}: {}", self.path, other)),
        })
    }

    /// Packetizer for one session, with a random SSRC.
    pub fn packetizer(&self, max_payload: usize) -> FramePacketizer {
        FramePacketizer::new(self.params.payload_type, self.params.clock_rate)
            .with_max_payload(max_payload)
    }
}

/// Registry of named mount points, keyed by path.
///
/// Supports a "default" mount that acts as a fallback when the requested
/// URI path doesn't match any registered mount.
#[derive(Clone)]
pub struct MountRegistry {
    mounts: Arc<RwLock<HashMap<String, Arc<Mount>>>>,
    default_path: Arc<RwLock<Option<String>>>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self {
            mounts: Arc::new(RwLock::new(HashMap::new())),
            default_path: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a mount point. Replaces any existing mount at the same path.
    pub fn add(
        &self,
        path: &str,
        factory: Arc<dyn SourceFactory>,
        params: MountParams,
    ) -> Arc<Mount> {
        let mount = Arc::new(Mount::new(path, factory, params));
        self.mounts.write().insert(path.to_string(), mount.clone());
        tracing::info!(path, "mount registered");
        mount
    }

    /// Designate a mount path as the default fallback.
    pub fn set_default(&self, path: &str) {
        *self.default_path.write() = Some(path.to_string());
    }

    pub fn get(&self, path: &str) -> Option<Arc<Mount>> {
        self.mounts.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.mounts.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Resolve a mount from an RTSP URI.
    ///
    /// Tries an exact path match first, then the default mount.
    pub fn resolve_from_uri(&self, uri: &str) -> Option<Arc<Mount>> {
        let path = extract_mount_path(uri);
        self.get(path).or_else(|| {
            let default = self.default_path.read();
            default.as_ref().and_then(|p| self.get(p))
        })
    }
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the mount path from an RTSP URI.
///
/// `rtsp://host:8554/stream/track1` → `/stream`
/// `rtsp://host:8554/stream`        → `/stream`
/// `rtsp://host:8554/`              → `/`
/// `rtsp://host:8554`               → `/stream` (default)
/// `*`                               → `/stream` (default)
pub fn extract_mount_path(uri: &str) -> &str {
    let path = if let Some(after) = uri
        .strip_prefix("rtsp://")
        .or_else(|| uri.strip_prefix("rtsps://"))
    {
        match after.find('/') {
            Some(slash) => &after[slash..],
            None => DEFAULT_MOUNT_PATH,
        }
    } else if uri.starts_with('/') {
        uri
    } else {
        DEFAULT_MOUNT_PATH
    };

    // /stream/track1 -> /stream, but /stream/trackers stays
    let path = match path.rfind("/track") {
        Some(pos) if path[pos + "/track".len()..].bytes().all(|b| b.is_ascii_digit()) => {
            &path[..pos]
        }
        _ => path,
    };
    if path.is_empty() { "/" } else { path }
}
