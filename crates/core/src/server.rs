use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{Result, RtspError};
use crate::media::DEFAULT_PAYLOAD;
use crate::mount::{Mount, MountParams, MountRegistry};
use crate::session::{DEFAULT_SESSION_TIMEOUT_SECS, SessionRegistry};
use crate::source::SourceFactory;
use crate::transport::tcp;

/// Server-level configuration used by the session workers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public host advertised in SDP `o=` and `c=` lines.
    /// When `None`, host is inferred from request URI/client address.
    pub public_host: Option<String>,
    /// SDP origin username field (`o=<username> ...`).
    pub sdp_username: String,
    /// SDP origin session id field (`o=... <session-id> ...`).
    pub sdp_session_id: String,
    /// SDP origin session version field (`o=... ... <session-version> ...`).
    pub sdp_session_version: String,
    /// SDP session name (`s=`).
    pub sdp_session_name: String,
    /// Advertised in `Session: <id>;timeout=<secs>`.
    pub session_timeout_secs: u64,
    /// How often a delivery loop checks for cancellation.
    pub poll_interval: Duration,
    /// Largest RTP payload per packet.
    pub max_payload: usize,
    /// Bound on a blocked socket write. A peer that stops reading loses
    /// its session instead of holding the connection writer forever.
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_host: None,
            sdp_username: "-".to_string(),
            sdp_session_id: "0".to_string(),
            sdp_session_version: "0".to_string(),
            sdp_session_name: "Stream".to_string(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            poll_interval: Duration::from_millis(20),
            max_payload: DEFAULT_PAYLOAD,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// RTSP server over TCP with interleaved RTP delivery.
///
/// Owns the mount and session registries and hands clones of them to each
/// connection thread. Connection handling lives in [`crate::transport::tcp`].
pub struct Server {
    mounts: MountRegistry,
    sessions: SessionRegistry,
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Self {
            mounts: MountRegistry::new(),
            sessions: SessionRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            config: Arc::new(config),
        }
    }

    /// Register a stream at `path`. The first mount becomes the default.
    pub fn mount(
        &self,
        path: &str,
        factory: Arc<dyn SourceFactory>,
        params: MountParams,
    ) -> Arc<Mount> {
        let first = self.mounts.paths().is_empty();
        let mount = self.mounts.add(path, factory, params);
        if first {
            self.mounts.set_default(path);
        }
        mount
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let mounts = self.mounts.clone();
        let sessions = self.sessions.clone();
        let config = self.config.clone();

        tracing::info!(addr = %local_addr, mounts = ?self.mounts.paths(), "RTSP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, mounts, sessions, config, running);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RtspError::NotStarted)
    }

    /// Sessions currently playing.
    pub fn viewers(&self) -> Vec<Viewer> {
        self.sessions
            .playing()
            .iter()
            .map(|entry| Viewer {
                session_id: entry.id.clone(),
                uri: entry.uri.clone(),
                peer: entry.peer,
            })
            .collect()
    }

    pub fn mounts(&self) -> &MountRegistry {
        &self.mounts
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// A client in the PLAYING state.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub session_id: String,
    pub uri: String,
    pub peer: SocketAddr,
}
