use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::delivery::{Delivery, DeliveryConfig};
use super::registry::{SessionEntry, SessionRegistry};
use super::transport::InterleavedTransport;
use super::SessionState;
use crate::error::{Result, RtspError};
use crate::media::Packetizer;
use crate::mount::{Mount, MountRegistry};
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::response::RtspResponse;
use crate::protocol::sdp::{self, SdpOrigin};
use crate::server::ServerConfig;
use crate::source::FrameSource;

const PUBLIC_METHODS: &str = "OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN, GET_PARAMETER";

/// What to do once the reply has been written.
enum After {
    Nothing,
    StartDelivery,
    Terminate,
}

/// Resource bound by SETUP.
struct Binding {
    id: String,
    uri: String,
    mount: Arc<Mount>,
    transport: InterleavedTransport,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    /// Held here while not delivering; the delivery thread owns it otherwise.
    packetizer: Option<Box<dyn Packetizer>>,
    entry: Arc<SessionEntry>,
}

/// Server side of one RTSP connection.
///
/// Requests are handled strictly in arrival order. Every reply is written
/// through the shared writer, which the delivery thread also uses for
/// interleaved RTP, so replies and packets never interleave mid-message.
pub struct ServerSession<W: Write + Send + 'static> {
    writer: Arc<Mutex<W>>,
    peer: SocketAddr,
    mounts: MountRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    state: SessionState,
    binding: Option<Binding>,
    delivery: Option<Delivery>,
    lost: Arc<AtomicBool>,
    terminated: bool,
}

impl<W: Write + Send + 'static> ServerSession<W> {
    pub fn new(
        writer: Arc<Mutex<W>>,
        peer: SocketAddr,
        mounts: MountRegistry,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            writer,
            peer,
            mounts,
            sessions,
            config,
            state: SessionState::Init,
            binding: None,
            delivery: None,
            lost: Arc::new(AtomicBool::new(false)),
            terminated: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.id.as_str())
    }

    /// TEARDOWN was processed; the connection should close.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The delivery loop failed to write to the connection.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Process one request and write the reply.
    ///
    /// Only a failure to write the reply is returned as an error; protocol
    /// errors become error replies.
    pub fn handle(&mut self, request: &RtspRequest) -> Result<()> {
        let cseq = request.cseq().unwrap_or("0").to_string();
        tracing::debug!(
            peer = %self.peer,
            method = %request.method,
            uri = %request.uri,
            %cseq,
            state = ?self.state,
            "request"
        );

        let (mut response, after) = match self.dispatch(request, &cseq) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(peer = %self.peer, method = %request.method, error = %e, "request failed");
                (
                    RtspResponse::with_status(e.status_code()).add_header("CSeq", &cseq),
                    After::Nothing,
                )
            }
        };

        if response.is_success()
            && let Some(binding) = &self.binding
        {
            let value = format!("{};timeout={}", binding.id, self.config.session_timeout_secs);
            response = response.add_header("Session", &value);
        }

        tracing::debug!(peer = %self.peer, status = response.status_code, %cseq, "response");
        self.send(&response)?;

        match after {
            After::Nothing => {}
            After::StartDelivery => self.start_delivery(),
            After::Terminate => self.terminated = true,
        }
        Ok(())
    }

    /// Tear the session down as if TEARDOWN had been received. Used when
    /// the connection is lost.
    pub fn shutdown(&mut self) {
        if self.unbind().is_some() {
            tracing::info!(peer = %self.peer, "session cleaned up on disconnect");
        }
        self.terminated = true;
    }

    /// Answer a message that could not be framed.
    pub fn reject(&self, error: &RtspError) -> Result<()> {
        tracing::warn!(peer = %self.peer, %error, "rejecting unreadable request");
        self.send(&RtspResponse::with_status(error.status_code()).add_header("CSeq", "0"))
    }

    fn send(&self, response: &RtspResponse) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(&response.serialize())?;
        writer.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, request: &RtspRequest, cseq: &str) -> Result<(RtspResponse, After)> {
        let response = match request.method {
            Method::Options => RtspResponse::ok()
                .add_header("CSeq", cseq)
                .add_header("Public", PUBLIC_METHODS),
            Method::Describe => self.describe(request, cseq)?,
            Method::Setup => self.setup(request, cseq)?,
            Method::Play => return self.play(request, cseq),
            Method::Pause => self.pause(request, cseq)?,
            Method::Teardown => return self.teardown(request, cseq),
            // Keepalive (RFC 2326 §10.8).
            Method::GetParameter => RtspResponse::ok().add_header("CSeq", cseq),
            Method::Other(ref name) => {
                tracing::warn!(method = %name, %cseq, "unsupported RTSP method");
                RtspResponse::with_status(501).add_header("CSeq", cseq)
            }
        };
        Ok((response, After::Nothing))
    }

    /// Host for SDP `o=`/`c=`: configured public host, else the request
    /// URI host, else the client IP.
    fn advertised_host(&self, uri: &str) -> String {
        if let Some(host) = &self.config.public_host {
            return host.clone();
        }

        if let Some(after_scheme) = uri
            .strip_prefix("rtsp://")
            .or_else(|| uri.strip_prefix("rtsps://"))
        {
            let host = after_scheme
                .split('/')
                .next()
                .and_then(|host_port| host_port.split(':').next())
                .unwrap_or("")
                .trim();
            if !host.is_empty() {
                return host.to_string();
            }
        }
        self.peer.ip().to_string()
    }

    fn describe(&self, request: &RtspRequest, cseq: &str) -> Result<RtspResponse> {
        let mount = self
            .mounts
            .resolve_from_uri(&request.uri)
            .ok_or_else(|| RtspError::MountNotFound(request.uri.clone()))?;

        let host = self.advertised_host(&request.uri);
        let body = sdp::describe_mount(
            &mount,
            &SdpOrigin {
                username: &self.config.sdp_username,
                session_id: &self.config.sdp_session_id,
                session_version: &self.config.sdp_session_version,
                session_name: &self.config.sdp_session_name,
                host: &host,
            },
        );

        Ok(RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Content-Type", "application/sdp")
            .add_header(
                "Content-Base",
                &format!("{}/", request.uri.trim_end_matches('/')),
            )
            .with_body(body))
    }

    fn setup(&mut self, request: &RtspRequest, cseq: &str) -> Result<RtspResponse> {
        if self.binding.is_some() {
            self.check_session(request)?;
        }

        let mount = self
            .mounts
            .resolve_from_uri(&request.uri)
            .ok_or_else(|| RtspError::MountNotFound(request.uri.clone()))?;
        let transport = request
            .get_header("Transport")
            .ok_or_else(|| RtspError::TransportNegotiationFailed("missing Transport header".into()))
            .and_then(InterleavedTransport::parse)?;

        if let Some(binding) = self.binding.as_mut()
            && Arc::ptr_eq(&binding.mount, &mount)
        {
            binding.transport = transport;
            tracing::debug!(session_id = %binding.id, mount = %mount.path(), "SETUP of bound resource");
            return Ok(RtspResponse::ok()
                .add_header("CSeq", cseq)
                .add_header("Transport", &transport.to_header()));
        }

        let previous = self.unbind();
        let source = mount.open()?;

        let entry = self
            .sessions
            .create(&request.uri, self.peer, previous.as_deref());
        let id = entry.id.clone();
        tracing::info!(
            session_id = %id,
            previous = previous.as_deref().unwrap_or("-"),
            mount = %mount.path(),
            uri = %request.uri,
            peer = %self.peer,
            rtp_channel = transport.rtp_channel,
            "session bound via SETUP"
        );

        self.binding = Some(Binding {
            id,
            uri: request.uri.clone(),
            packetizer: Some(Box::new(mount.packetizer(self.config.max_payload))),
            mount,
            transport,
            source: Arc::new(Mutex::new(source)),
            entry,
        });
        self.state = SessionState::Ready;

        Ok(RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Transport", &transport.to_header()))
    }

    fn play(&mut self, request: &RtspRequest, cseq: &str) -> Result<(RtspResponse, After)> {
        if self.state != SessionState::Ready {
            return Err(RtspError::invalid_state(&request.method, self.state));
        }
        self.check_session(request)?;
        let binding = self
            .binding
            .as_ref()
            .ok_or_else(|| RtspError::invalid_state(&request.method, self.state))?;

        let mut response = RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Range", "npt=0.000-");
        if let Some(packetizer) = &binding.packetizer {
            let rtp_info = format!(
                "url={};seq={};rtptime={}",
                binding.uri,
                packetizer.next_sequence(),
                packetizer.next_rtp_timestamp()
            );
            response = response.add_header("RTP-Info", &rtp_info);
        }

        binding.entry.set_state(SessionState::Playing);
        self.state = SessionState::Playing;
        tracing::info!(session_id = %binding.id, "session started playing");

        Ok((response, After::StartDelivery))
    }

    fn pause(&mut self, request: &RtspRequest, cseq: &str) -> Result<RtspResponse> {
        if self.state != SessionState::Playing {
            return Err(RtspError::invalid_state(&request.method, self.state));
        }
        self.check_session(request)?;

        let packetizer = self.delivery.take().and_then(Delivery::stop);
        if let Some(binding) = self.binding.as_mut() {
            binding.packetizer = packetizer;
            binding.entry.set_state(SessionState::Ready);
            tracing::info!(session_id = %binding.id, "session paused");
        }
        self.state = SessionState::Ready;

        Ok(RtspResponse::ok().add_header("CSeq", cseq))
    }

    fn teardown(&mut self, request: &RtspRequest, cseq: &str) -> Result<(RtspResponse, After)> {
        if self.state == SessionState::Init {
            return Err(RtspError::invalid_state(&request.method, self.state));
        }
        self.check_session(request)?;

        let mut response = RtspResponse::ok().add_header("CSeq", cseq);
        if let Some(id) = self.unbind() {
            tracing::info!(session_id = %id, "session terminated via TEARDOWN");
            let value = format!("{};timeout={}", id, self.config.session_timeout_secs);
            response = response.add_header("Session", &value);
        }
        Ok((response, After::Terminate))
    }

    /// A `Session` header, when present, must name the bound session.
    fn check_session(&self, request: &RtspRequest) -> Result<()> {
        match (request.session_id(), &self.binding) {
            (None, _) => Ok(()),
            (Some(given), Some(binding)) if given == binding.id => Ok(()),
            (Some(given), _) => Err(RtspError::InvalidSessionHeader(given.to_string())),
        }
    }

    fn start_delivery(&mut self) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        let packetizer = match binding.packetizer.take() {
            Some(packetizer) => packetizer,
            None => Box::new(binding.mount.packetizer(self.config.max_payload)),
        };
        let params = binding.mount.params();
        let config = DeliveryConfig {
            channel: binding.transport.rtp_channel,
            poll_interval: self.config.poll_interval,
            frame_interval: params.frame_interval(),
            timestamp_increment: params.timestamp_increment(),
        };

        match Delivery::start(
            binding.source.clone(),
            packetizer,
            self.writer.clone(),
            config,
            self.lost.clone(),
        ) {
            Ok(delivery) => self.delivery = Some(delivery),
            Err(e) => {
                tracing::error!(session_id = %binding.id, error = %e, "failed to start delivery");
                binding.entry.set_state(SessionState::Ready);
                self.state = SessionState::Ready;
            }
        }
    }

    /// Stop delivery, close the bound source and unregister. Returns the
    /// id of the session that was bound.
    fn unbind(&mut self) -> Option<String> {
        if let Some(delivery) = self.delivery.take() {
            delivery.stop();
        }
        let binding = self.binding.take()?;
        binding.source.lock().close();
        self.sessions.remove(&binding.id);
        self.state = SessionState::Init;
        tracing::debug!(session_id = %binding.id, mount = %binding.mount.path(), "source closed");
        Some(binding.id)
    }
}

impl<W: Write + Send + 'static> Drop for ServerSession<W> {
    fn drop(&mut self) {
        self.unbind();
    }
}
