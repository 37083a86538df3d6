use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::RtspError;
use crate::mount::MountRegistry;
use crate::protocol::framer::skip_head;
use crate::protocol::{RtspMessage, read_message};
use crate::server::ServerConfig;
use crate::session::{ServerSession, SessionRegistry};

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    mounts: MountRegistry,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let m = mounts.clone();
                let s = sessions.clone();
                let c = config.clone();
                let r = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, m, s, c, r);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single RTSP client connection with its own lifecycle.
struct Connection {
    reader: BufReader<TcpStream>,
    session: ServerSession<TcpStream>,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    fn handle(
        stream: TcpStream,
        mounts: MountRegistry,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::info!(%peer_addr, "client connected");

        // Applies to the socket, so both halves share it.
        if let Err(e) = stream.set_write_timeout(Some(config.write_timeout)) {
            tracing::warn!(%peer_addr, error = %e, "could not set write timeout");
            return;
        }
        let writer = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut conn = Connection {
            reader: BufReader::new(stream),
            session: ServerSession::new(
                Arc::new(Mutex::new(writer)),
                peer_addr,
                mounts,
                sessions,
                config,
            ),
        };

        let reason = conn.run(&running);
        conn.session.shutdown();

        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// RTSP request/response loop. Returns the reason for exiting.
    fn run(&mut self, running: &AtomicBool) -> &'static str {
        while running.load(Ordering::SeqCst) {
            match read_message(&mut self.reader) {
                Ok(RtspMessage::Request(request)) => {
                    if self.session.handle(&request).is_err() {
                        return "write error";
                    }
                    if self.session.is_terminated() {
                        return "session torn down";
                    }
                    if self.session.is_lost() {
                        return "RTP delivery failed";
                    }
                }
                Ok(RtspMessage::Response(response)) => {
                    tracing::debug!(status = response.status_code, "ignoring response from client");
                }
                Err(RtspError::ConnectionLost) => return "connection closed by client",
                Err(e @ RtspError::Parse { .. }) => {
                    if self.session.reject(&e).is_err() {
                        return "write error";
                    }
                    if let Err(e) = skip_head(&mut self.reader) {
                        tracing::debug!(error = %e, "could not resynchronize after bad request");
                        return "read error";
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "read failed");
                    return "read error";
                }
            }
        }

        "server shutting down"
    }
}
