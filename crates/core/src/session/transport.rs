use crate::error::{Result, RtspError};

const PROFILE: &str = "RTP/AVP/TCP";

/// Negotiated interleaved transport (RFC 2326 §10.12, §12.39).
///
/// ## Wire format example
///
/// ```text
/// Client → Server:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1
///
/// Server → Client:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1
/// ```
///
/// RTP travels in `$` blocks on `rtp_channel`, RTCP would use
/// `rtcp_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterleavedTransport {
    pub rtp_channel: u8,
    pub rtcp_channel: u8,
}

impl Default for InterleavedTransport {
    fn default() -> Self {
        Self {
            rtp_channel: 0,
            rtcp_channel: 1,
        }
    }
}

impl InterleavedTransport {
    /// Parse a `Transport` header value.
    ///
    /// The header may list several comma-separated alternatives; the first
    /// one that is `RTP/AVP/TCP`, `unicast` and names an `interleaved`
    /// channel pair wins. A single channel `interleaved=n` implies `n+1`
    /// for RTCP.
    ///
    /// ```
    /// use rtsp::session::transport::InterleavedTransport;
    ///
    /// let t = InterleavedTransport::parse("RTP/AVP/TCP;unicast;interleaved=2-3").unwrap();
    /// assert_eq!((t.rtp_channel, t.rtcp_channel), (2, 3));
    ///
    /// assert!(InterleavedTransport::parse("RTP/AVP;unicast;client_port=8000-8001").is_err());
    /// ```
    pub fn parse(header: &str) -> Result<Self> {
        header
            .split(',')
            .find_map(parse_one)
            .ok_or_else(|| RtspError::TransportNegotiationFailed(header.trim().to_string()))
    }

    /// Render as a `Transport` header value.
    pub fn to_header(&self) -> String {
        format!(
            "{};unicast;interleaved={}-{}",
            PROFILE, self.rtp_channel, self.rtcp_channel
        )
    }
}

fn parse_one(alternative: &str) -> Option<InterleavedTransport> {
    let mut parts = alternative.split(';').map(str::trim);
    if !parts.next()?.eq_ignore_ascii_case(PROFILE) {
        return None;
    }

    let mut unicast = false;
    let mut channels = None;
    for part in parts {
        if part.eq_ignore_ascii_case("unicast") {
            unicast = true;
        } else if let Some(value) = part.strip_prefix("interleaved=") {
            channels = Some(match value.split_once('-') {
                Some((rtp, rtcp)) => (rtp.trim().parse().ok()?, rtcp.trim().parse().ok()?),
                None => {
                    let rtp: u8 = value.trim().parse().ok()?;
                    (rtp, rtp.checked_add(1)?)
                }
            });
        }
    }

    let (rtp_channel, rtcp_channel) = channels?;
    unicast.then_some(InterleavedTransport {
        rtp_channel,
        rtcp_channel,
    })
}
