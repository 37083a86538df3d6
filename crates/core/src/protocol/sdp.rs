//! SDP (Session Description Protocol) codec (RFC 4566 / RFC 8866).
//!
//! ```text
//! v=0                                          ← protocol version
//! o=<user> <sess-id> <sess-ver> IN IP4 <addr>  ← origin
//! s=<session-name>                              ← session name
//! c=IN IP4 <addr>                               ← connection address
//! t=0 0                                         ← timing (live stream)
//! a=tool:rtsp-stack                             ← session attribute
//! m=video 0 RTP/AVP 96                          ← media description
//! a=rtpmap:96 H264/90000                        ← media attribute
//! a=control:track1                              ← track control URL
//! ```
//!
//! Parsing is line oriented and forgiving: a malformed line is logged and
//! skipped, never fatal. Line types this codec does not model go to an
//! "other" bucket so serialization does not drop them.

use std::fmt::Write as _;

use crate::mount::Mount;

/// Ordered `a=` attribute map. Duplicate keys overwrite the earlier value
/// and keep its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Session-level description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdpSession {
    /// `v=`, always 0.
    pub version: u32,
    pub origin: Option<String>,
    pub session_name: Option<String>,
    pub info: Option<String>,
    pub uri: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub connection: Option<String>,
    pub bandwidth: Option<String>,
    /// `t=<start> <stop>`.
    pub timing: Option<(u64, u64)>,
    pub attributes: Attributes,
    /// Lines of unmodelled types, as `(type, value)`.
    pub other: Vec<(char, String)>,
}

/// One `m=` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdpMedia {
    /// `video`, `audio`, ...
    pub media_type: String,
    /// Port token, verbatim (may carry a `/count` suffix).
    pub port: String,
    pub protocol: String,
    /// Format list, verbatim remainder of the `m=` line.
    pub format: String,
    pub attributes: Attributes,
    pub bandwidth: Option<String>,
    pub other: Vec<(char, String)>,
}

impl SdpMedia {
    pub fn new(media_type: &str, port: &str, protocol: &str, format: &str) -> Self {
        SdpMedia {
            media_type: media_type.to_string(),
            port: port.to_string(),
            protocol: protocol.to_string(),
            format: format.to_string(),
            ..Default::default()
        }
    }

    /// The `a=control` attribute, if any.
    pub fn control(&self) -> Option<&str> {
        self.attributes.get("control")
    }
}

#[derive(Debug)]
struct LineError(&'static str);

/// Parse SDP text into the session description and its media sections.
pub fn parse(text: &str) -> (SdpSession, Vec<SdpMedia>) {
    let mut session = SdpSession::default();
    let mut media: Vec<SdpMedia> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Err(LineError(reason)) = parse_line(line, &mut session, &mut media) {
            tracing::warn!(line, reason, "skipping malformed SDP line");
        }
    }

    (session, media)
}

fn parse_line(
    line: &str,
    session: &mut SdpSession,
    media: &mut Vec<SdpMedia>,
) -> Result<(), LineError> {
    let mut chars = line.chars();
    let kind = chars.next().ok_or(LineError("empty line"))?;
    if chars.next() != Some('=') {
        return Err(LineError("missing '=' after type"));
    }
    let value = line[kind.len_utf8() + 1..].trim();

    match kind {
        'v' => {
            let version: u32 = value.parse().map_err(|_| LineError("bad version"))?;
            if version != 0 {
                return Err(LineError("version must be 0"));
            }
            session.version = version;
        }
        'o' => session.origin = Some(value.to_string()),
        's' => session.session_name = Some(value.to_string()),
        'i' => session.info = Some(value.to_string()),
        'u' => session.uri = Some(value.to_string()),
        'e' => session.email = Some(value.to_string()),
        'p' => session.phone = Some(value.to_string()),
        'c' => session.connection = Some(value.to_string()),
        't' => {
            let parts: Vec<&str> = value.split(' ').collect();
            let [start, stop] = parts.as_slice() else {
                return Err(LineError("t= needs exactly two fields"));
            };
            let start: u64 = start.parse().map_err(|_| LineError("bad start time"))?;
            let stop: u64 = stop.parse().map_err(|_| LineError("bad stop time"))?;
            session.timing = Some((start, stop));
        }
        'm' => {
            let fields: Vec<&str> = value.splitn(4, ' ').collect();
            let [media_type, port, protocol, format] = fields.as_slice() else {
                return Err(LineError("m= needs four fields"));
            };
            media.push(SdpMedia::new(media_type, port, protocol, format));
        }
        'b' => match media.last_mut() {
            Some(m) => m.bandwidth = Some(value.to_string()),
            None => session.bandwidth = Some(value.to_string()),
        },
        'a' => {
            // Flag attributes (no colon) are not recorded.
            if let Some((key, val)) = value.split_once(':') {
                match media.last_mut() {
                    Some(m) => m.attributes.insert(key, val),
                    None => session.attributes.insert(key, val),
                }
            }
        }
        other => {
            tracing::debug!(kind = %other, value, "unmodelled SDP line");
            match media.last_mut() {
                Some(m) => m.other.push((other, value.to_string())),
                None => session.other.push((other, value.to_string())),
            }
        }
    }
    Ok(())
}

/// Serialize a session description back to SDP text (CRLF line endings).
pub fn serialize(session: &SdpSession, media: &[SdpMedia]) -> String {
    let mut out = String::new();
    let mut line = |kind: char, value: &str| {
        let _ = write!(out, "{kind}={value}\r\n");
    };

    line('v', &session.version.to_string());
    let optional = [
        ('o', &session.origin),
        ('s', &session.session_name),
        ('i', &session.info),
        ('u', &session.uri),
        ('e', &session.email),
        ('p', &session.phone),
        ('c', &session.connection),
        ('b', &session.bandwidth),
    ];
    for (kind, value) in optional {
        if let Some(value) = value {
            line(kind, value);
        }
    }
    if let Some((start, stop)) = session.timing {
        line('t', &format!("{start} {stop}"));
    }
    for (key, value) in session.attributes.iter() {
        line('a', &format!("{key}:{value}"));
    }
    for (kind, value) in &session.other {
        line(*kind, value);
    }

    for m in media {
        line(
            'm',
            &format!("{} {} {} {}", m.media_type, m.port, m.protocol, m.format),
        );
        if let Some(bw) = &m.bandwidth {
            line('b', bw);
        }
        for (key, value) in m.attributes.iter() {
            line('a', &format!("{key}:{value}"));
        }
        for (kind, value) in &m.other {
            line(*kind, value);
        }
    }

    out
}

/// Origin and naming fields for a generated description.
#[derive(Debug, Clone)]
pub struct SdpOrigin<'a> {
    pub username: &'a str,
    pub session_id: &'a str,
    pub session_version: &'a str,
    pub session_name: &'a str,
    pub host: &'a str,
}

/// Build the DESCRIBE body for a mount: one video track whose control URL
/// is `track1` relative to the mount.
pub fn describe_mount(mount: &Mount, origin: &SdpOrigin<'_>) -> String {
    let session = SdpSession {
        version: 0,
        origin: Some(format!(
            "{} {} {} IN IP4 {}",
            origin.username, origin.session_id, origin.session_version, origin.host
        )),
        session_name: Some(origin.session_name.to_string()),
        connection: Some(format!("IN IP4 {}", origin.host)),
        timing: Some((0, 0)),
        attributes: {
            let mut attrs = Attributes::default();
            attrs.insert("tool", "rtsp-stack");
            attrs.insert("range", "npt=0-");
            attrs
        },
        ..Default::default()
    };

    let params = mount.params();
    let mut video = SdpMedia::new(
        "video",
        "0",
        "RTP/AVP",
        &params.payload_type.to_string(),
    );
    video.attributes.insert(
        "rtpmap",
        &format!(
            "{} {}/{}",
            params.payload_type, params.encoding, params.clock_rate
        ),
    );
    video
        .attributes
        .insert("framerate", &params.frame_rate.to_string());
    video.attributes.insert("control", "track1");

    let sdp = serialize(&session, &[video]);
    tracing::debug!(mount = %mount.path(), "SDP: {}", sdp.trim_end());
    sdp
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERA_SDP: &str = "v=0\r\n\
o=- 1109162014219182 0 IN IP4 0.0.0.0\r\n\
s=HIK Media Server V3.0.2\r\n\
i=HIK Media Server Session Description : standard\r\n\
e=NONE\r\n\
c=IN IP4 0.0.0.0\r\n\
t=0 0\r\n\
a=control:*\r\n\
b=AS:1034\r\n\
a=range:npt=now-\r\n\
m=video 0 RTP/AVP 96\r\n\
i=Video Media\r\n\
a=rtpmap:96 H264/90000\r\n\
a=fmtp:96 profile-level-id=4D0014;packetization-mode=0\r\n\
a=control:trackID=video\r\n\
b=AS:1024\r\n\
a=Media_header:MEDIAINFO=494D4B48;\r\n\
a=appversion:1.0\r\n";

    #[test]
    fn parses_camera_description() {
        let (session, media) = parse(CAMERA_SDP);
        assert_eq!(session.version, 0);
        assert_eq!(session.session_name.as_deref(), Some("HIK Media Server V3.0.2"));
        assert_eq!(session.timing, Some((0, 0)));
        assert_eq!(session.bandwidth.as_deref(), Some("AS:1034"));
        assert_eq!(session.attributes.get("control"), Some("*"));
        assert_eq!(session.attributes.get("range"), Some("npt=now-"));

        assert_eq!(media.len(), 1);
        let video = &media[0];
        assert_eq!(video.media_type, "video");
        assert_eq!(video.port, "0");
        assert_eq!(video.protocol, "RTP/AVP");
        assert_eq!(video.format, "96");
        assert_eq!(video.bandwidth.as_deref(), Some("AS:1024"));
        assert_eq!(video.control(), Some("trackID=video"));
        assert_eq!(
            video.attributes.get("Media_header"),
            Some("MEDIAINFO=494D4B48;")
        );
        // i= is session-level by type tag, so the media-level one wins.
        assert_eq!(session.info.as_deref(), Some("Video Media"));
    }

    #[test]
    fn round_trip_is_stable() {
        let first = parse(CAMERA_SDP);
        let text = serialize(&first.0, &first.1);
        let second = parse(&text);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_types_survive_round_trip() {
        let text = "v=0\r\nz=2882844526 -1s\r\nm=audio 49170 RTP/AVP 0 8\r\nk=prompt\r\nr=7d 1h 0 25h\r\n";
        let (session, media) = parse(text);
        assert_eq!(session.other, vec![('z', "2882844526 -1s".to_string())]);
        assert_eq!(media[0].format, "0 8");
        assert_eq!(media[0].other.len(), 2);

        let again = parse(&serialize(&session, &media));
        assert_eq!(again, (session, media));
    }

    #[test]
    fn attribute_without_colon_is_ignored() {
        let (session, _) = parse("v=0\r\na=sendonly\r\na=tool:x\r\n");
        assert_eq!(session.attributes.len(), 1);
        assert_eq!(session.attributes.get("tool"), Some("x"));
    }

    #[test]
    fn duplicate_attribute_last_wins() {
        let (session, _) = parse("v=0\r\na=tool:first\r\na=range:npt=0-\r\na=tool:second\r\n");
        assert_eq!(session.attributes.get("tool"), Some("second"));
        let keys: Vec<_> = session.attributes.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["tool", "range"]);
    }

    #[test]
    fn malformed_lines_do_not_abort() {
        let text = "v=0\r\nt=abc\r\nt=1 2 3\r\ngarbage\r\nm=video 0\r\ns=Still parsed\r\n";
        let (session, media) = parse(text);
        assert_eq!(session.timing, None);
        assert!(media.is_empty());
        assert_eq!(session.session_name.as_deref(), Some("Still parsed"));
    }

    #[test]
    fn nonzero_version_is_rejected_per_line() {
        let (session, _) = parse("v=1\r\ns=x\r\n");
        assert_eq!(session.version, 0);
        assert_eq!(session.session_name.as_deref(), Some("x"));
    }

    #[test]
    fn media_lines_attach_to_latest_section() {
        let text = "v=0\r\nm=video 0 RTP/AVP 96\r\na=control:track1\r\nm=audio 0 RTP/AVP 8\r\na=control:track2\r\nb=AS:64\r\n";
        let (session, media) = parse(text);
        assert!(session.attributes.is_empty());
        assert_eq!(media[0].control(), Some("track1"));
        assert_eq!(media[1].control(), Some("track2"));
        assert_eq!(media[1].bandwidth.as_deref(), Some("AS:64"));
        assert!(media[0].bandwidth.is_none());
    }

    #[test]
    fn describes_mount() {
        use crate::mount::{Mount, MountParams};
        use crate::source::testing::StaticSource;

        let mount = Mount::new("/stream", StaticSource::factory(vec![]), MountParams::default());
        let sdp = describe_mount(
            &mount,
            &SdpOrigin {
                username: "server",
                session_id: "1234567890",
                session_version: "1",
                session_name: "Test Session",
                host: "192.168.1.100",
            },
        );
        assert!(sdp.starts_with("v=0\r\n"));
        assert!(sdp.contains("o=server 1234567890 1 IN IP4 192.168.1.100\r\n"));
        assert!(sdp.contains("s=Test Session\r\n"));
        assert!(sdp.contains("c=IN IP4 192.168.1.100\r\n"));
        assert!(sdp.contains("a=tool:rtsp-stack\r\n"));
        assert!(sdp.contains("m=video 0 RTP/AVP 26\r\n"));
        assert!(sdp.contains("a=rtpmap:26 JPEG/90000\r\n"));
        assert!(sdp.contains("a=control:track1\r\n"));

        let m_idx = sdp.find("m=video").unwrap();
        let tool_idx = sdp.find("a=tool").unwrap();
        assert!(tool_idx < m_idx, "session attributes must precede m= line");

        let (_, media) = parse(&sdp);
        assert_eq!(media[0].control(), Some("track1"));
    }
}
