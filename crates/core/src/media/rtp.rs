//! RTP fixed header and packet codec (RFC 3550 §5.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Only the 12-byte fixed header is interpreted. A CSRC list or header
//! extension, if present, stays in the payload.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, RtspError};

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 12;

/// RTP version carried by every packet.
pub const VERSION: u8 = 2;

/// Fixed header fields. Version is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub padding: bool,
    pub extension: bool,
    /// 4 bits on the wire.
    pub csrc_count: u8,
    pub marker: bool,
    /// 7 bits on the wire (RFC 3551).
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header stamped with the current Unix time in seconds.
    pub fn new(payload_type: u8, sequence: u16, ssrc: u32) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::with_timestamp(payload_type, sequence, now as u32, ssrc)
    }

    pub fn with_timestamp(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.csrc_count > 0x0F {
            return Err(RtspError::InvalidRtpField("csrc_count"));
        }
        if self.payload_type > 0x7F {
            return Err(RtspError::InvalidRtpField("payload_type"));
        }
        Ok(())
    }

    /// Serialize the 12-byte fixed header.
    pub fn encode(&self) -> Result<[u8; HEADER_LEN]> {
        self.validate()?;

        let mut out = [0u8; HEADER_LEN];
        out[0] = (VERSION << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | self.csrc_count;
        out[1] = ((self.marker as u8) << 7) | self.payload_type;
        out[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(RtspError::TruncatedHeader { len: buf.len() });
        }
        if buf[0] >> 6 != VERSION {
            return Err(RtspError::InvalidRtpField("version"));
        }
        Ok(Self {
            padding: buf[0] & 0x20 != 0,
            extension: buf[0] & 0x10 != 0,
            csrc_count: buf[0] & 0x0F,
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7F,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// A header plus the bytes following it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = self.header.encode()?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = RtpHeader::decode(buf)?;
        Ok(Self {
            header,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Sender-side header state.
///
/// - **Sequence number**: 16-bit, wrapping, incremented per packet.
/// - **Timestamp**: 32-bit, wrapping, advanced explicitly per frame.
/// - **SSRC**: random by default (RFC 3550 §8.1).
#[derive(Debug)]
pub struct RtpSequencer {
    payload_type: u8,
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpSequencer {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        tracing::debug!(
            payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP sequencer created"
        );
        Self {
            payload_type,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    pub fn with_random_ssrc(payload_type: u8) -> Self {
        Self::new(payload_type, rand::random::<u32>())
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Sequence number the next header will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Produce the next header and advance the sequence number.
    pub fn next_header(&mut self, marker: bool) -> RtpHeader {
        let mut header =
            RtpHeader::with_timestamp(self.payload_type, self.sequence, self.timestamp, self.ssrc);
        header.marker = marker;
        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// For video at 90 kHz the increment is `90000 / fps`.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RtpPacket {
        let mut header = RtpHeader::with_timestamp(26, 0x1234, 0xDEADBEEF, 0xAABBCCDD);
        header.marker = true;
        RtpPacket::new(header, vec![1, 2, 3, 4])
    }

    #[test]
    fn wire_layout() {
        let buf = sample().encode().unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[0], 0x80);
        assert_eq!(buf[1], 0x80 | 26);
        assert_eq!(&buf[2..4], &[0x12, 0x34]);
        assert_eq!(&buf[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&buf[8..12], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&buf[12..], &[1, 2, 3, 4]);
    }

    #[test]
    fn flag_bits() {
        let mut header = RtpHeader::with_timestamp(96, 0, 0, 0);
        header.padding = true;
        header.extension = true;
        header.csrc_count = 15;
        let buf = header.encode().unwrap();
        assert_eq!(buf[0], 0x80 | 0x20 | 0x10 | 0x0F);
        assert_eq!(RtpHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn decode_inverts_encode() {
        let packet = sample();
        let decoded = RtpPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn header_only_packet() {
        let packet = RtpPacket::new(RtpHeader::with_timestamp(0, 1, 2, 3), Vec::new());
        let buf = packet.encode().unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        assert!(RtpPacket::decode(&buf).unwrap().payload.is_empty());
    }

    #[test]
    fn truncated_header() {
        assert!(matches!(
            RtpPacket::decode(&[0x80; 11]),
            Err(RtspError::TruncatedHeader { len: 11 })
        ));
    }

    #[test]
    fn wrong_version() {
        let mut buf = sample().encode().unwrap();
        buf[0] = (1 << 6) | (buf[0] & 0x3F);
        assert!(matches!(
            RtpPacket::decode(&buf),
            Err(RtspError::InvalidRtpField("version"))
        ));
    }

    #[test]
    fn out_of_range_fields() {
        let mut header = RtpHeader::with_timestamp(128, 0, 0, 0);
        assert!(matches!(
            header.encode(),
            Err(RtspError::InvalidRtpField("payload_type"))
        ));
        header.payload_type = 26;
        header.csrc_count = 16;
        assert!(matches!(
            header.encode(),
            Err(RtspError::InvalidRtpField("csrc_count"))
        ));
    }

    #[test]
    fn default_timestamp_is_now() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as u32;
        let header = RtpHeader::new(26, 0, 0);
        assert!(header.timestamp.wrapping_sub(now) <= 1 || now.wrapping_sub(header.timestamp) <= 1);
    }

    #[test]
    fn sequencer_increments_and_wraps() {
        let mut seq = RtpSequencer::new(26, 7);
        seq.sequence = u16::MAX;
        let a = seq.next_header(false);
        let b = seq.next_header(true);
        assert_eq!(a.sequence, u16::MAX);
        assert_eq!(b.sequence, 0);
        assert!(b.marker);
        assert_eq!(b.ssrc, 7);
    }

    #[test]
    fn sequencer_timestamp_wraps() {
        let mut seq = RtpSequencer::new(26, 7);
        seq.advance_timestamp(u32::MAX);
        seq.advance_timestamp(4501);
        assert_eq!(seq.timestamp(), 4500);
        assert_eq!(seq.next_header(false).timestamp, 4500);
    }

    #[test]
    fn random_ssrc_differs() {
        let a = RtpSequencer::with_random_ssrc(26);
        let b = RtpSequencer::with_random_ssrc(26);
        assert_ne!(a.ssrc(), b.ssrc());
    }
}
