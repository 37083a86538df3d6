//! RTP packetization.
//!
//! Each encoded frame is split into one or more RTP packets. Every packet
//! carries a 12-byte fixed header ([`rtp::RtpHeader`]) containing:
//!
//! - **Sequence number** (16-bit, wrapping) for reordering and loss detection.
//! - **Timestamp** (32-bit) on the media clock, 90 kHz for video.
//! - **SSRC** (32-bit) randomly chosen to identify the sender.
//! - **Marker bit** set on the last packet of a frame.

pub mod rtp;

use crate::error::Result;
use rtp::{HEADER_LEN, RtpPacket, RtpSequencer};

/// Largest payload that still fits one interleaved block.
pub const MAX_PAYLOAD: usize = crate::transport::interleaved::MAX_BLOCK - HEADER_LEN;

/// Default payload size per packet.
pub const DEFAULT_PAYLOAD: usize = 1400;

/// Turns encoded frames into RTP packets.
///
/// The generic RTP header is handled by [`rtp::RtpSequencer`];
/// packetizers compose it rather than reimplementing header state.
pub trait Packetizer: Send {
    /// Packetize one encoded frame into serialized RTP packets, then
    /// advance the timestamp by `timestamp_increment`.
    fn packetize(&mut self, frame: &[u8], timestamp_increment: u32) -> Result<Vec<Vec<u8>>>;

    /// RTP payload type number (RFC 3551).
    fn payload_type(&self) -> u8;

    /// RTP clock rate in Hz.
    fn clock_rate(&self) -> u32;

    /// Sequence number of the next packet (for the `RTP-Info` header).
    fn next_sequence(&self) -> u16;

    /// Timestamp of the next frame (for the `RTP-Info` header).
    fn next_rtp_timestamp(&self) -> u32;
}

/// Splits a frame into consecutive chunks of at most `max_payload` bytes.
///
/// The marker bit is set on the last chunk of each frame. This is the
/// payload framing of static payload types whose frames are carried as
/// opaque bytes.
#[derive(Debug)]
pub struct FramePacketizer {
    sequencer: RtpSequencer,
    clock_rate: u32,
    max_payload: usize,
}

impl FramePacketizer {
    pub fn new(payload_type: u8, clock_rate: u32) -> Self {
        Self {
            sequencer: RtpSequencer::with_random_ssrc(payload_type),
            clock_rate,
            max_payload: DEFAULT_PAYLOAD,
        }
    }

    pub fn with_sequencer(sequencer: RtpSequencer, clock_rate: u32) -> Self {
        Self {
            sequencer,
            clock_rate,
            max_payload: DEFAULT_PAYLOAD,
        }
    }

    /// Clamped to `1..=MAX_PAYLOAD`.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.clamp(1, MAX_PAYLOAD);
        self
    }

    pub fn ssrc(&self) -> u32 {
        self.sequencer.ssrc()
    }
}

impl Packetizer for FramePacketizer {
    fn packetize(&mut self, frame: &[u8], timestamp_increment: u32) -> Result<Vec<Vec<u8>>> {
        let mut packets = Vec::with_capacity(frame.len().div_ceil(self.max_payload));
        let mut chunks = frame.chunks(self.max_payload).peekable();
        while let Some(chunk) = chunks.next() {
            let header = self.sequencer.next_header(chunks.peek().is_none());
            packets.push(RtpPacket::new(header, chunk).encode()?);
        }
        self.sequencer.advance_timestamp(timestamp_increment);
        tracing::trace!(
            frame_len = frame.len(),
            packets = packets.len(),
            "frame packetized"
        );
        Ok(packets)
    }

    fn payload_type(&self) -> u8 {
        self.sequencer.payload_type()
    }

    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    fn next_sequence(&self) -> u16 {
        self.sequencer.sequence()
    }

    fn next_rtp_timestamp(&self) -> u32 {
        self.sequencer.timestamp()
    }
}
