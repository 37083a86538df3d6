//! Interleaved binary data on the RTSP TCP connection (RFC 2326 §10.12).
//!
//! ```text
//! +-----+---------+----------------+-----------------
//! | '$' | channel | length (u16 BE) | data ...
//! +-----+---------+----------------+-----------------
//! ```
//!
//! With `Transport: RTP/AVP/TCP;unicast;interleaved=0-1`, channel 0
//! carries RTP and channel 1 carries RTCP.

use std::io::Read;

use crate::error::{Result, RtspError};

/// Leading byte of an interleaved block.
pub const MAGIC: u8 = b'$';

/// Largest payload a single block can carry.
pub const MAX_BLOCK: usize = u16::MAX as usize;

/// Frame `data` for `channel`.
pub fn encode_block(channel: u8, data: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(data.len()).map_err(|_| RtspError::FrameTooLarge(data.len()))?;
    let mut out = Vec::with_capacity(4 + data.len());
    out.push(MAGIC);
    out.push(channel);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Read one block. The reader must be positioned on the `$` byte.
pub fn read_block<R: Read>(reader: &mut R) -> Result<(u8, Vec<u8>)> {
    let mut head = [0u8; 4];
    reader.read_exact(&mut head)?;
    if head[0] != MAGIC {
        return Err(RtspError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "interleaved block must start with '$'",
        )));
    }
    let len = u16::from_be_bytes([head[2], head[3]]) as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    tracing::trace!(channel = head[1], len, "interleaved block");
    Ok((head[1], data))
}
