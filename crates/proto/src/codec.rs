// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame encoding and decoding.
//!
//! Wire format: 4-byte magic token + 4-byte operation code (big-endian)
//! + 4-byte payload length (big-endian) + payload. `decode` is
//! incremental: callers keep an accumulation buffer, retry on
//! [`Decoded::Partial`] after reading more bytes, and drain one frame
//! per call until the buffer holds no complete frame.

use thiserror::Error;

use crate::packet::{Magic, Packet, PacketKind, MAGIC_LEN};

/// Fixed header length: magic + code + payload length.
pub const HEADER_LEN: usize = 12;

/// Unrecoverable framing failure.
///
/// Incomplete input is not an error (see [`Decoded::Partial`]); this is
/// reserved for a byte stream the decoder cannot realign with. The
/// owning connection must be torn down and redialed, not retried in
/// place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("stream desynchronized: no magic token in {buffered} buffered bytes")]
    Desynchronized { buffered: usize },
}

/// Outcome of one decode attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// One complete frame, and how many buffered bytes it consumed.
    ///
    /// `consumed` covers any skipped prefix plus the frame itself; the
    /// caller drains that many bytes and may call `decode` again, since
    /// a single read can deliver several frames.
    Frame { packet: Packet, consumed: usize },
    /// Not enough bytes yet. Read more and retry with the grown buffer.
    Partial,
}

/// Encode a packet into its wire frame.
///
/// Total and deterministic: every well-formed packet has exactly one
/// encoding, `12 + payload.len()` bytes long.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + packet.payload.len());
    frame.extend_from_slice(&packet.magic.token());
    frame.extend_from_slice(&packet.kind.code().to_be_bytes());
    frame.extend_from_slice(&(packet.payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&packet.payload);
    frame
}

/// Decode at most one frame from the front of `buf`.
///
/// A buffer shorter than one header is always [`Decoded::Partial`]. A
/// header-sized buffer with no magic token anywhere is
/// [`FrameError::Desynchronized`]: the stream cannot be realigned.
pub fn decode(buf: &[u8]) -> Result<Decoded, FrameError> {
    if buf.len() < HEADER_LEN {
        return Ok(Decoded::Partial);
    }

    let Some((start, magic)) = find_magic(buf) else {
        return Err(FrameError::Desynchronized {
            buffered: buf.len(),
        });
    };

    let frame = &buf[start..];
    if frame.len() < HEADER_LEN {
        return Ok(Decoded::Partial);
    }

    let code = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
    let len = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]) as usize;
    let total = HEADER_LEN + len;
    if frame.len() < total {
        return Ok(Decoded::Partial);
    }

    Ok(Decoded::Frame {
        packet: Packet {
            magic,
            kind: PacketKind::from_code(code),
            payload: frame[HEADER_LEN..total].to_vec(),
        },
        consumed: start + total,
    })
}

/// Position and direction of the first magic token in `buf`.
fn find_magic(buf: &[u8]) -> Option<(usize, Magic)> {
    buf.windows(MAGIC_LEN)
        .enumerate()
        .find_map(|(i, window)| Magic::from_token(window).map(|magic| (i, magic)))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
