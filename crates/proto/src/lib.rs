// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gearbox-proto: wire framing for the job-server protocol.
//!
//! Every message on the wire is one frame: a fixed 12-byte header
//! (4-byte magic token, 4-byte big-endian operation code, 4-byte
//! big-endian payload length) followed by an opaque payload. This crate
//! is pure and does no I/O; the connection layer feeds it buffered
//! bytes and writes back what it encodes.

pub mod codec;
pub mod packet;

pub use codec::{decode, encode, Decoded, FrameError, HEADER_LEN};
pub use packet::{Magic, Packet, PacketKind, MAGIC_LEN};
