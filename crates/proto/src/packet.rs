// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet model: magic tokens, operation codes, and the frame payload.

use crate::codec::HEADER_LEN;

/// Length of a magic token on the wire.
pub const MAGIC_LEN: usize = 4;

/// Framing direction, encoded as a 4-byte magic token.
///
/// Requests flow toward the job server, responses flow back. The token
/// doubles as the resynchronization marker when scanning a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magic {
    Request,
    Response,
}

impl Magic {
    /// The 4-byte token this direction uses on the wire.
    pub const fn token(self) -> [u8; MAGIC_LEN] {
        match self {
            Magic::Request => *b"\0REQ",
            Magic::Response => *b"\0RES",
        }
    }

    /// Parse a 4-byte token. Returns `None` for anything else.
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"\0REQ" => Some(Magic::Request),
            b"\0RES" => Some(Magic::Response),
            _ => None,
        }
    }
}

/// Operation code identifying what a packet means.
///
/// Codes follow the job-server protocol's assignment. Codes this crate
/// does not know are carried through as [`PacketKind::Unknown`] so they
/// survive a decode/encode round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    CanDo,
    CantDo,
    ResetAbilities,
    PreSleep,
    Noop,
    SubmitJob,
    JobCreated,
    GrabJob,
    NoJob,
    JobAssign,
    WorkStatus,
    WorkComplete,
    WorkFail,
    GetStatus,
    EchoReq,
    EchoRes,
    SubmitJobBg,
    Error,
    StatusRes,
    SetClientId,
    CanDoTimeout,
    AllYours,
    WorkException,
    WorkData,
    WorkWarning,
    GrabJobUniq,
    JobAssignUniq,
    Unknown(u32),
}

impl PacketKind {
    /// Numeric operation code used in the frame header.
    pub const fn code(self) -> u32 {
        match self {
            PacketKind::CanDo => 1,
            PacketKind::CantDo => 2,
            PacketKind::ResetAbilities => 3,
            PacketKind::PreSleep => 4,
            PacketKind::Noop => 6,
            PacketKind::SubmitJob => 7,
            PacketKind::JobCreated => 8,
            PacketKind::GrabJob => 9,
            PacketKind::NoJob => 10,
            PacketKind::JobAssign => 11,
            PacketKind::WorkStatus => 12,
            PacketKind::WorkComplete => 13,
            PacketKind::WorkFail => 14,
            PacketKind::GetStatus => 15,
            PacketKind::EchoReq => 16,
            PacketKind::EchoRes => 17,
            PacketKind::SubmitJobBg => 18,
            PacketKind::Error => 19,
            PacketKind::StatusRes => 20,
            PacketKind::SetClientId => 22,
            PacketKind::CanDoTimeout => 23,
            PacketKind::AllYours => 24,
            PacketKind::WorkException => 25,
            PacketKind::WorkData => 28,
            PacketKind::WorkWarning => 29,
            PacketKind::GrabJobUniq => 30,
            PacketKind::JobAssignUniq => 31,
            PacketKind::Unknown(code) => code,
        }
    }

    /// Map a numeric code back to a kind.
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => PacketKind::CanDo,
            2 => PacketKind::CantDo,
            3 => PacketKind::ResetAbilities,
            4 => PacketKind::PreSleep,
            6 => PacketKind::Noop,
            7 => PacketKind::SubmitJob,
            8 => PacketKind::JobCreated,
            9 => PacketKind::GrabJob,
            10 => PacketKind::NoJob,
            11 => PacketKind::JobAssign,
            12 => PacketKind::WorkStatus,
            13 => PacketKind::WorkComplete,
            14 => PacketKind::WorkFail,
            15 => PacketKind::GetStatus,
            16 => PacketKind::EchoReq,
            17 => PacketKind::EchoRes,
            18 => PacketKind::SubmitJobBg,
            19 => PacketKind::Error,
            20 => PacketKind::StatusRes,
            22 => PacketKind::SetClientId,
            23 => PacketKind::CanDoTimeout,
            24 => PacketKind::AllYours,
            25 => PacketKind::WorkException,
            28 => PacketKind::WorkData,
            29 => PacketKind::WorkWarning,
            30 => PacketKind::GrabJobUniq,
            31 => PacketKind::JobAssignUniq,
            other => PacketKind::Unknown(other),
        }
    }
}

/// One protocol message.
///
/// The payload is opaque to the framing layer: length-delimited, not
/// terminated, and free to contain any bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub magic: Magic,
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A request-direction packet.
    pub fn request(kind: PacketKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: Magic::Request,
            kind,
            payload: payload.into(),
        }
    }

    /// A response-direction packet.
    pub fn response(kind: PacketKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: Magic::Response,
            kind,
            payload: payload.into(),
        }
    }

    /// Total encoded length of this packet on the wire.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
