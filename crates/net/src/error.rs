// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from connection handling.

use thiserror::Error;

use gearbox_proto::FrameError;

/// Errors surfaced by an [`Agent`](crate::Agent).
#[derive(Debug, Error)]
pub enum NetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("not connected")]
    NotConnected,

    #[error("agent is closed")]
    Closed,

    #[error("gave up after {attempts} dial attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("dispatch queue closed")]
    DispatchClosed,
}
