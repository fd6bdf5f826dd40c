// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch queue, error sink, and the capability-replay seam.
//!
//! The agent is deliberately dumb about what packets mean above the
//! envelope: decoded frames go onto the dispatch queue for the owning
//! worker or client to interpret, and failures go onto the event sink
//! for the owner to decide whether to rebind work elsewhere.

use async_trait::async_trait;
use tokio::sync::mpsc;

use gearbox_proto::Packet;

use crate::agent::Agent;
use crate::error::NetError;

/// Default dispatch queue capacity.
///
/// Small on purpose: a full queue blocks the read loop, which is the
/// designed backpressure against a slow consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One decoded frame, tagged with the connection it arrived on.
#[derive(Debug)]
pub struct Delivery {
    pub packet: Packet,
    pub agent: Agent,
}

/// Discrete failure events reported to the owner's error sink.
#[derive(Debug)]
pub enum AgentEvent {
    /// Peer closed the stream cleanly. Not an error; reported once.
    Disconnected { agent: Agent },
    /// Fatal transport failure. Reported once, before the agent starts
    /// redialing; the owner can decide whether to rebind work.
    ConnectionLost { agent: Agent, error: NetError },
    /// The redial budget is exhausted. Terminal: the agent is closed
    /// and must be reconstructed by its owner.
    ReconnectFailed { agent: Agent, error: NetError },
}

/// Replays per-connection registration state after a redial.
///
/// A new connection generation starts with a blank slate on the server;
/// whatever capabilities the owner had registered (can-do functions,
/// client ids) must be announced again before the agent resumes
/// grabbing jobs.
#[async_trait]
pub trait CapabilityReplay: Send + Sync {
    async fn replay(&self, agent: &Agent) -> Result<(), NetError>;
}

/// Replay for owners with no registration state, e.g. submit-only
/// clients.
pub struct NoCapabilities;

#[async_trait]
impl CapabilityReplay for NoCapabilities {
    async fn replay(&self, _agent: &Agent) -> Result<(), NetError> {
        Ok(())
    }
}

/// Bounded dispatch queue for decoded frames.
pub fn dispatch_channel(capacity: usize) -> (mpsc::Sender<Delivery>, mpsc::Receiver<Delivery>) {
    mpsc::channel(capacity)
}

/// Unbounded error sink; failure reporting must never block the agent.
pub fn event_channel() -> (
    mpsc::UnboundedSender<AgentEvent>,
    mpsc::UnboundedReceiver<AgentEvent>,
) {
    mpsc::unbounded_channel()
}
