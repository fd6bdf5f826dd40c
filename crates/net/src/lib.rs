// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gearbox-net: one connection agent per job-server endpoint.
//!
//! An [`Agent`] owns a single TCP connection. A dedicated read-loop
//! task drains frames off the socket and pushes them, tagged with the
//! agent, onto a bounded dispatch queue; backpressure on that queue is
//! the throttle against a producer outpacing its consumer. Writers go
//! through one serialized write path so concurrent callers never
//! interleave partial frames. Fatal transport errors tear the socket
//! down and redial with a bounded, fixed-delay retry budget; disconnect
//! and terminal failures surface as discrete [`AgentEvent`]s on an
//! error sink owned by the caller.

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;

pub use agent::{Agent, ConnState};
pub use config::AgentConfig;
pub use dispatch::{
    dispatch_channel, event_channel, AgentEvent, CapabilityReplay, Delivery, NoCapabilities,
    DEFAULT_QUEUE_CAPACITY,
};
pub use error::NetError;
