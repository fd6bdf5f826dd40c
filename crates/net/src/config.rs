// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.

use std::time::Duration;

/// Tunables for one connection agent.
///
/// Defaults match the protocol's conventional client behavior: ten
/// redial attempts spaced 500ms apart, and 8 KiB socket reads.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum dial attempts per reconnection before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between failed dial attempts.
    pub reconnect_delay: Duration,
    /// Size of the scratch buffer for each socket read.
    pub read_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(500),
            read_buffer: 8 * 1024,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
