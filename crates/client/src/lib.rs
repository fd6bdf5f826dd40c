// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gearbox-client: response correlation for job-server submitters.
//!
//! A client submits a request, registers a handler under a correlation
//! key (typically the job handle the server assigns), and waits for the
//! read loop to deliver the matching response. [`ResponseTable`] is
//! that rendezvous: a concurrent key-to-handler map whose `get` can
//! wait, with a deadline, for a `put` that has not happened yet.

pub mod response_table;

pub use response_table::ResponseTable;
