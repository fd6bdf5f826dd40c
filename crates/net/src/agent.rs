// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent owning one TCP connection to a job server.
//!
//! One spawned read-loop task per connection generation owns the read
//! half of the socket; the write half sits behind an async mutex so
//! concurrent writers serialize whole frames. The read loop also runs
//! the liveness cycle: a no-job response puts the connection to sleep
//! with a pre-sleep request, and a wake notification resumes grabbing
//! once the buffered frames are drained.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use gearbox_proto::{decode, encode, Decoded, Packet, PacketKind};

use crate::config::AgentConfig;
use crate::dispatch::{AgentEvent, CapabilityReplay, Delivery};
use crate::error::NetError;

/// Connection lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connected,
    Reconnecting,
    Closed,
}

struct AgentInner {
    addr: String,
    config: AgentConfig,
    state: Mutex<ConnState>,
    /// Write half of the current socket. The async mutex is the single
    /// serialized write path; it also serializes connect/close/redial
    /// so only one task swaps the socket at a time.
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    dispatch: mpsc::Sender<Delivery>,
    events: mpsc::UnboundedSender<AgentEvent>,
    replay: Arc<dyn CapabilityReplay>,
    shutdown: Notify,
    /// Bumped on every (re)connect; a read loop whose generation falls
    /// behind exits instead of racing the loop that replaced it.
    generation: AtomicU64,
}

/// Handle to one job-server connection. Cheap to clone.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(
        addr: impl Into<String>,
        config: AgentConfig,
        dispatch: mpsc::Sender<Delivery>,
        events: mpsc::UnboundedSender<AgentEvent>,
        replay: Arc<dyn CapabilityReplay>,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                addr: addr.into(),
                config,
                state: Mutex::new(ConnState::Disconnected),
                writer: tokio::sync::Mutex::new(None),
                dispatch,
                events,
                replay,
                shutdown: Notify::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Endpoint address this agent dials.
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub fn state(&self) -> ConnState {
        *self.inner.state.lock()
    }

    /// Dial the endpoint and start the read loop.
    ///
    /// On failure the error surfaces to the caller and the agent stays
    /// `Disconnected`. Calling `connect` on an already-connected agent
    /// is a no-op.
    pub async fn connect(&self) -> Result<(), NetError> {
        let mut writer = self.inner.writer.lock().await;
        match self.state() {
            ConnState::Closed => return Err(NetError::Closed),
            ConnState::Connected | ConnState::Reconnecting => return Ok(()),
            ConnState::Disconnected => {}
        }

        let stream = TcpStream::connect(self.inner.addr.as_str()).await?;
        let (read_half, write_half) = stream.into_split();
        *writer = Some(write_half);
        *self.inner.state.lock() = ConnState::Connected;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(addr = %self.inner.addr, generation, "connected to job server");

        let agent = self.clone();
        tokio::spawn(async move { agent.read_loop(read_half, generation).await });
        Ok(())
    }

    /// Encode and write one packet, serialized with all other writers.
    ///
    /// `write_all` loops over short writes, so either the whole frame
    /// reaches the socket or an error surfaces.
    pub async fn write(&self, packet: &Packet) -> Result<(), NetError> {
        if self.state() == ConnState::Closed {
            return Err(NetError::Closed);
        }
        let frame = encode(packet);
        let mut writer = self.inner.writer.lock().await;
        let stream = writer.as_mut().ok_or(NetError::NotConnected)?;
        stream.write_all(&frame).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Ask the server for the next available job.
    pub async fn grab_job(&self) -> Result<(), NetError> {
        debug!(addr = %self.inner.addr, "requesting next job");
        self.write(&Packet::request(PacketKind::GrabJobUniq, Vec::new()))
            .await
    }

    /// Tell the server this connection is idle and wants a wake
    /// notification when work appears.
    pub async fn pre_sleep(&self) -> Result<(), NetError> {
        debug!(addr = %self.inner.addr, "going idle until woken");
        self.write(&Packet::request(PacketKind::PreSleep, Vec::new()))
            .await
    }

    /// Close the connection and mark the agent terminal.
    ///
    /// Idempotent; the socket is released exactly once and the read
    /// loop exits. Every operation after this returns
    /// [`NetError::Closed`].
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnState::Closed {
                return;
            }
            *state = ConnState::Closed;
        }
        info!(addr = %self.inner.addr, "closing agent");
        self.inner.shutdown.notify_waiters();
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Redial after a fatal failure and restart the read loop as a new
    /// generation.
    ///
    /// Dials up to the configured attempt budget with a fixed delay
    /// between attempts. On success the registered capabilities are
    /// replayed and one grab is issued, so the new connection picks up
    /// where the old one left off. Exhausting the budget is terminal:
    /// the agent closes and must be reconstructed by its owner.
    pub async fn reconnect(&self) -> Result<(), NetError> {
        if self.state() == ConnState::Closed {
            return Err(NetError::Closed);
        }
        match self.redial().await {
            Ok(read_half) => {
                if let Err(err) = self.resume().await {
                    *self.inner.state.lock() = ConnState::Closed;
                    return Err(err);
                }
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let agent = self.clone();
                tokio::spawn(async move { agent.read_loop(read_half, generation).await });
                Ok(())
            }
            Err(err) => {
                *self.inner.state.lock() = ConnState::Closed;
                Err(err)
            }
        }
    }

    /// Read loop for one connection generation.
    ///
    /// Blocks on the socket, drains every complete frame out of the
    /// accumulation buffer, then reads again. Exits on close, clean
    /// end-of-stream, or after a failed recovery.
    async fn read_loop(self, mut reader: OwnedReadHalf, generation: u64) {
        let mut buf: Vec<u8> = Vec::with_capacity(self.inner.config.read_buffer);
        let mut chunk = vec![0u8; self.inner.config.read_buffer];
        // Liveness state: `sleeping` is set once a pre-sleep went out,
        // `grab_pending` once a wake notification arrived.
        let mut sleeping = false;
        let mut grab_pending = false;

        loop {
            if self.state() == ConnState::Closed
                || self.inner.generation.load(Ordering::SeqCst) != generation
            {
                break;
            }

            let read = tokio::select! {
                _ = self.inner.shutdown.notified() => break,
                read = reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    // Peer closed the stream cleanly. A disconnect, not
                    // an error; report once and exit.
                    if self.state() == ConnState::Closed {
                        break;
                    }
                    info!(addr = %self.inner.addr, generation, "job server closed the connection");
                    *self.inner.state.lock() = ConnState::Disconnected;
                    self.send_event(AgentEvent::Disconnected {
                        agent: self.clone(),
                    });
                    break;
                }
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    match self
                        .drain_frames(&mut buf, &mut sleeping, &mut grab_pending)
                        .await
                    {
                        Ok(()) => {}
                        Err(NetError::DispatchClosed) => {
                            warn!(addr = %self.inner.addr, "dispatch queue closed, shutting down agent");
                            self.close().await;
                            break;
                        }
                        Err(err) => match self.recover(err).await {
                            Some(new_reader) => {
                                reader = new_reader;
                                buf.clear();
                                sleeping = false;
                                grab_pending = false;
                            }
                            None => break,
                        },
                    }
                }
                Err(err) if is_transient(&err) => {
                    warn!(addr = %self.inner.addr, error = %err, "transient read error, retrying");
                }
                Err(err) => match self.recover(NetError::Io(err)).await {
                    Some(new_reader) => {
                        reader = new_reader;
                        buf.clear();
                        sleeping = false;
                        grab_pending = false;
                    }
                    None => break,
                },
            }
        }
        debug!(addr = %self.inner.addr, generation, "read loop exiting");
    }

    /// Drain every complete frame out of `buf`, then act on liveness.
    ///
    /// The deferred grab honors the protocol's idle cycle: a wake
    /// notification only turns into a grab once the incoming buffer
    /// holds no further complete frame.
    async fn drain_frames(
        &self,
        buf: &mut Vec<u8>,
        sleeping: &mut bool,
        grab_pending: &mut bool,
    ) -> Result<(), NetError> {
        loop {
            match decode(buf)? {
                Decoded::Frame { packet, consumed } => {
                    buf.drain(..consumed);
                    self.handle_packet(packet, sleeping, grab_pending).await?;
                }
                Decoded::Partial => break,
            }
        }
        if *grab_pending {
            *grab_pending = false;
            self.grab_job().await?;
        }
        Ok(())
    }

    async fn handle_packet(
        &self,
        packet: Packet,
        sleeping: &mut bool,
        grab_pending: &mut bool,
    ) -> Result<(), NetError> {
        match packet.kind {
            PacketKind::NoJob => {
                debug!(addr = %self.inner.addr, "no job available");
                *sleeping = true;
                *grab_pending = false;
                self.pre_sleep().await?;
            }
            PacketKind::Noop => {
                if *sleeping {
                    debug!(addr = %self.inner.addr, "woken by job server");
                } else {
                    debug!(addr = %self.inner.addr, "wake notification while active");
                }
                *sleeping = false;
                *grab_pending = true;
            }
            _ => {
                self.inner
                    .dispatch
                    .send(Delivery {
                        packet,
                        agent: self.clone(),
                    })
                    .await
                    .map_err(|_| NetError::DispatchClosed)?;
            }
        }
        Ok(())
    }

    /// Tear down after a fatal error and try to redial in place.
    ///
    /// Returns the read half of the replacement socket for the calling
    /// read loop to continue with, or `None` when the agent is done.
    /// The failure is reported upstream exactly once, not once per
    /// dial attempt.
    async fn recover(&self, error: NetError) -> Option<OwnedReadHalf> {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnState::Closed {
                return None;
            }
            *state = ConnState::Reconnecting;
        }
        warn!(addr = %self.inner.addr, error = %error, "connection failed, reconnecting");
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.send_event(AgentEvent::ConnectionLost {
            agent: self.clone(),
            error,
        });

        match self.redial().await {
            Ok(read_half) => match self.resume().await {
                Ok(()) => Some(read_half),
                Err(err) => {
                    self.fail(err).await;
                    None
                }
            },
            // Closed mid-redial by the owner; nothing left to report.
            Err(NetError::Closed) => None,
            Err(err) => {
                self.fail(err).await;
                None
            }
        }
    }

    /// Dial with the configured bounded retry budget.
    ///
    /// Installs the new write half on success and returns the read
    /// half; the caller decides which read loop consumes it.
    async fn redial(&self) -> Result<OwnedReadHalf, NetError> {
        *self.inner.state.lock() = ConnState::Reconnecting;
        let attempts = self.inner.config.reconnect_attempts;
        for attempt in 1..=attempts {
            if self.state() == ConnState::Closed {
                return Err(NetError::Closed);
            }
            match TcpStream::connect(self.inner.addr.as_str()).await {
                Ok(stream) => {
                    info!(addr = %self.inner.addr, attempt, "redialed job server");
                    let (read_half, write_half) = stream.into_split();
                    *self.inner.writer.lock().await = Some(write_half);
                    *self.inner.state.lock() = ConnState::Connected;
                    return Ok(read_half);
                }
                Err(err) => {
                    warn!(addr = %self.inner.addr, attempt, attempts, error = %err, "redial failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.inner.config.reconnect_delay).await;
                    }
                }
            }
        }
        Err(NetError::ReconnectExhausted { attempts })
    }

    /// Bring a fresh connection generation up to speed: replay the
    /// owner's registrations, then ask for work.
    async fn resume(&self) -> Result<(), NetError> {
        self.inner.replay.replay(self).await?;
        self.grab_job().await
    }

    /// Terminal failure: report once and close.
    async fn fail(&self, error: NetError) {
        warn!(addr = %self.inner.addr, error = %error, "giving up on job server");
        *self.inner.state.lock() = ConnState::Closed;
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.send_event(AgentEvent::ReconnectFailed {
            agent: self.clone(),
            error,
        });
    }

    fn send_event(&self, event: AgentEvent) {
        // The owner may have dropped its receiver during shutdown.
        let _ = self.inner.events.send(event);
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("addr", &self.inner.addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Errors worth retrying the read for, without tearing the connection
/// down.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
