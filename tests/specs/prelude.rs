//! Test helpers for behavioral specifications.
//!
//! Provides a scripted fake job server plus a wired-up agent harness.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use gearbox_net::{
    dispatch_channel, event_channel, Agent, AgentConfig, AgentEvent, CapabilityReplay, Delivery,
    NetError, NoCapabilities,
};
use gearbox_proto::{decode, encode, Decoded, Packet, PacketKind};

/// Upper bound for anything a spec waits on.
pub const SPEC_TIMEOUT: Duration = Duration::from_secs(5);

/// Window long enough to catch a stray frame the agent should not send.
pub const QUIET_WINDOW: Duration = Duration::from_millis(150);

/// Fake job server bound to an ephemeral loopback port.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self { listener }
    }

    pub fn addr(&self) -> String {
        self.listener.local_addr().unwrap().to_string()
    }

    pub async fn accept(&self) -> ServerConn {
        let (stream, _) = timeout(SPEC_TIMEOUT, self.listener.accept())
            .await
            .expect("timed out waiting for the worker to dial")
            .unwrap();
        ServerConn {
            stream,
            buf: Vec::new(),
        }
    }

    /// Assert the worker does not dial again within the quiet window.
    pub async fn assert_no_redial(&self) {
        let result = timeout(QUIET_WINDOW, self.listener.accept()).await;
        assert!(result.is_err(), "unexpected redial from the worker");
    }
}

/// One accepted connection on the fake server.
pub struct ServerConn {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl ServerConn {
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, packet: &Packet) {
        self.stream.write_all(&encode(packet)).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Read the next request frame from the worker.
    pub async fn recv(&mut self) -> Packet {
        loop {
            if let Decoded::Frame { packet, consumed } = decode(&self.buf).unwrap() {
                self.buf.drain(..consumed);
                return packet;
            }
            let mut chunk = [0u8; 1024];
            let n = timeout(SPEC_TIMEOUT, self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for a frame from the worker")
                .unwrap();
            assert!(n > 0, "worker closed the connection mid-recv");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Assert no frame arrives from the worker within the quiet window.
    pub async fn assert_quiet(&mut self) {
        if let Decoded::Frame { packet, .. } = decode(&self.buf).unwrap() {
            panic!("expected quiet worker, had {:?} buffered", packet);
        }
        let mut chunk = [0u8; 1024];
        match timeout(QUIET_WINDOW, self.stream.read(&mut chunk)).await {
            Err(_) => {}
            Ok(Ok(0)) => {}
            Ok(Ok(n)) => {
                self.buf.extend_from_slice(&chunk[..n]);
                if let Decoded::Frame { packet, .. } = decode(&self.buf).unwrap() {
                    panic!("expected quiet worker, got {:?}", packet);
                }
            }
            Ok(Err(err)) => panic!("read error while expecting quiet: {}", err),
        }
    }

    /// Close this connection cleanly (FIN, zero-byte read on the peer).
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Agent wired to fresh dispatch and event channels.
pub struct Harness {
    pub agent: Agent,
    pub deliveries: mpsc::Receiver<Delivery>,
    pub events: mpsc::UnboundedReceiver<AgentEvent>,
}

pub fn harness(addr: &str, config: AgentConfig) -> Harness {
    harness_with_replay(addr, config, Arc::new(NoCapabilities))
}

pub fn harness_with_replay(
    addr: &str,
    config: AgentConfig,
    replay: Arc<dyn CapabilityReplay>,
) -> Harness {
    let (dispatch, deliveries) = dispatch_channel(16);
    let (events, event_rx) = event_channel();
    let agent = Agent::new(addr, config, dispatch, events, replay);
    Harness {
        agent,
        deliveries,
        events: event_rx,
    }
}

impl Harness {
    pub async fn next_packet(&mut self) -> Packet {
        timeout(SPEC_TIMEOUT, self.deliveries.recv())
            .await
            .expect("timed out waiting for a delivery")
            .expect("dispatch queue closed")
            .packet
    }

    pub async fn next_event(&mut self) -> AgentEvent {
        timeout(SPEC_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an agent event")
            .expect("event sink closed")
    }

    /// Assert no event surfaces within the quiet window.
    pub async fn assert_no_event(&mut self) {
        let result = timeout(QUIET_WINDOW, self.events.recv()).await;
        assert!(result.is_err(), "unexpected event: {:?}", result);
    }
}

/// Reconnect policy shrunk for fast specs.
pub fn fast_reconnect(attempts: u32, delay_ms: u64) -> AgentConfig {
    AgentConfig {
        reconnect_attempts: attempts,
        reconnect_delay: Duration::from_millis(delay_ms),
        ..AgentConfig::default()
    }
}

/// Capability replay that registers one can-do function and counts how
/// often it ran.
pub struct RecordingReplay {
    pub function: &'static str,
    pub calls: AtomicUsize,
}

impl RecordingReplay {
    pub fn new(function: &'static str) -> Arc<Self> {
        Arc::new(Self {
            function,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityReplay for RecordingReplay {
    async fn replay(&self, agent: &Agent) -> Result<(), NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        agent
            .write(&Packet::request(
                PacketKind::CanDo,
                self.function.as_bytes().to_vec(),
            ))
            .await
    }
}
