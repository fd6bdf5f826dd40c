//! The idle cycle: no-job puts the agent to sleep, a wake notification
//! produces exactly one new grab.

use gearbox_proto::{Packet, PacketKind};

use crate::prelude::*;

#[tokio::test]
async fn no_job_triggers_pre_sleep_and_silence() {
    let server = FakeServer::bind().await;
    let mut harness = harness(&server.addr(), fast_reconnect(1, 10));
    harness.agent.connect().await.unwrap();
    let mut conn = server.accept().await;

    harness.agent.grab_job().await.unwrap();
    assert_eq!(conn.recv().await.kind, PacketKind::GrabJobUniq);

    conn.send(&Packet::response(PacketKind::NoJob, Vec::new()))
        .await;

    // The agent answers with exactly one pre-sleep, then goes quiet
    // instead of busy-polling.
    assert_eq!(conn.recv().await.kind, PacketKind::PreSleep);
    conn.assert_quiet().await;
}

#[tokio::test]
async fn wake_notification_triggers_exactly_one_grab() {
    let server = FakeServer::bind().await;
    let mut harness = harness(&server.addr(), fast_reconnect(1, 10));
    harness.agent.connect().await.unwrap();
    let mut conn = server.accept().await;

    harness.agent.grab_job().await.unwrap();
    assert_eq!(conn.recv().await.kind, PacketKind::GrabJobUniq);
    conn.send(&Packet::response(PacketKind::NoJob, Vec::new()))
        .await;
    assert_eq!(conn.recv().await.kind, PacketKind::PreSleep);

    conn.send(&Packet::response(PacketKind::Noop, Vec::new()))
        .await;

    assert_eq!(conn.recv().await.kind, PacketKind::GrabJobUniq);
    conn.assert_quiet().await;
}

#[tokio::test]
async fn wake_grab_waits_for_buffered_frames_to_drain() {
    let server = FakeServer::bind().await;
    let mut harness = harness(&server.addr(), fast_reconnect(1, 10));
    harness.agent.connect().await.unwrap();
    let mut conn = server.accept().await;

    // Wake notification and a job assignment land in one segment. The
    // grab may only go out after the whole buffer is drained, so the
    // job must reach the consumer before the server sees the grab.
    let job = Packet::response(PacketKind::JobAssignUniq, b"h:9\0u\0echo\0x".to_vec());
    let mut wire = gearbox_proto::encode(&Packet::response(PacketKind::Noop, Vec::new()));
    wire.extend_from_slice(&gearbox_proto::encode(&job));
    conn.send_raw(&wire).await;

    assert_eq!(harness.next_packet().await, job);
    assert_eq!(conn.recv().await.kind, PacketKind::GrabJobUniq);
    conn.assert_quiet().await;
}

#[tokio::test]
async fn liveness_frames_are_not_dispatched_to_the_consumer() {
    let server = FakeServer::bind().await;
    let mut harness = harness(&server.addr(), fast_reconnect(1, 10));
    harness.agent.connect().await.unwrap();
    let mut conn = server.accept().await;

    conn.send(&Packet::response(PacketKind::NoJob, Vec::new()))
        .await;
    assert_eq!(conn.recv().await.kind, PacketKind::PreSleep);
    conn.send(&Packet::response(PacketKind::Noop, Vec::new()))
        .await;
    assert_eq!(conn.recv().await.kind, PacketKind::GrabJobUniq);

    // Only a real job should ever reach the dispatch queue.
    let job = Packet::response(PacketKind::JobAssignUniq, b"h:1\0u\0echo\0x".to_vec());
    conn.send(&job).await;
    assert_eq!(harness.next_packet().await, job);
    assert!(harness.deliveries.try_recv().is_err());
}
