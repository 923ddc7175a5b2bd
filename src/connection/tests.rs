//! Connection task tests over in-memory duplex streams.

use super::*;
use crate::test_utils::{frame_for, sample_frame, sample_reading};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

fn context(counters: &Arc<PacketCounters>, read_buffer_size: usize) -> ConnectionContext {
    ConnectionContext {
        id: 1,
        peer: "127.0.0.1:40000".parse().unwrap(),
        read_buffer_size,
        counters: Arc::clone(counters),
    }
}

#[tokio::test]
async fn frames_split_across_writes_are_decoded() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(64);
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_connection(socket, context(&counters, 2048), tx, cancel));

    let frame = sample_frame();
    for piece in frame.chunks(100) {
        device.write_all(piece).await.unwrap();
    }
    drop(device);

    assert_eq!(rx.recv().await.unwrap(), sample_reading());
    let counts = task.await.unwrap();
    assert_eq!(counts, PacketCounts::new(1, 0));
    assert_eq!(counters.totals(), PacketCounts::new(1, 0));
}

#[tokio::test]
async fn back_to_back_frames_in_one_read() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(4096);
    let (tx, mut rx) = mpsc::channel(8);

    let mut stream = Vec::new();
    stream.extend_from_slice(&frame_for(1, 10));
    stream.extend_from_slice(&frame_for(1, 11));
    stream.extend_from_slice(&frame_for(1, 12));
    device.write_all(&stream).await.unwrap();
    drop(device);

    let cancel = CancellationToken::new();
    let counts = run_connection(socket, context(&counters, 2048), tx, cancel).await;
    assert_eq!(counts, PacketCounts::new(3, 0));

    let serials: Vec<u16> = [rx.recv().await, rx.recv().await, rx.recv().await]
        .into_iter()
        .map(|r| r.unwrap().device_id.serial_number)
        .collect();
    assert_eq!(serials, vec![10, 11, 12]);
}

#[tokio::test]
async fn tiny_read_buffer_still_decodes() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(8);

    device.write_all(&sample_frame()).await.unwrap();
    drop(device);

    let counts = run_connection(socket, context(&counters, 7), tx, CancellationToken::new()).await;
    assert_eq!(counts.good, 1);
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn garbage_then_valid_frame_counts_one_bad() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(64);
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_connection(socket, context(&counters, 2048), tx, cancel));

    device.write_all(&[0x00, 0x01, 0x02, 0x03]).await.unwrap();
    device.flush().await.unwrap();
    // Let the garbage arrive as its own read
    tokio::time::sleep(Duration::from_millis(20)).await;
    device.write_all(&[0x09; 10]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    device.write_all(&sample_frame()).await.unwrap();
    drop(device);

    assert_eq!(rx.recv().await.unwrap(), sample_reading());
    let counts = task.await.unwrap();
    assert_eq!(counts, PacketCounts::new(1, 1));
    assert_eq!(counters.totals(), PacketCounts::new(1, 1));
}

#[tokio::test]
async fn disconnect_mid_frame_is_bad() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(8);

    device.write_all(&sample_frame()[..300]).await.unwrap();
    drop(device);

    let cancel = CancellationToken::new();
    let counts = run_connection(socket, context(&counters, 2048), tx, cancel).await;
    assert_eq!(counts, PacketCounts::new(0, 1));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn clean_disconnect_after_frame_is_not_bad() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(1024);
    let (tx, _rx) = mpsc::channel(8);

    device.write_all(&sample_frame()).await.unwrap();
    drop(device);

    let cancel = CancellationToken::new();
    let counts = run_connection(socket, context(&counters, 2048), tx, cancel).await;
    assert_eq!(counts, PacketCounts::new(1, 0));
}

#[tokio::test]
async fn cancellation_finalises_partial_frame() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(1024);
    let (tx, _rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_connection(socket, context(&counters, 2048), tx, cancel.clone()));

    device.write_all(&sample_frame()[..10]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let counts = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(counts, PacketCounts::new(0, 1));
    drop(device);
}

#[tokio::test]
async fn closed_pipeline_stops_the_task() {
    let counters = Arc::new(PacketCounters::new());
    let (mut device, socket) = tokio::io::duplex(4096);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    device.write_all(&sample_frame()).await.unwrap();

    let counts = tokio::time::timeout(
        Duration::from_secs(5),
        run_connection(socket, context(&counters, 2048), tx, CancellationToken::new()),
    )
    .await
    .unwrap();
    assert_eq!(counts.good, 1);
    drop(device);
}
