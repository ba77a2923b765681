// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::sync::mpsc::error::TryRecvError;
use twc_core::test_support::ts;
use twc_core::Instruction;

fn setup() -> (LogBuffer, mpsc::Receiver<Result<ContainerLog, LogError>>, CancellationToken) {
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    (LogBuffer::spawn(tx, &cancel), rx, cancel)
}

fn log(item: Result<ContainerLog, LogError>) -> (Timestamp, Vec<u8>) {
    match item {
        Ok(ContainerLog::Log { time, bytes }) => (time, bytes),
        other => panic!("expected plain output, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn coalesces_until_quiet() {
    let (buffer, mut rx, _cancel) = setup();
    buffer.append(ts(1), &[b"a", b"b"]).await;
    buffer.append(ts(2), &[b"\n", b"c"]).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    tokio::time::sleep(SOFT_FLUSH + Duration::from_millis(5)).await;
    assert_eq!(log(rx.try_recv().unwrap()), (ts(1), b"ab\nc".to_vec()));
}

#[tokio::test(start_paused = true)]
async fn hard_timer_bounds_latency() {
    let (buffer, mut rx, _cancel) = setup();
    for _ in 0..3 {
        buffer.append(ts(1), &[b"x"]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    tokio::time::sleep(Duration::from_millis(15)).await;
    assert_eq!(log(rx.try_recv().unwrap()).1, b"xxx".to_vec());
}

#[tokio::test(start_paused = true)]
async fn large_output_flushes_immediately() {
    let (buffer, mut rx, _cancel) = setup();
    let chunk = vec![b'z'; FLUSH_SIZE + 1];
    buffer.append(ts(1), &[&chunk]).await;
    assert_eq!(log(rx.try_recv().unwrap()).1.len(), FLUSH_SIZE + 1);
}

#[tokio::test(start_paused = true)]
async fn send_flushes_pending_output_first() {
    let (buffer, mut rx, _cancel) = setup();
    buffer.append(ts(1), &[b"before"]).await;
    let hint = Instruction::new("1", "start", serde_json::Value::Null);
    assert!(buffer.send(Ok(ContainerLog::Hint { time: ts(2), instruction: hint.clone() })).await);

    assert_eq!(log(rx.try_recv().unwrap()).1, b"before".to_vec());
    match rx.try_recv().unwrap() {
        Ok(ContainerLog::Hint { instruction, .. }) => assert_eq!(instruction, hint),
        other => panic!("expected hint, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn nothing_is_delivered_after_cancel() {
    let (buffer, mut rx, cancel) = setup();
    buffer.append(ts(1), &[b"late"]).await;
    cancel.cancel();
    buffer.close().await;
    drop(buffer);
    tokio::time::sleep(HARD_FLUSH * 2).await;
    assert!(rx.recv().await.is_none());
}
