//! Integration tests for the session manager over real TCP sockets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;

use lark_core::{encode_frame, Frame, LarkError, MessageRegistry, Server};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn registry() -> MessageRegistry {
    [1u32, 12, 90].into_iter().collect()
}

async fn recv_frame(rx: &mut broadcast::Receiver<Frame>) -> Frame {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("frame channel closed")
}

async fn wait_for_state(rx: &mut tokio::sync::watch::Receiver<bool>, want: bool) {
    timeout(RECV_TIMEOUT, rx.wait_for(|&connected| connected == want))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
}

#[tokio::test]
async fn inbound_frames_are_republished() {
    let server = Server::new(registry());
    let addr = server.start(0).await.unwrap();
    let mut frames = server.subscribe_frames();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&encode_frame(12, b"ping")).await.unwrap();

    let frame = recv_frame(&mut frames).await;
    assert_eq!(frame.frame_type, 12);
    assert_eq!(frame.payload, b"ping");

    server.stop();
}

#[tokio::test]
async fn unknown_type_frame_does_not_desynchronize() {
    let server = Server::new(registry());
    let addr = server.start(0).await.unwrap();
    let mut frames = server.subscribe_frames();

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut bytes = encode_frame(7777, b"from the future");
    bytes.extend(encode_frame(90, b"known"));
    client.write_all(&bytes).await.unwrap();

    // Exactly one frame comes out: the known one.
    let frame = recv_frame(&mut frames).await;
    assert_eq!(frame.frame_type, 90);
    assert_eq!(frame.payload, b"known");
    assert!(matches!(
        frames.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    server.stop();
}

#[tokio::test]
async fn new_client_replaces_the_previous_connection() {
    let server = Server::new(registry());
    let addr = server.start(0).await.unwrap();
    let mut state = server.subscribe_state();

    let mut client_a = TcpStream::connect(addr).await.unwrap();
    wait_for_state(&mut state, true).await;

    let mut client_b = TcpStream::connect(addr).await.unwrap();

    // A's socket gets closed by the replacement: it sees EOF.
    let mut buf = [0u8; 1];
    let read = timeout(RECV_TIMEOUT, client_a.read(&mut buf))
        .await
        .expect("old client was not closed")
        .unwrap();
    assert_eq!(read, 0, "old connection should observe EOF");

    // Writes directed at "the current connection" reach only B.
    server.send(1, b"hello-b").await.unwrap();
    let expected = encode_frame(1, b"hello-b");
    let mut got = vec![0u8; expected.len()];
    timeout(RECV_TIMEOUT, client_b.read_exact(&mut got))
        .await
        .expect("new client did not receive the frame")
        .unwrap();
    assert_eq!(got, expected);

    server.stop();
}

#[tokio::test]
async fn send_without_connection_is_a_no_op() {
    let server = Server::new(registry());
    let _addr = server.start(0).await.unwrap();
    assert!(!server.is_connected());
    server.send(1, b"nobody home").await.unwrap();
    server.stop();
}

#[tokio::test]
async fn disconnect_reverts_to_no_connection_and_keeps_listening() {
    let server = Server::new(registry());
    let addr = server.start(0).await.unwrap();
    let mut state = server.subscribe_state();

    let client = TcpStream::connect(addr).await.unwrap();
    wait_for_state(&mut state, true).await;
    drop(client);
    wait_for_state(&mut state, false).await;

    // A later client can still connect.
    let _client2 = TcpStream::connect(addr).await.unwrap();
    wait_for_state(&mut state, true).await;

    server.stop();
}

#[tokio::test]
async fn protocol_violation_tears_the_connection_down() {
    let server = Server::new(registry());
    let addr = server.start(0).await.unwrap();
    let mut state = server.subscribe_state();

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_state(&mut state, true).await;

    // Non-zero indicator: connection must fail, server reverts to idle.
    client.write_all(&[0x42]).await.unwrap();
    wait_for_state(&mut state, false).await;

    server.stop();
}

#[tokio::test]
async fn start_twice_fails_and_stop_is_idempotent() {
    let server = Server::new(registry());
    let _addr = server.start(0).await.unwrap();
    assert!(matches!(
        server.start(0).await,
        Err(LarkError::AlreadyRunning)
    ));

    server.stop();
    server.stop();

    // Restart after stop works.
    let addr = server.start(0).await.unwrap();
    let _client = TcpStream::connect(addr).await.unwrap();
    server.stop();
}
