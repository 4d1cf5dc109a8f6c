//! Single-connection duplex message transport.
//!
//! A `ClientConnection` exclusively owns one `TcpStream`. Reads go
//! through `next_frame` — a lazy, single-consumer message sequence that
//! ends (rather than errors) on graceful close. Writes from any number
//! of tasks are serialized through a mutex so frames never interleave on
//! the wire.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{encode_frame, frame::read_frame, Frame, FrameRead, MessageRegistry};

struct ReadState {
    reader: BufReader<OwnedReadHalf>,
    close_rx: watch::Receiver<bool>,
}

/// One live client connection.
///
/// Lifetime is owned by the [`Server`](crate::server::Server): created on
/// accept, closed on stream error, protocol error, replacement, or
/// shutdown. `close` is idempotent and promptly unblocks any in-flight
/// read or write.
pub struct ClientConnection {
    peer: Option<SocketAddr>,
    registry: Arc<MessageRegistry>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
    reader: Mutex<ReadState>,
    writer: Mutex<OwnedWriteHalf>,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, registry: Arc<MessageRegistry>) -> Self {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (close_tx, close_rx) = watch::channel(false);

        Self {
            peer,
            registry,
            closed: AtomicBool::new(false),
            close_tx,
            reader: Mutex::new(ReadState {
                reader: BufReader::new(read_half),
                close_rx,
            }),
            writer: Mutex::new(write_half),
        }
    }

    /// Remote address, if it was resolvable at accept time.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receive the next message.
    ///
    /// Skipped (unknown-type) frames are retried internally and never
    /// surface. Returns `Ok(None)` when the sequence has ended: remote
    /// hang-up at a frame boundary, or a local [`close`](Self::close) —
    /// including one that races an in-flight read. Any other failure is
    /// surfaced and must end the connection.
    ///
    /// The internal reader lock makes concurrent callers queue; the
    /// session manager's read task is intended to be the only consumer.
    pub async fn next_frame(&self) -> Result<Option<Frame>> {
        let mut state = self.reader.lock().await;
        let ReadState { reader, close_rx } = &mut *state;

        loop {
            tokio::select! {
                _ = close_rx.changed() => return Ok(None),
                read = read_frame(reader, &self.registry) => match read {
                    Ok(Some(FrameRead::Frame(frame))) => return Ok(Some(frame)),
                    Ok(Some(FrameRead::Skipped { .. })) => continue,
                    Ok(None) => return Ok(None),
                    Err(e) if self.is_closed() => {
                        debug!(peer = ?self.peer, "read failed during teardown (expected): {e}");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                },
            }
        }
    }

    /// Serialize and write one frame atomically.
    ///
    /// "Compose, write, flush" happens under the writer lock, so frames
    /// from concurrent senders are never interleaved. A failure after
    /// `close` has begun is an expected race with teardown and is
    /// swallowed; a failure on an open connection is surfaced.
    pub async fn send(&self, frame_type: u32, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            debug!(peer = ?self.peer, frame_type, "dropping write to closed connection");
            return Ok(());
        }

        let bytes = encode_frame(frame_type, payload);
        let mut close_rx = self.close_tx.subscribe();
        let mut writer = self.writer.lock().await;

        let write = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };

        tokio::select! {
            _ = close_rx.changed() => {
                debug!(peer = ?self.peer, frame_type, "write abandoned during teardown");
                Ok(())
            }
            result = write => match result {
                Ok(()) => Ok(()),
                Err(e) if self.is_closed() => {
                    debug!(peer = ?self.peer, "write failed during teardown (expected): {e}");
                    Ok(())
                }
                Err(e) => {
                    warn!(peer = ?self.peer, "write failed on open connection: {e}");
                    Err(e.into())
                }
            },
        }
    }

    /// Begin teardown. Idempotent and safe to call from any task; only
    /// the first caller performs the close, guarded by a compare-and-set.
    /// Blocked reads and writes observe the close signal and return.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!(peer = ?self.peer, "closing connection");
            let _ = self.close_tx.send(true);
        }
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    async fn connected_pair(registry: Arc<MessageRegistry>) -> (ClientConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        (ClientConnection::new(server_side, registry), client)
    }

    #[tokio::test]
    async fn delivers_frames_and_ends_on_remote_hangup() {
        let registry = Arc::new([5u32].into_iter().collect::<MessageRegistry>());
        let (conn, mut client) = connected_pair(registry).await;

        client.write_all(&encode_frame(5, b"hello")).await.unwrap();
        client.shutdown().await.unwrap();

        let frame = conn.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.frame_type, 5);
        assert_eq!(frame.payload, b"hello");
        assert!(conn.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_unblocks_pending_read() {
        let registry = Arc::new(MessageRegistry::new());
        let (conn, _client) = connected_pair(registry).await;
        let conn = Arc::new(conn);

        let reader = Arc::clone(&conn);
        let pending = tokio::spawn(async move { reader.next_frame().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        conn.close();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), pending)
            .await
            .expect("read did not unblock after close")
            .unwrap();
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn send_after_close_is_swallowed() {
        let registry = Arc::new(MessageRegistry::new());
        let (conn, _client) = connected_pair(registry).await;
        conn.close();
        conn.close(); // idempotent
        assert!(conn.send(1, b"late").await.is_ok());
    }

    #[tokio::test]
    async fn protocol_error_surfaces_on_open_connection() {
        let registry = Arc::new(MessageRegistry::new());
        let (conn, mut client) = connected_pair(registry).await;

        client.write_all(&[0x09]).await.unwrap();
        let err = conn.next_frame().await.unwrap_err();
        assert!(matches!(err, crate::LarkError::UnsupportedIndicator(0x09)));
    }
}
