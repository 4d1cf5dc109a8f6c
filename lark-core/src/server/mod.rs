//! Session manager: at most one active client connection.
//!
//! ## State machine
//!
//! ```text
//! NoConnection ──accept──► Connected(c) ──sequence ends──► NoConnection
//!                              │
//!                          new client
//!                              ▼
//!                        Connected(c')   (c is closed and replaced)
//! ```
//!
//! The current-connection register is the single point of
//! synchronization: the accept loop swaps into it, the read task
//! compare-and-swaps out of it, and writers clone out of it. The
//! register lock is never held across an `.await`.

pub mod connection;

pub use connection::ClientConnection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::{LarkError, Result};
use crate::protocol::{Frame, MessageRegistry};

/// Well-known satellite control port. Configuration defaults to this;
/// nothing in the codec or session logic depends on it.
pub const DEFAULT_PORT: u16 = 6053;

/// Broadcast capacity for inbound frames buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// TCP server owning the accept loop and the current-connection register.
///
/// `Server` is `Send + Sync`; wrap in `Arc` to share between the accept
/// loop, read tasks, and arbitrary senders.
pub struct Server {
    registry: Arc<MessageRegistry>,
    /// The single source of truth for who may be written to.
    connection: Arc<Mutex<Option<Arc<ClientConnection>>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    frame_tx: broadcast::Sender<Frame>,
    state_tx: watch::Sender<bool>,
}

impl Server {
    pub fn new(registry: MessageRegistry) -> Self {
        let (frame_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (state_tx, _) = watch::channel(false);

        Self {
            registry: Arc::new(registry),
            connection: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Mutex::new(None),
            frame_tx,
            state_tx,
        }
    }

    /// Bind `0.0.0.0:port` and spawn the accept loop.
    ///
    /// Returns the bound address (useful with port 0). The loop runs
    /// until [`stop`](Self::stop).
    ///
    /// # Errors
    /// - [`LarkError::AlreadyRunning`] if the server is already started.
    /// - [`LarkError::Io`] if the bind fails.
    pub async fn start(&self, port: u16) -> Result<std::net::SocketAddr> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LarkError::AlreadyRunning);
        }

        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(l) => l,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "server listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let registry = Arc::clone(&self.registry);
        let register = Arc::clone(&self.connection);
        let frame_tx = self.frame_tx.clone();
        let state_tx = self.state_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            info!(%peer, "client connected");
                            Self::attach(stream, &registry, &register, &frame_tx, &state_tx);
                        }
                        Err(e) => {
                            warn!("accept failed: {e}");
                            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                        }
                    },
                }
            }
            debug!("accept loop exited");
        });

        Ok(local_addr)
    }

    /// Install `stream` as the current connection, retiring any previous
    /// one, and spawn the read task that drains its message sequence.
    fn attach(
        stream: TcpStream,
        registry: &Arc<MessageRegistry>,
        register: &Arc<Mutex<Option<Arc<ClientConnection>>>>,
        frame_tx: &broadcast::Sender<Frame>,
        state_tx: &watch::Sender<bool>,
    ) {
        let conn = Arc::new(ClientConnection::new(stream, Arc::clone(registry)));

        let previous = register.lock().replace(Arc::clone(&conn));
        if let Some(prev) = previous {
            debug!(peer = ?prev.peer_addr(), "replacing active connection");
            prev.close();
        }
        let _ = state_tx.send(true);

        let register = Arc::clone(register);
        let frame_tx = frame_tx.clone();
        let state_tx = state_tx.clone();
        tokio::spawn(async move {
            loop {
                match conn.next_frame().await {
                    Ok(Some(frame)) => {
                        // No subscribers is fine; frames are simply dropped.
                        let _ = frame_tx.send(frame);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(peer = ?conn.peer_addr(), "connection failed: {e}");
                        break;
                    }
                }
            }
            conn.close();

            // Revert to NoConnection only if this connection is still the
            // current one — never clobber a newer replacement.
            let mut guard = register.lock();
            if guard.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, &conn)) {
                *guard = None;
                drop(guard);
                let _ = state_tx.send(false);
                info!(peer = ?conn.peer_addr(), "client disconnected");
            }
        });
    }

    /// Send one frame to the current connection.
    ///
    /// A no-op `Ok` when no connection is active — senders don't care
    /// whether a controller happens to be attached right now.
    pub async fn send(&self, frame_type: u32, payload: &[u8]) -> Result<()> {
        let conn = self.connection.lock().clone();
        match conn {
            Some(conn) => conn.send(frame_type, payload).await,
            None => Ok(()),
        }
    }

    /// Whether a client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Watch connection state changes (`true` = connected).
    pub fn subscribe_state(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }

    /// Subscribe to inbound frames from whichever connection is current.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<Frame> {
        self.frame_tx.subscribe()
    }

    /// Close the current connection without stopping the listener.
    pub fn disconnect_current(&self) {
        if let Some(conn) = self.connection.lock().clone() {
            conn.close();
        }
    }

    /// Stop the accept loop and close the active connection. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("server stopping");
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }
        if let Some(conn) = self.connection.lock().take() {
            conn.close();
            let _ = self.state_tx.send(false);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
