//! Framed TCP server in front of an [`OperationDispatch`].
//!
//! Accepts connections, reads one JSON-RPC request per frame and writes the
//! response frame before reading the next request. Requests go through
//! [`respond`](super::protocol::respond), the same path the HTTP server uses.
//!
//! # Thread Safety
//!
//! Each connection runs as its own task holding a connection slot; the slot
//! is released when the task ends, however it ends.

use super::protocol::{read_frame, respond, write_frame, RpcRequest, RpcResponse};
use crate::config::IpcConfig;
use crate::dispatch::OperationDispatch;
use crate::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Handle to a running IPC server. Dropping shuts down the server.
pub struct IpcServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl IpcServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `tcp://` URL clients connect to.
    pub fn url(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    /// Shut down the server gracefully.
    ///
    /// Stops accepting new connections and signals all active connection
    /// handlers to close.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }
}

impl Drop for IpcServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// IPC server that listens for client connections.
pub struct IpcServer;

impl IpcServer {
    /// Start the server on `addr`. Port 0 picks a free port.
    ///
    /// Returns a handle that can be used to get the port and shut down the server.
    /// The server runs in background tokio tasks.
    pub async fn start<D: OperationDispatch>(
        dispatch: Arc<D>,
        addr: SocketAddr,
    ) -> Result<IpcServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let port = addr.port();

        info!("IPC server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            dispatch,
            shutdown_rx,
            conn_shutdown_rx,
            active_connections,
        ));

        Ok(IpcServerHandle {
            addr,
            port,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    /// Start the server on an OS-assigned loopback port.
    pub async fn start_local<D: OperationDispatch>(dispatch: Arc<D>) -> Result<IpcServerHandle> {
        Self::start(dispatch, SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    async fn accept_loop<D: OperationDispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
        active_connections: Arc<AtomicUsize>,
    ) {
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("IPC server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("IPC accept error: {}", e);
                        continue;
                    }
                },
            };

            let Some(slot) = ConnectionSlot::acquire(&active_connections) else {
                warn!(
                    "Rejecting IPC connection from {}: at max capacity ({})",
                    peer_addr,
                    IpcConfig::MAX_CONNECTIONS
                );
                continue;
            };

            let session = Session {
                dispatch: dispatch.clone(),
                peer_addr,
                shutdown_rx: conn_shutdown_rx.clone(),
                _slot: slot,
            };
            tokio::spawn(session.run(stream));
        }
    }
}

/// Counts a connection against [`IpcConfig::MAX_CONNECTIONS`] while alive.
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(active: &Arc<AtomicUsize>) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < IpcConfig::MAX_CONNECTIONS).then_some(current + 1)
            })
            .ok()?;
        Some(Self {
            active: active.clone(),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One client connection: requests are answered strictly in arrival order,
/// which is what lets the client pair a response with the request it sent.
struct Session<D> {
    dispatch: Arc<D>,
    peer_addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
    _slot: ConnectionSlot,
}

impl<D: OperationDispatch> Session<D> {
    async fn run(mut self, stream: TcpStream) {
        debug!("IPC connection from {}", self.peer_addr);
        match self.serve(stream).await {
            Ok(served) => debug!(
                "IPC connection {} closed after {} requests",
                self.peer_addr, served
            ),
            Err(e) => debug!("IPC connection {} ended: {}", self.peer_addr, e),
        }
    }

    async fn serve(&mut self, mut stream: TcpStream) -> Result<u64> {
        let (mut reader, mut writer) = stream.split();
        let mut served = 0u64;

        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut reader) => match frame? {
                    Some(frame) => frame,
                    None => return Ok(served),
                },
                _ = self.shutdown_rx.changed() => return Ok(served),
            };

            let response = match serde_json::from_slice::<RpcRequest>(&frame) {
                Ok(request) => respond(&*self.dispatch, request).await,
                Err(e) => RpcResponse::error(None, -32700, format!("Parse error: {}", e)),
            };

            write_frame(&mut writer, &serde_json::to_vec(&response)?).await?;
            served += 1;
        }
    }
}
