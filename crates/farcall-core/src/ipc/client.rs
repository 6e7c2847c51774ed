//! Framed TCP client.
//!
//! # Thread Safety
//!
//! The client uses a tokio `Mutex` to serialize access to the TCP stream,
//! so one request/response exchange completes before the next starts.
//!
//! A call abandoned between writing its request and reading its response
//! leaves that response unread on the stream. The connection is then marked
//! broken and every later call fails with [`FarcallError::Transport`], so the
//! owner reconnects instead of reading another call's reply.

use super::protocol::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::config::IpcConfig;
use crate::{FarcallError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Client side of one framed TCP connection.
#[derive(Debug)]
pub struct IpcClient {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
    next_id: AtomicU64,
    broken: AtomicBool,
    /// Address as given to [`IpcClient::connect`] (for error reporting).
    pub target: String,
}

impl IpcClient {
    /// Connect to `host:port`.
    ///
    /// Gives up after [`IpcConfig::CONNECT_TIMEOUT`]; failures are
    /// [`FarcallError::Transport`].
    pub async fn connect(target: &str) -> Result<Self> {
        let stream = tokio::time::timeout(IpcConfig::CONNECT_TIMEOUT, TcpStream::connect(target))
            .await
            .map_err(|_| FarcallError::transport(target, "connect timed out"))?
            .map_err(|e| FarcallError::transport(target, e))?;
        let addr = stream
            .peer_addr()
            .map_err(|e| FarcallError::transport(target, e))?;

        debug!("IPC client connected to {} ({})", target, addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
            next_id: AtomicU64::new(1),
            broken: AtomicBool::new(false),
            target: target.to_string(),
        })
    }

    /// Call a JSON-RPC method on the server.
    ///
    /// A broken connection is [`FarcallError::Transport`]; an error response
    /// is rebuilt with [`FarcallError::from_rpc_error`]. A response carrying
    /// another request's id also breaks the connection.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(method, params, id);
        let request_bytes = serde_json::to_vec(&request)?;

        let mut stream = self.stream.lock().await;
        if self.is_broken() {
            return Err(self.lost("connection broken by an abandoned call"));
        }
        let (mut reader, mut writer) = stream.split();

        // Cleared only once the matching response has been read.
        let mut in_flight = InFlight::new(&self.broken);

        write_frame(&mut writer, &request_bytes)
            .await
            .map_err(|e| self.lost(e))?;

        let response_bytes = read_frame(&mut reader)
            .await
            .map_err(|e| self.lost(e))?
            .ok_or_else(|| self.lost("connection closed by server"))?;

        let response: RpcResponse = serde_json::from_slice(&response_bytes)
            .map_err(|e| self.lost(format!("unreadable response: {}", e)))?;

        if response.id != Some(serde_json::Value::from(id)) {
            return Err(self.lost(format!(
                "response id {:?} does not match request id {}",
                response.id, id
            )));
        }

        in_flight.complete();
        response.into_result()
    }

    /// True once the stream can no longer be trusted to line up responses
    /// with requests.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Shut down the write half of the connection.
    pub async fn close(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        stream.shutdown().await?;
        Ok(())
    }

    /// Get the address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn lost(&self, reason: impl std::fmt::Display) -> FarcallError {
        self.broken.store(true, Ordering::Release);
        FarcallError::transport(&self.target, reason)
    }
}

/// Marks the connection broken unless the exchange runs to completion.
struct InFlight<'a> {
    broken: &'a AtomicBool,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(broken: &'a AtomicBool) -> Self {
        Self { broken, done: false }
    }

    fn complete(&mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!("IPC call abandoned mid-exchange; marking connection broken");
            self.broken.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::OperationDispatch;
    use crate::error::Fault;
    use crate::ipc::server::IpcServer;
    use std::sync::Arc;

    struct TestDispatch;

    #[async_trait::async_trait]
    impl OperationDispatch for TestDispatch {
        async fn dispatch(&self, operation: &str, params: serde_json::Value) -> Result<serde_json::Value> {
            match operation {
                "ping" => Ok(serde_json::json!("pong")),
                "add" => {
                    let a = params["a"].as_i64().unwrap_or(0);
                    let b = params["b"].as_i64().unwrap_or(0);
                    Ok(serde_json::json!(a + b))
                }
                "fault" => Err(Fault::new("test::Broken", "it broke").into()),
                "slow" => {
                    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                    Ok(serde_json::json!("slow-result"))
                }
                "fast" => Ok(serde_json::json!("fast-result")),
                _ => Err(FarcallError::UnknownOperation(operation.to_string())),
            }
        }
    }

    async fn connected() -> (crate::ipc::IpcServerHandle, IpcClient) {
        let handle = IpcServer::start_local(Arc::new(TestDispatch)).await.unwrap();
        let client = IpcClient::connect(&handle.addr().to_string()).await.unwrap();
        (handle, client)
    }

    #[tokio::test]
    async fn test_client_call_success() {
        let (mut handle, client) = connected().await;

        let result = client.call("ping", serde_json::json!({})).await.unwrap();
        assert_eq!(result, serde_json::json!("pong"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_call_with_params() {
        let (mut handle, client) = connected().await;

        let result = client
            .call("add", serde_json::json!({"a": 3, "b": 4}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!(7));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_rebuilds_server_errors() {
        let (mut handle, client) = connected().await;

        let result = client.call("nonexistent", serde_json::json!({})).await;
        assert!(matches!(result, Err(FarcallError::UnknownOperation(op)) if op == "nonexistent"));

        match client.call("fault", serde_json::json!({})).await {
            Err(FarcallError::Application(fault)) => assert!(fault.is("test::Broken")),
            other => panic!("Expected Application, got: {:?}", other),
        }

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_abandoned_call_breaks_connection() {
        let (mut handle, client) = connected().await;

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            client.call("slow", serde_json::json!({})),
        )
        .await;
        assert!(abandoned.is_err(), "slow call should time out");
        assert!(client.is_broken());

        // The slow reply is still queued on the stream; it must not be
        // handed to the next caller.
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        match client.call("fast", serde_json::json!({})).await {
            Err(FarcallError::Transport { .. }) => {}
            other => panic!("Expected Transport, got: {:?}", other),
        }

        let fresh = IpcClient::connect(&handle.addr().to_string()).await.unwrap();
        let result = fresh.call("fast", serde_json::json!({})).await.unwrap();
        assert_eq!(result, serde_json::json!("fast-result"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_mismatched_response_id_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = socket.split();
            while let Ok(Some(_)) = read_frame(&mut reader).await {
                let reply = RpcResponse::success(
                    Some(serde_json::json!(999)),
                    serde_json::json!("someone else's result"),
                );
                let bytes = serde_json::to_vec(&reply).unwrap();
                if write_frame(&mut writer, &bytes).await.is_err() {
                    break;
                }
            }
        });

        let client = IpcClient::connect(&addr.to_string()).await.unwrap();
        match client.call("ping", serde_json::json!({})).await {
            Err(FarcallError::Transport { message, .. }) => {
                assert!(message.contains("does not match"), "{}", message)
            }
            other => panic!("Expected Transport, got: {:?}", other),
        }
        assert!(client.is_broken());
    }

    #[tokio::test]
    async fn test_client_connect_to_dead_server_is_transport_error() {
        let result = IpcClient::connect("127.0.0.1:1").await;

        match result.unwrap_err() {
            FarcallError::Transport { endpoint, .. } => assert_eq!(endpoint, "127.0.0.1:1"),
            other => panic!("Expected Transport, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_detects_server_shutdown() {
        let (mut handle, client) = connected().await;

        let result = client.call("ping", serde_json::json!({})).await;
        assert!(result.is_ok());

        handle.shutdown();

        // Retry until the server is fully closed (up to 1s)
        let mut detected_shutdown = false;
        for _ in 0..20 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if let Err(e) = client.call("ping", serde_json::json!({})).await {
                assert!(matches!(e, FarcallError::Transport { .. }), "{:?}", e);
                detected_shutdown = true;
                break;
            }
        }
        assert!(detected_shutdown, "Client should detect server shutdown");
    }
}
