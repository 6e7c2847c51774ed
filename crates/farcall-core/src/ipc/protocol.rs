//! Shared JSON-RPC types and framing.
//!
//! The framed TCP transport sends a 4-byte big-endian length prefix followed
//! by a UTF-8 JSON-RPC 2.0 payload:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! The HTTP transport carries the same request and response objects as
//! plain request bodies.

use crate::config::IpcConfig;
use crate::dispatch::OperationDispatch;
use crate::{FarcallError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    pub id: Option<serde_json::Value>,
}

impl RpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(serde_json::Value::Number(id.into())),
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    /// Create an error response for a dispatch error, with its wire form in `data`.
    pub fn failure(id: Option<serde_json::Value>, err: &FarcallError) -> Self {
        let mut response = Self::error(id, err.to_rpc_error_code(), err.to_string());
        if let Some(error) = response.error.as_mut() {
            error.data = err
                .to_wire()
                .and_then(|wire| serde_json::to_value(wire).ok());
        }
        response
    }

    /// The result value, or the error the server reported.
    pub fn into_result(self) -> Result<serde_json::Value> {
        if let Some(err) = self.error {
            return Err(FarcallError::from_rpc_error(err.code, err.message, err.data));
        }
        self.result
            .ok_or_else(|| FarcallError::Other("RPC response missing result".to_string()))
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Answer one request through `dispatch`.
///
/// Shared by the TCP and HTTP servers. A request must be JSON-RPC 2.0 and
/// carry a non-null id: clients pair each response with its request by id,
/// so an anonymous request could never be answered reliably.
pub async fn respond<D>(dispatch: &D, request: RpcRequest) -> RpcResponse
where
    D: OperationDispatch + ?Sized,
{
    if request.jsonrpc != JSONRPC_VERSION {
        return RpcResponse::error(
            request.id,
            -32600,
            "Invalid Request: expected jsonrpc 2.0".to_string(),
        );
    }
    let Some(id) = request.id.filter(|id| !id.is_null()) else {
        return RpcResponse::error(None, -32600, "Invalid Request: missing id".to_string());
    };

    let params = request
        .params
        .unwrap_or(serde_json::Value::Object(Default::default()));
    debug!("RPC call {} (id {})", request.method, id);

    match dispatch.dispatch(&request.method, params).await {
        Ok(result) => RpcResponse::success(Some(id), result),
        Err(e) => {
            if e.is_application() {
                debug!("RPC call {} raised {}", request.method, e);
            } else {
                warn!("RPC error for {}: {}", request.method, e);
            }
            RpcResponse::failure(Some(id), &e)
        }
    }
}

/// Read a length-prefixed frame from an async reader.
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > IpcConfig::MAX_MESSAGE_SIZE {
        return Err(FarcallError::Validation {
            field: "ipc_frame".to_string(),
            message: format!(
                "IPC message size {} exceeds maximum {}",
                len,
                IpcConfig::MAX_MESSAGE_SIZE
            ),
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write a length-prefixed frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > IpcConfig::MAX_MESSAGE_SIZE {
        return Err(FarcallError::Validation {
            field: "ipc_frame".to_string(),
            message: format!(
                "IPC message size {} exceeds maximum {}",
                payload.len(),
                IpcConfig::MAX_MESSAGE_SIZE
            ),
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;

    #[test]
    fn test_request_serialization_roundtrip() {
        let req = RpcRequest::new("lookup", serde_json::json!({"endpoint": "e"}), 1);
        let json = serde_json::to_string(&req).unwrap();
        let parsed: RpcRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.jsonrpc, "2.0");
        assert_eq!(parsed.method, "lookup");
        assert_eq!(parsed.id, Some(serde_json::Value::Number(1.into())));
    }

    #[test]
    fn test_response_success_serialization() {
        let resp = RpcResponse::success(
            Some(serde_json::Value::Number(1.into())),
            serde_json::json!({"kind": "stateless", "name": "svc"}),
        );
        let json = serde_json::to_string(&resp).unwrap();

        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_response_error_serialization() {
        let resp = RpcResponse::error(
            Some(serde_json::Value::Number(1.into())),
            -32603,
            "Internal error".to_string(),
        );
        let json = serde_json::to_string(&resp).unwrap();

        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"error\""));
        assert!(json.contains("-32603"));
    }

    #[test]
    fn test_failure_response_rebuilds_error() {
        let err = FarcallError::Application(Fault::new("demo::Overdrawn", "no funds"));
        let resp = RpcResponse::failure(Some(serde_json::json!(3)), &err);
        assert_eq!(resp.error.as_ref().map(|e| e.code), Some(-32020));

        match resp.into_result() {
            Err(FarcallError::Application(fault)) => assert!(fault.is("demo::Overdrawn")),
            other => panic!("Expected Application, got: {:?}", other),
        }
    }

    #[test]
    fn test_failure_without_wire_form_becomes_remote() {
        let resp = RpcResponse::failure(None, &FarcallError::Other("boom".into()));
        assert!(resp.error.as_ref().unwrap().data.is_none());
        assert!(matches!(
            resp.into_result(),
            Err(FarcallError::Remote { code: -32603, .. })
        ));
    }

    #[tokio::test]
    async fn test_frame_read_write_roundtrip() {
        let payload = b"hello world";
        let mut buf = Vec::new();

        write_frame(&mut buf, payload).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = read_frame(&mut cursor).await.unwrap();

        assert_eq!(read_back, Some(payload.to_vec()));
    }

    #[tokio::test]
    async fn test_frame_read_empty_stream_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_frame_read_oversized_returns_error() {
        let huge_len: u32 = (IpcConfig::MAX_MESSAGE_SIZE + 1) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&huge_len.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FarcallError::Validation { .. })));
    }
}
