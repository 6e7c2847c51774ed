//! Framed TCP transport.
//!
//! Length-prefixed JSON-RPC 2.0 over plain TCP connections.
//!
//! # Architecture
//!
//! - **Server**: accepts connections and hands each request to an
//!   [`OperationDispatch`](crate::dispatch::OperationDispatch)
//! - **Client**: one connection, one request in flight at a time
//! - **Protocol**: shared framing and JSON-RPC types, also used by the HTTP
//!   transport

pub mod client;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use protocol::{respond, RpcError, RpcRequest, RpcResponse};
pub use server::{IpcServer, IpcServerHandle};
