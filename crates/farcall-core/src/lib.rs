//! Farcall - remote method dispatch through a single server-side endpoint.
//!
//! A client never talks to target objects directly. Every call goes to a
//! [`Dispatcher`] which resolves the target instance by name or session id,
//! finds the method from its portable signature and invokes it:
//!
//! - [`signature`]: portable parameter type names and method resolution
//! - [`reflection`]: per-type method tables, built once and cached
//! - [`registry`]: stateless and stateful instance bookkeeping
//! - [`dispatch`]: the dispatcher and its named operations
//! - [`client`]: session handles, proxies and typed stubs
//! - [`transport`] and [`ipc`]: framed TCP, HTTP and in-process transports
//!
//! # Example
//!
//! ```rust
//! use farcall::{BindingTable, Client, Dispatcher, EndpointTable, LocalConnector, MethodTable, Remote};
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! impl Remote for Greeter {
//!     const TYPE_NAME: &'static str = "demo::Greeter";
//!     const INTERFACES: &'static [&'static str] = &["demo.Greeter"];
//!
//!     fn describe(methods: &mut MethodTable<Self>) {
//!         methods.method("greet", |_: &Greeter, (name,): (String,)| Ok(format!("Hello, {}", name)));
//!     }
//! }
//!
//! farcall::remote_interface! {
//!     struct GreeterClient as "demo.Greeter" {
//!         fn greet(name: String) -> String;
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> farcall::Result<()> {
//! let mut bindings = BindingTable::new();
//! bindings.bind_shared("svc", Greeter);
//! let dispatcher = Dispatcher::new(Arc::new(bindings));
//! dispatcher.register_stateless_names("svc")?;
//!
//! let server = Arc::new(EndpointTable::new().with_endpoint("farcall:name=demo", dispatcher));
//! let client = Client::new("farcall:name=demo", Arc::new(LocalConnector::new(server)));
//!
//! let greeter: GreeterClient = client.lookup("svc").await?;
//! assert_eq!(greeter.greet("Ann".to_string()).await?, "Hello, Ann");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod reflection;
pub mod registry;
pub mod signature;
pub mod transport;

// Re-export commonly used types
pub use client::{Client, ClientFactory, Proxy, RemoteInterface};
pub use dispatch::{Dispatcher, EndpointTable, Invocation, MethodCall, OperationDispatch};
pub use error::{FarcallError, Fault, Result, WireFailure};
pub use ipc::{IpcServer, IpcServerHandle};
pub use reflection::{Instance, MethodTable, Remote};
pub use registry::{
    Binder, BindingTable, InstanceRegistry, SessionId, SessionIdStrategy, TargetHandle, TargetKind,
};
pub use signature::{MethodDescriptor, Params, Portable, Signature, TypeDesc};
pub use transport::{connector_for_url, Connection, Connector, HttpConnector, LocalConnector, TcpConnector};
