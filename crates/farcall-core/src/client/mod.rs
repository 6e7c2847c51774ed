//! Client side: session handles, proxies and typed stubs.
//!
//! A [`Client`] talks to one dispatcher endpoint. Looking up a name returns a
//! [`Proxy`] bound to the target the server resolved; typed stubs declared
//! with [`remote_interface!`](crate::remote_interface) wrap a proxy and turn
//! each interface method into one remote call.

mod factory;
mod proxy;
mod session;

pub use factory::ClientFactory;
pub use proxy::{Proxy, RemoteInterface};
pub use session::Client;
