//! Invocation proxies and typed interface stubs.

use super::session::Client;
use crate::dispatch::operations;
use crate::registry::{SessionId, TargetHandle};
use crate::signature::{Params, Portable, Signature};
use crate::{FarcallError, Result};

/// Client-side stand-in for one remote target.
///
/// Every call is encoded and sent to the dispatcher; nothing is cached
/// locally. A stateful proxy presents its session id on every call.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: Client,
    handle: TargetHandle,
    interface: String,
}

impl Proxy {
    pub(crate) fn new(client: Client, handle: TargetHandle, interface: impl Into<String>) -> Self {
        Self {
            client,
            handle,
            interface: interface.into(),
        }
    }

    pub fn handle(&self) -> &TargetHandle {
        &self.handle
    }

    /// Interface the target was looked up as. Empty for raw lookups.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.handle.session_id()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Invoke `method` with positional `args` and decode the result as `R`.
    ///
    /// The parameter signature comes from `P` and the return type hint from
    /// `R`. A fault raised by the remote method comes back as
    /// [`FarcallError::Application`] with its kind, message and data intact.
    pub async fn invoke<P, R>(&self, method: &str, args: P) -> Result<R>
    where
        P: Params,
        R: Portable,
    {
        let signature = Signature::encode(&P::param_types());
        let args = args.into_values()?;
        let return_type = R::type_desc().portable_name();

        let value = match &self.handle {
            TargetHandle::Stateless { name } => {
                self.client
                    .call_operation(
                        operations::INVOKE_STATELESS,
                        (
                            name.clone(),
                            self.interface.clone(),
                            return_type,
                            method.to_string(),
                            signature,
                            args,
                        ),
                    )
                    .await?
            }
            TargetHandle::Stateful { session_id, .. } => {
                self.client
                    .call_operation(
                        operations::INVOKE_STATEFUL,
                        (
                            *session_id,
                            self.interface.clone(),
                            return_type,
                            method.to_string(),
                            signature,
                            args,
                        ),
                    )
                    .await?
            }
        };

        R::from_portable(value).map_err(|e| FarcallError::Json {
            message: format!("Unexpected result from {}: {}", method, e),
            source: Some(e),
        })
    }
}

/// A typed stub over a [`Proxy`], usually generated by [`remote_interface!`](crate::remote_interface).
pub trait RemoteInterface: Sized {
    /// Interface name the server checks the bound instance against.
    const NAME: &'static str;

    fn from_proxy(proxy: Proxy) -> Self;

    fn proxy(&self) -> &Proxy;
}

/// Declare a typed client stub for a remote interface.
///
/// Each declared method becomes an `async fn` that forwards its arguments to
/// [`Proxy::invoke`] under the method's own name. A method without a return
/// type returns `()`.
///
/// ```rust
/// farcall::remote_interface! {
///     /// Client side of the greeting service.
///     pub struct GreeterClient as "demo.Greeter" {
///         fn greet(name: String) -> String;
///         fn reset();
///     }
/// }
/// ```
#[macro_export]
macro_rules! remote_interface {
    (@ret) => { () };
    (@ret $ret:ty) => { $ret };
    (
        $(#[$meta:meta])*
        $vis:vis struct $stub:ident as $iface:literal {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident($($arg:ident : $ty:ty),* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $stub {
            proxy: $crate::client::Proxy,
        }

        impl $crate::client::RemoteInterface for $stub {
            const NAME: &'static str = $iface;

            fn from_proxy(proxy: $crate::client::Proxy) -> Self {
                Self { proxy }
            }

            fn proxy(&self) -> &$crate::client::Proxy {
                &self.proxy
            }
        }

        impl $stub {
            $(
                $(#[$method_meta])*
                pub async fn $method(
                    &self,
                    $($arg: $ty),*
                ) -> $crate::Result<$crate::remote_interface!(@ret $($ret)?)> {
                    self.proxy.invoke(stringify!($method), ($($arg,)*)).await
                }
            )*
        }
    };
}
