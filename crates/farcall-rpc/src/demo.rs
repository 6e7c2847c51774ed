//! Demo targets served by the binary.

use farcall::config::parse_names;
use farcall::{BindingTable, Dispatcher, FarcallError, Fault, MethodTable, Remote};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

/// Stateless greeting service.
#[derive(Default)]
pub struct GreeterBean;

impl Remote for GreeterBean {
    const TYPE_NAME: &'static str = "demo::GreeterBean";
    const INTERFACES: &'static [&'static str] = &["demo.Greeter"];

    fn describe(methods: &mut MethodTable<Self>) {
        methods
            .method("greet", |_: &GreeterBean, (name,): (String,)| {
                Ok(format!("Hello, {}", name))
            })
            .method("greet_all", |_: &GreeterBean, (names,): (Vec<String>,)| {
                Ok(names
                    .into_iter()
                    .map(|name| format!("Hello, {}", name))
                    .collect::<Vec<_>>())
            });
    }
}

/// Stateless shared counter.
#[derive(Default)]
pub struct CounterBean {
    value: AtomicI32,
}

impl Remote for CounterBean {
    const TYPE_NAME: &'static str = "demo::CounterBean";
    const INTERFACES: &'static [&'static str] = &["demo.Counter"];

    fn describe(methods: &mut MethodTable<Self>) {
        methods
            .method("add", |this: &CounterBean, (delta,): (i32,)| {
                Ok(this.value.fetch_add(delta, Ordering::SeqCst) + delta)
            })
            .method("get", |this: &CounterBean, (): ()| Ok(this.value.load(Ordering::SeqCst)))
            .method("reset", |this: &CounterBean, (): ()| {
                this.value.store(0, Ordering::SeqCst);
                Ok(())
            });
    }
}

/// Per-session account holding one value and a history of changes.
#[derive(Default)]
pub struct AccountBean {
    value: AtomicI32,
    history: Mutex<Vec<i32>>,
}

impl AccountBean {
    fn record(&self, value: i32) -> Result<(), Fault> {
        self.history
            .lock()
            .map_err(|_| Fault::new("demo::Poisoned", "history lock poisoned"))?
            .push(value);
        Ok(())
    }
}

impl Remote for AccountBean {
    const TYPE_NAME: &'static str = "demo::AccountBean";
    const INTERFACES: &'static [&'static str] = &["demo.Account"];

    fn describe(methods: &mut MethodTable<Self>) {
        methods
            .method("set_value", |this: &AccountBean, (value,): (i32,)| {
                this.value.store(value, Ordering::SeqCst);
                this.record(value)
            })
            .method("get_value", |this: &AccountBean, (): ()| {
                Ok(this.value.load(Ordering::SeqCst))
            })
            .method("withdraw", |this: &AccountBean, (amount,): (i32,)| {
                let available = this.value.load(Ordering::SeqCst);
                if amount > available {
                    return Err(Fault::new(
                        "demo::Overdrawn",
                        format!("cannot withdraw {} from {}", amount, available),
                    )
                    .with_data(serde_json::json!({ "available": available })));
                }
                let remaining = available - amount;
                this.value.store(remaining, Ordering::SeqCst);
                this.record(remaining)?;
                Ok(remaining)
            })
            .method("history", |this: &AccountBean, (): ()| {
                this.history
                    .lock()
                    .map(|h| h.clone())
                    .map_err(|_| Fault::new("demo::Poisoned", "history lock poisoned"))
            })
            .remover("clear", |this: &AccountBean, (): ()| {
                this.value.store(0, Ordering::SeqCst);
                Ok(())
            });
    }
}

/// Bindings for every demo name.
pub fn bindings() -> BindingTable {
    let mut table = BindingTable::new();
    table
        .bind_shared("svc", GreeterBean)
        .bind_shared("counter", CounterBean::default())
        .bind_with("account", AccountBean::default);
    table
}

/// A dispatcher over the demo bindings with the given names registered.
pub fn dispatcher(stateless_names: &str, stateful_names: &str) -> farcall::Result<Dispatcher> {
    let bindings = bindings();
    let mut requested = parse_names(stateless_names);
    requested.extend(parse_names(stateful_names));
    if let Some(unbound) = requested.iter().find(|name| !bindings.contains(name)) {
        return Err(FarcallError::Config {
            message: format!("no demo target is bound as '{}'", unbound),
        });
    }

    let dispatcher = Dispatcher::new(Arc::new(bindings));
    dispatcher.register_stateless_names(stateless_names)?;
    dispatcher.register_stateful_names(stateful_names)?;
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use farcall::{MethodCall, Params, Signature};
    use serde_json::json;

    fn call<P: Params>(method: &str, args: P) -> MethodCall {
        MethodCall::new(method, Signature::encode(&P::param_types()), args.into_values().unwrap())
    }

    #[test]
    fn test_demo_dispatcher() {
        let dispatcher = dispatcher("svc,counter", "account").unwrap();
        dispatcher.lookup(Some("demo.Greeter"), "svc").unwrap();

        let greeting = dispatcher
            .invoke_stateless("svc", call("greet_all", (vec!["Ann".to_string(), "Bo".to_string()],)))
            .unwrap();
        assert_eq!(greeting, json!(["Hello, Ann", "Hello, Bo"]));
    }

    #[test]
    fn test_account_history() {
        let dispatcher = dispatcher("", "account").unwrap();
        let id = dispatcher
            .lookup(Some("demo.Account"), "account")
            .unwrap()
            .session_id()
            .unwrap();

        dispatcher.invoke_stateful(id, call("set_value", (10,))).unwrap();
        dispatcher.invoke_stateful(id, call("withdraw", (4,))).unwrap();
        assert_eq!(
            dispatcher.invoke_stateful(id, call("history", ())).unwrap(),
            json!([10, 6])
        );
    }

    #[test]
    fn test_conflicting_names_are_rejected() {
        assert!(dispatcher("svc", "svc").is_err());
    }

    #[test]
    fn test_names_without_a_binding_are_rejected() {
        match dispatcher("svc, ledger", "account") {
            Err(FarcallError::Config { message }) => assert!(message.contains("ledger"), "{}", message),
            other => panic!("Expected Config, got: {:?}", other.map(|_| ())),
        }
        assert!(dispatcher("svc", "").is_ok());
    }
}
