use tracing::{debug, trace};

use crate::error::{BusError, Result};
use crate::reply::Reply;
use crate::value::{Arg, FromValue, Value, ValueKind};

/// Which message bus to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusKind {
    #[default]
    System,
    Session,
}

impl BusKind {
    pub fn name(self) -> &'static str {
        match self {
            BusKind::System => "system",
            BusKind::Session => "session",
        }
    }
}

/// Blocking request/response access to one remote object.
///
/// Implementations are bound to a service, object path and interface at
/// construction and block the calling context until the reply arrives.
pub trait ControlBus {
    /// Invoke `method` with positional `args`, decoding the reply as `reply`.
    fn call(&self, method: &str, args: &[Arg], reply: ValueKind) -> Result<Value>;

    /// Read a property of the remote object.
    fn property(&self, name: &str) -> Result<Value>;

    /// Whether the remote object is reachable.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Stand-in for a bus that could not be opened. Every call fails with the
/// original connection error.
#[derive(Debug, Clone)]
pub struct UnavailableBus {
    reason: String,
}

impl UnavailableBus {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ControlBus for UnavailableBus {
    fn call(&self, _method: &str, _args: &[Arg], _reply: ValueKind) -> Result<Value> {
        Err(BusError::Connection(self.reason.clone()))
    }

    fn property(&self, _name: &str) -> Result<Value> {
        Err(BusError::Connection(self.reason.clone()))
    }

    fn is_valid(&self) -> bool {
        false
    }
}

/// Typed call surface over a [`ControlBus`].
pub struct RpcEndpoint {
    bus: Box<dyn ControlBus>,
    path: String,
    interface: String,
}

impl RpcEndpoint {
    pub fn new(
        bus: Box<dyn ControlBus>,
        path: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            path: path.into(),
            interface: interface.into(),
        }
    }

    /// Endpoint whose bus could not be opened.
    pub fn unavailable(
        reason: impl Into<String>,
        path: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self::new(Box::new(UnavailableBus::new(reason)), path, interface)
    }

    /// Blocking call of `method`, narrowing the reply to `T`.
    pub fn call<T: FromValue>(&self, method: &str, args: &[Arg]) -> Reply<T> {
        trace!(
            path = %self.path,
            interface = %self.interface,
            method,
            ?args,
            "bus call"
        );
        let reply = self
            .bus
            .call(method, args, T::KIND)
            .and_then(|value| narrow(method, value));
        if let Err(err) = &reply {
            debug!(method, error = %err, "bus call failed");
        }
        reply.into()
    }

    /// Read property `name`, narrowing it to `T`.
    pub fn property<T: FromValue>(&self, name: &str) -> Reply<T> {
        let reply = self
            .bus
            .property(name)
            .and_then(|value| narrow(name, value));
        if let Err(err) = &reply {
            debug!(property = name, error = %err, "property read failed");
        }
        reply.into()
    }

    pub fn is_valid(&self) -> bool {
        self.bus.is_valid()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl std::fmt::Debug for RpcEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEndpoint")
            .field("path", &self.path)
            .field("interface", &self.interface)
            .finish()
    }
}

fn narrow<T: FromValue>(name: &str, value: Value) -> Result<T> {
    T::from_value(value).ok_or_else(|| BusError::ReplyType {
        method: name.to_string(),
        expected: T::KIND,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::value::DataRange;

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<(String, Vec<Arg>, ValueKind)>>>,
    }

    impl ControlBus for Recorder {
        fn call(&self, method: &str, args: &[Arg], reply: ValueKind) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), args.to_vec(), reply));
            match reply {
                ValueKind::Bool => Ok(Value::Bool(true)),
                ValueKind::Range => Ok(Value::Range(DataRange::new(-1.0, 1.0, 0.1))),
                _ => Ok(Value::Unit),
            }
        }

        fn property(&self, name: &str) -> Result<Value> {
            match name {
                "interval" => Ok(Value::Int(100)),
                "description" => Ok(Value::Str("accelerometer".to_string())),
                _ => Err(BusError::Remote {
                    name: "org.freedesktop.DBus.Error.UnknownProperty".to_string(),
                    message: name.to_string(),
                }),
            }
        }
    }

    #[test]
    fn call_passes_expected_reply_kind() {
        let recorder = Recorder::default();
        let calls = Arc::clone(&recorder.calls);
        let endpoint = RpcEndpoint::new(Box::new(recorder), "/s/accel", "local.Accel");

        let reply: Reply<bool> =
            endpoint.call("setStandbyOverride", &[Arg::Int(7), Arg::Bool(true)]);
        assert_eq!(reply.into_value(), Some(true));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "setStandbyOverride");
        assert_eq!(calls[0].1, vec![Arg::Int(7), Arg::Bool(true)]);
        assert_eq!(calls[0].2, ValueKind::Bool);
    }

    #[test]
    fn property_narrows_or_reports_type_error() {
        let endpoint = RpcEndpoint::new(Box::new(Recorder::default()), "/s", "i");

        assert_eq!(endpoint.property::<i32>("interval").into_value(), Some(100));
        let wrong: Reply<bool> = endpoint.property("interval");
        assert!(matches!(
            wrong.error(),
            Some(BusError::ReplyType {
                expected: ValueKind::Bool,
                ..
            })
        ));
        let missing: Reply<String> = endpoint.property("nope");
        assert!(matches!(missing.error(), Some(BusError::Remote { .. })));
    }

    #[test]
    fn unavailable_endpoint_fails_every_call() {
        let endpoint = RpcEndpoint::unavailable("no system bus", "/s", "i");
        assert!(!endpoint.is_valid());

        let reply: Reply<()> = endpoint.call("start", &[Arg::Int(1)]);
        assert_eq!(
            reply.into_result(),
            Err(BusError::Connection("no system bus".to_string()))
        );
    }
}
