use std::sync::Mutex;

use tracing::{debug, info};
use zbus::blocking::fdo::DBusProxy;
use zbus::blocking::{proxy, Connection, Proxy};
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{self, OwnedValue};

use crate::endpoint::{BusKind, ControlBus};
use crate::error::{BusError, Result};
use crate::value::{Arg, DataRange, IntegerRange, Value, ValueKind};

static SYSTEM_CONNECTION: Mutex<Option<Connection>> = Mutex::new(None);
static SESSION_CONNECTION: Mutex<Option<Connection>> = Mutex::new(None);

/// Process-wide connection to `kind`, opened on first use.
pub fn shared_connection(kind: BusKind) -> Result<Connection> {
    let slot = match kind {
        BusKind::System => &SYSTEM_CONNECTION,
        BusKind::Session => &SESSION_CONNECTION,
    };
    let mut guard = slot
        .lock()
        .map_err(|_| BusError::Connection("bus connection lock poisoned".to_string()))?;
    if let Some(conn) = guard.as_ref() {
        return Ok(conn.clone());
    }

    let conn = match kind {
        BusKind::System => Connection::system(),
        BusKind::Session => Connection::session(),
    }
    .map_err(|err| BusError::Connection(format!("{} bus: {err}", kind.name())))?;
    info!(bus = kind.name(), "connected to message bus");
    *guard = Some(conn.clone());
    Ok(conn)
}

/// [`ControlBus`] over a D-Bus object.
pub struct SystemBus {
    proxy: Proxy<'static>,
    valid: bool,
}

impl SystemBus {
    /// Open `service` at `path` / `interface` on the shared `kind` bus.
    pub fn connect(kind: BusKind, service: &str, path: &str, interface: &str) -> Result<Self> {
        let conn = shared_connection(kind)?;
        Self::with_connection(&conn, service, path, interface)
    }

    /// Open `service` at `path` / `interface` on an explicit connection.
    ///
    /// Properties are never cached: the daemon does not announce changes,
    /// so every read is a fresh `Get`.
    pub fn with_connection(
        conn: &Connection,
        service: &str,
        path: &str,
        interface: &str,
    ) -> Result<Self> {
        let proxy: Proxy<'static> = proxy::Builder::new(conn)
            .destination(service.to_string())?
            .path(path.to_string())?
            .interface(interface.to_string())?
            .cache_properties(CacheProperties::No)
            .build()?;
        let valid = service_has_owner(conn, service);
        debug!(service, path, interface, valid, "opened bus endpoint");
        Ok(Self { proxy, valid })
    }
}

impl ControlBus for SystemBus {
    fn call(&self, method: &str, args: &[Arg], reply: ValueKind) -> Result<Value> {
        let proxy = &self.proxy;
        let message = match args {
            [] => proxy.call_method(method, &()),
            [Arg::Int(a)] => proxy.call_method(method, &(*a,)),
            [Arg::Int(a), Arg::Int(b)] => proxy.call_method(method, &(*a, *b)),
            [Arg::Int(a), Arg::UInt(b)] => proxy.call_method(method, &(*a, *b)),
            [Arg::Int(a), Arg::Bool(b)] => proxy.call_method(method, &(*a, *b)),
            [Arg::Int(a), Arg::Range(r)] => proxy.call_method(method, &(*a, *r)),
            [Arg::Str(s)] => proxy.call_method(method, &(s.as_str(),)),
            [Arg::Str(s), Arg::Int(i)] => proxy.call_method(method, &(s.as_str(), *i)),
            [Arg::Str(s), Arg::Long(l)] => proxy.call_method(method, &(s.as_str(), *l)),
            [Arg::Str(s), Arg::Int(i), Arg::Long(l)] => {
                proxy.call_method(method, &(s.as_str(), *i, *l))
            }
            _ => {
                return Err(BusError::UnsupportedArguments {
                    method: method.to_string(),
                })
            }
        }?;
        decode_reply(method, &message, reply)
    }

    fn property(&self, name: &str) -> Result<Value> {
        let raw: OwnedValue = self.proxy.get_property(name)?;
        from_variant(&raw).ok_or_else(|| {
            BusError::Transport(format!("property {name} has an unsupported type"))
        })
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

impl std::fmt::Debug for SystemBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemBus")
            .field("path", &self.proxy.path().as_str())
            .field("interface", &self.proxy.interface().as_str())
            .field("valid", &self.valid)
            .finish()
    }
}

fn decode_reply(method: &str, message: &zbus::Message, kind: ValueKind) -> Result<Value> {
    let body = message.body();
    let value = match kind {
        ValueKind::Unit => Value::Unit,
        ValueKind::Int => Value::Int(body.deserialize::<i32>()?),
        ValueKind::UInt => Value::UInt(body.deserialize::<u32>()?),
        ValueKind::Long => Value::Long(body.deserialize::<i64>()?),
        ValueKind::Bool => Value::Bool(body.deserialize::<bool>()?),
        ValueKind::Str => Value::Str(body.deserialize::<String>()?),
        ValueKind::Range => Value::Range(body.deserialize::<DataRange>()?),
        ValueKind::Ranges => Value::Ranges(body.deserialize::<Vec<DataRange>>()?),
        ValueKind::IntegerRanges => {
            Value::IntegerRanges(body.deserialize::<Vec<IntegerRange>>()?)
        }
    };
    debug!(method, ?value, "bus reply");
    Ok(value)
}

fn service_has_owner(conn: &Connection, service: &str) -> bool {
    let Ok(name) = BusName::try_from(service) else {
        return false;
    };
    DBusProxy::new(conn)
        .and_then(|dbus| dbus.name_has_owner(name).map_err(zbus::Error::from))
        .unwrap_or(false)
}

fn from_variant(value: &zvariant::Value<'_>) -> Option<Value> {
    match value {
        zvariant::Value::Bool(v) => Some(Value::Bool(*v)),
        zvariant::Value::U8(v) => Some(Value::UInt(u32::from(*v))),
        zvariant::Value::I16(v) => Some(Value::Int(i32::from(*v))),
        zvariant::Value::U16(v) => Some(Value::UInt(u32::from(*v))),
        zvariant::Value::I32(v) => Some(Value::Int(*v)),
        zvariant::Value::U32(v) => Some(Value::UInt(*v)),
        zvariant::Value::I64(v) => Some(Value::Long(*v)),
        zvariant::Value::Str(s) => Some(Value::Str(s.as_str().to_string())),
        zvariant::Value::Value(inner) => from_variant(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_widen_to_values() {
        assert_eq!(
            from_variant(&zvariant::Value::from(7i32)),
            Some(Value::Int(7))
        );
        assert_eq!(
            from_variant(&zvariant::Value::from(3u32)),
            Some(Value::UInt(3))
        );
        assert_eq!(
            from_variant(&zvariant::Value::from("accelerometersensor")),
            Some(Value::Str("accelerometersensor".to_string()))
        );
        assert_eq!(from_variant(&zvariant::Value::from(1.5f64)), None);
    }

    #[test]
    fn nested_variant_is_unwrapped() {
        let outer = zvariant::Value::Value(Box::new(zvariant::Value::from(true)));
        assert_eq!(from_variant(&outer), Some(Value::Bool(true)));
    }

    struct TestChannel {
        interval: i32,
    }

    #[zbus::interface(name = "local.TestSensor")]
    impl TestChannel {
        #[zbus(name = "setInterval")]
        fn set_interval(&mut self, _session_id: i32, value: i32) {
            self.interval = value;
        }

        #[zbus(property, name = "interval")]
        fn interval(&self) -> i32 {
            self.interval
        }
    }

    /// Peer-to-peer pair with `TestChannel` served at `/TestSensor`.
    fn peer_pair() -> (Connection, Connection) {
        let (server_end, client_end) = std::os::unix::net::UnixStream::pair().unwrap();
        let guid = zbus::Guid::generate();
        let server = std::thread::spawn(move || {
            zbus::blocking::connection::Builder::unix_stream(server_end)
                .server(guid)
                .unwrap()
                .p2p()
                .serve_at("/TestSensor", TestChannel { interval: 0 })
                .unwrap()
                .build()
                .unwrap()
        });
        let client = zbus::blocking::connection::Builder::unix_stream(client_end)
            .p2p()
            .build()
            .unwrap();
        (server.join().unwrap(), client)
    }

    #[test]
    fn property_reads_are_not_cached() {
        let (_server, client) = peer_pair();
        let bus = SystemBus::with_connection(
            &client,
            "local.sensorchan.TestSensor",
            "/TestSensor",
            "local.TestSensor",
        )
        .unwrap();

        assert_eq!(bus.property("interval").unwrap(), Value::Int(0));
        assert_eq!(
            bus.call("setInterval", &[Arg::Int(7), Arg::Int(100)], ValueKind::Unit)
                .unwrap(),
            Value::Unit
        );
        assert_eq!(bus.property("interval").unwrap(), Value::Int(100));
    }

    #[test]
    fn bus_kind_defaults_to_system() {
        assert_eq!(BusKind::default(), BusKind::System);
        assert_eq!(BusKind::Session.name(), "session");
    }
}
