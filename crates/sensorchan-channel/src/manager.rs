use sensorchan_bus::{Arg, ControlBus, Reply, RpcEndpoint, SessionId};
use tracing::{debug, warn};

#[cfg(feature = "system-bus")]
use crate::config::ChannelConfig;

/// Object path of the sensor manager.
pub const MANAGER_PATH: &str = "/SensorManager";

/// Bus interface of the sensor manager.
pub const MANAGER_INTERFACE: &str = "local.SensorManager";

/// The part of the sensor manager a channel session relies on.
pub trait SessionManager {
    /// Hand the session back to the daemon. `false` if the daemon refused.
    fn release_interface(&self, id: &str, session_id: SessionId) -> bool;
}

/// Sensor manager client over the control bus.
#[derive(Debug)]
pub struct BusSessionManager {
    endpoint: RpcEndpoint,
}

impl BusSessionManager {
    pub fn new(bus: Box<dyn ControlBus>) -> Self {
        Self {
            endpoint: RpcEndpoint::new(bus, MANAGER_PATH, MANAGER_INTERFACE),
        }
    }

    /// Connect to the manager of the daemon described by `config`.
    ///
    /// A bus that cannot be opened yields a manager whose calls all fail.
    #[cfg(feature = "system-bus")]
    pub fn connect(config: &ChannelConfig) -> Self {
        match sensorchan_bus::SystemBus::connect(
            config.bus,
            &config.service_name,
            MANAGER_PATH,
            MANAGER_INTERFACE,
        ) {
            Ok(bus) => Self::new(Box::new(bus)),
            Err(err) => {
                warn!(error = %err, "sensor manager unavailable");
                Self {
                    endpoint: RpcEndpoint::unavailable(
                        err.to_string(),
                        MANAGER_PATH,
                        MANAGER_INTERFACE,
                    ),
                }
            }
        }
    }

    /// Whether the manager is reachable.
    pub fn is_valid(&self) -> bool {
        self.endpoint.is_valid()
    }

    /// Ask the daemon to load the plugin providing `name`.
    pub fn load_plugin(&self, name: &str) -> Reply<bool> {
        self.endpoint.call("loadPlugin", &[Arg::from(name)])
    }

    /// Open a session on sensor `id` for this process.
    ///
    /// The daemon answers with a negative id when it refuses.
    pub fn request_sensor(&self, id: &str) -> Reply<SessionId> {
        let pid = i64::from(std::process::id());
        let reply: Reply<SessionId> = self
            .endpoint
            .call("requestSensor", &[Arg::from(id), Arg::Long(pid)]);
        if let Some(session_id) = reply.value() {
            debug!(sensor = id, session_id, "sensor session requested");
        }
        reply
    }

    /// Object path of the channel serving sensor `id`.
    pub fn channel_path(id: &str) -> String {
        format!("{MANAGER_PATH}/{id}")
    }
}

impl SessionManager for BusSessionManager {
    fn release_interface(&self, id: &str, session_id: SessionId) -> bool {
        let pid = i64::from(std::process::id());
        let reply: Reply<bool> = self.endpoint.call(
            "releaseSensor",
            &[Arg::from(id), Arg::Int(session_id), Arg::Long(pid)],
        );
        match reply.into_result() {
            Ok(released) => released,
            Err(err) => {
                warn!(sensor = id, session_id, error = %err, "release failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use sensorchan_bus::{BusError, Value, ValueKind};

    use super::*;

    type Calls = Arc<Mutex<Vec<(String, Vec<Arg>)>>>;

    struct ManagerBus {
        calls: Calls,
    }

    impl ControlBus for ManagerBus {
        fn call(
            &self,
            method: &str,
            args: &[Arg],
            _reply: ValueKind,
        ) -> sensorchan_bus::Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), args.to_vec()));
            match method {
                "loadPlugin" => Ok(Value::Bool(true)),
                "requestSensor" => Ok(Value::Int(7)),
                "releaseSensor" => Ok(Value::Bool(true)),
                other => Err(BusError::Remote {
                    name: "org.freedesktop.DBus.Error.UnknownMethod".to_string(),
                    message: other.to_string(),
                }),
            }
        }

        fn property(&self, name: &str) -> sensorchan_bus::Result<Value> {
            Err(BusError::Transport(format!("no property {name}")))
        }
    }

    fn manager() -> (BusSessionManager, Calls) {
        let calls = Calls::default();
        let bus = ManagerBus {
            calls: Arc::clone(&calls),
        };
        (BusSessionManager::new(Box::new(bus)), calls)
    }

    #[test]
    fn request_sensor_passes_process_id() {
        let (manager, calls) = manager();

        assert_eq!(manager.load_plugin("accelerometersensor").into_value(), Some(true));
        assert_eq!(
            manager.request_sensor("accelerometersensor").into_value(),
            Some(7)
        );

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, "loadPlugin");
        assert_eq!(calls[1].0, "requestSensor");
        assert_eq!(
            calls[1].1,
            vec![
                Arg::Str("accelerometersensor".to_string()),
                Arg::Long(i64::from(std::process::id())),
            ]
        );
    }

    #[test]
    fn release_sends_id_session_and_process_id() {
        let (manager, calls) = manager();
        assert!(manager.release_interface("accelerometersensor", 7));

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "releaseSensor".to_string(),
                vec![
                    Arg::Str("accelerometersensor".to_string()),
                    Arg::Int(7),
                    Arg::Long(i64::from(std::process::id())),
                ]
            )
        );
    }

    #[test]
    fn release_on_unreachable_bus_fails() {
        let manager = BusSessionManager {
            endpoint: RpcEndpoint::unavailable("no bus", MANAGER_PATH, MANAGER_INTERFACE),
        };
        assert!(!manager.is_valid());
        assert!(!manager.release_interface("gyroscopesensor", 3));
    }

    #[test]
    fn channel_path_nests_under_manager() {
        assert_eq!(
            BusSessionManager::channel_path("alssensor"),
            "/SensorManager/alssensor"
        );
    }
}
