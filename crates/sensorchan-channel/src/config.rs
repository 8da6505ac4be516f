use sensorchan_bus::{BusKind, SERVICE_NAME};
use sensorchan_socket::SocketConfig;
use serde::Serialize;

/// Session parameters the client wants applied while the channel runs.
///
/// Values are kept while the channel is stopped and pushed to the daemon
/// as part of every start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredConfig {
    /// Sampling interval. Sent as 0 while stopped.
    pub interval: i32,
    /// Daemon-side buffering interval.
    pub buffer_interval: u32,
    /// Daemon-side buffer size, in samples.
    pub buffer_size: u32,
    /// Keep the sensor running while the display is off.
    pub standby_override: bool,
}

impl Default for DesiredConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            buffer_interval: 0,
            buffer_size: 1,
            standby_override: false,
        }
    }
}

/// Where a channel finds the daemon.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Well-known bus name of the daemon.
    pub service_name: String,
    /// Bus the daemon is registered on.
    pub bus: BusKind,
    /// Sample socket settings.
    pub socket: SocketConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            bus: BusKind::System,
            socket: SocketConfig::default(),
        }
    }
}
