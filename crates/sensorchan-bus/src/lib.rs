//! Blocking control-bus RPC adapter for sensor channels.
//!
//! Lifecycle and configuration of a sensor session travel over a message
//! bus as synchronous method calls and property reads. This crate keeps
//! that surface small and typed:
//! - [`ControlBus`] is the raw call/property primitive (D-Bus in production,
//!   scripted fakes in tests)
//! - [`RpcEndpoint`] narrows replies into Rust types and returns [`Reply`]
//! - [`value`] holds the wire types (`DataRange`, `IntegerRange`, arguments)

pub mod endpoint;
pub mod error;
pub mod reply;
#[cfg(feature = "system-bus")]
pub mod system;
pub mod value;

pub use endpoint::{BusKind, ControlBus, RpcEndpoint, UnavailableBus};
pub use error::{BusError, Result};
pub use reply::Reply;
#[cfg(feature = "system-bus")]
pub use system::{shared_connection, SystemBus};
pub use value::{Arg, DataRange, FromValue, IntegerRange, SessionId, Value, ValueKind};

/// Well-known bus name of the sensor daemon.
pub const SERVICE_NAME: &str = "com.nokia.SensorService";
