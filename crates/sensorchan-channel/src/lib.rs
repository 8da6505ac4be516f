//! Client side of a sensor channel.
//!
//! A [`ChannelSession`] drives one sensor session over two transports: the
//! control bus for lifecycle and configuration, and a dedicated sample
//! socket for the data itself. Concrete channels plug in a
//! [`SampleDecoder`] that turns socket bytes into records.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use sensorchan_channel::{
//!     BusSessionManager, ChannelConfig, ChannelSession, FixedRecordDecoder, XyzSample,
//! };
//!
//! let config = ChannelConfig::default();
//! let manager = Arc::new(BusSessionManager::connect(&config));
//! let session_id = manager.request_sensor("accelerometersensor").value_or_default();
//!
//! let decoder = FixedRecordDecoder::new("local.AccelerometerSensor", XyzSample::RECORD_SIZE, |r: Bytes| {
//!     if let Some(sample) = XyzSample::decode(&r) {
//!         println!("{sample:?}");
//!     }
//! });
//! let mut session = ChannelSession::open(
//!     &config,
//!     &BusSessionManager::channel_path("accelerometersensor"),
//!     Box::new(decoder),
//!     session_id,
//!     manager,
//! );
//! session.set_interval(100);
//! let _ = session.start();
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod manager;
pub mod session;

pub use config::{ChannelConfig, DesiredConfig};
pub use decoder::{
    BatchDecoder, FixedRecordDecoder, SampleDecoder, SampleSource, XyzSample, MAX_BATCH_RECORDS,
};
pub use error::{ErrorState, SensorError};
pub use manager::{BusSessionManager, SessionManager, MANAGER_INTERFACE, MANAGER_PATH};
pub use session::{ChannelSession, ChannelState, Dispatch};

pub use sensorchan_bus::{DataRange, IntegerRange, Reply, SessionId};
