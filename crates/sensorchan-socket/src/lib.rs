//! Sample socket transport for sensor channels.
//!
//! Every channel session owns one Unix stream connection to the sensor
//! daemon. The connection is bound to the session by a short handshake
//! (session id preamble, one acknowledgement byte) and afterwards carries
//! raw sample records only:
//! - [`SampleStream`] is the connected socket with readiness queries
//! - [`SocketReader`] owns the handshake and the length-exact read primitive

pub mod error;
pub mod reader;
pub mod stream;

pub use error::{Result, SocketError};
pub use reader::{SocketConfig, SocketReader, DEFAULT_SOCKET_PATH, SESSION_ID_WIDTH};
pub use stream::{Readiness, SampleStream};
