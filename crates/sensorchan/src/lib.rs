//! Client-side sensor channels for the sensord daemon.
//!
//! A sensor channel talks to the daemon over two transports: a control bus
//! for lifecycle and configuration, and a Unix socket that carries samples.
//!
//! # Crate Structure
//!
//! - [`socket`]: Sample socket, handshake and length-exact reads
//! - [`bus`]: Control-bus RPC adapter and wire types
//! - [`channel`]: Channel sessions, decoders and the session manager client

/// Re-export sample socket types.
pub mod socket {
    pub use sensorchan_socket::*;
}

/// Re-export control-bus types.
pub mod bus {
    pub use sensorchan_bus::*;
}

/// Re-export channel session types.
pub mod channel {
    pub use sensorchan_channel::*;
}
