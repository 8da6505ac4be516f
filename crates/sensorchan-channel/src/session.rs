use std::sync::Arc;
use std::time::Duration;

use sensorchan_bus::{
    Arg, ControlBus, DataRange, FromValue, IntegerRange, Reply, RpcEndpoint, SessionId,
};
use sensorchan_socket::{Readiness, SampleStream, SocketConfig, SocketReader};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DesiredConfig;
#[cfg(feature = "system-bus")]
use crate::config::ChannelConfig;
use crate::decoder::SampleDecoder;
use crate::error::{ErrorState, SensorError};
use crate::manager::SessionManager;

const CONNECT_FAILED: &str = "Socket connection failed.";
const DISCONNECT_FAILED: &str = "Socket disconnect failed.";
const CONNECTION_LOST: &str = "Socket connection lost.";

/// Lifecycle state of a channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Connected and stopped.
    Idle,
    /// Started; readable notifications drive sample ingress.
    Running,
    /// No sample connection, or the session was released.
    Invalid,
}

/// Outcome of one [`ChannelSession::process_events`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing to deliver, or the channel is not subscribed.
    Idle,
    /// The decoder ran this many times.
    Delivered(usize),
    /// The daemon hung up the sample socket.
    Disconnected,
}

type ErrorListener = Box<dyn FnMut(SensorError, &str)>;

/// Client side of one sensor session.
///
/// A session pairs a control endpoint on the bus with a sample socket
/// bound to the same session id. Configuration set while stopped is kept
/// in [`DesiredConfig`] and applied in a fixed order on every start; the
/// daemon sees interval 0 whenever the session is stopped.
///
/// Operations never fail: bus outcomes come back as [`Reply`] values and
/// local transport failures are recorded for [`error_code`](Self::error_code)
/// and [`error_string`](Self::error_string).
///
/// A session belongs to one event context; [`process_events`](Self::process_events)
/// is that context's readable hook.
pub struct ChannelSession {
    endpoint: RpcEndpoint,
    socket: SocketReader,
    decoder: Box<dyn SampleDecoder>,
    manager: Arc<dyn SessionManager>,
    session_id: SessionId,
    desired: DesiredConfig,
    error: ErrorState,
    running: bool,
    released: bool,
    error_listeners: Vec<ErrorListener>,
}

impl ChannelSession {
    /// Open a session on the daemon described by `config`.
    ///
    /// A bus that cannot be opened leaves every bus call failing; a socket
    /// that cannot be connected is recorded as a client socket error.
    #[cfg(feature = "system-bus")]
    pub fn open(
        config: &ChannelConfig,
        path: &str,
        decoder: Box<dyn SampleDecoder>,
        session_id: SessionId,
        manager: Arc<dyn SessionManager>,
    ) -> Self {
        let interface = decoder.interface_name().to_string();
        let endpoint = match sensorchan_bus::SystemBus::connect(
            config.bus,
            &config.service_name,
            path,
            &interface,
        ) {
            Ok(bus) => RpcEndpoint::new(Box::new(bus), path, interface),
            Err(err) => {
                warn!(path, error = %err, "control bus unavailable");
                RpcEndpoint::unavailable(err.to_string(), path, interface)
            }
        };

        let mut socket = SocketReader::new(config.socket.clone());
        let connected = socket.initiate_connection(session_id);
        Self::assemble(endpoint, socket, connected, decoder, session_id, manager)
    }

    /// Open a session over an explicit control bus, connecting the sample
    /// socket described by `socket`.
    pub fn new(
        bus: Box<dyn ControlBus>,
        path: &str,
        socket: SocketConfig,
        decoder: Box<dyn SampleDecoder>,
        session_id: SessionId,
        manager: Arc<dyn SessionManager>,
    ) -> Self {
        let endpoint = RpcEndpoint::new(bus, path, decoder.interface_name());
        let mut socket = SocketReader::new(socket);
        let connected = socket.initiate_connection(session_id);
        Self::assemble(endpoint, socket, connected, decoder, session_id, manager)
    }

    /// Open a session over an explicit control bus and an already connected
    /// sample stream. The handshake still runs on `stream`.
    pub fn with_stream(
        bus: Box<dyn ControlBus>,
        path: &str,
        stream: SampleStream,
        decoder: Box<dyn SampleDecoder>,
        session_id: SessionId,
        manager: Arc<dyn SessionManager>,
    ) -> Self {
        let endpoint = RpcEndpoint::new(bus, path, decoder.interface_name());
        let mut socket = SocketReader::new(SocketConfig::default());
        let connected = match socket.connect_stream(stream, session_id) {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id, error = %err, "sample socket handshake failed");
                false
            }
        };
        Self::assemble(endpoint, socket, connected, decoder, session_id, manager)
    }

    fn assemble(
        endpoint: RpcEndpoint,
        socket: SocketReader,
        connected: bool,
        decoder: Box<dyn SampleDecoder>,
        session_id: SessionId,
        manager: Arc<dyn SessionManager>,
    ) -> Self {
        let mut session = Self {
            endpoint,
            socket,
            decoder,
            manager,
            session_id,
            desired: DesiredConfig::default(),
            error: ErrorState::default(),
            running: false,
            released: false,
            error_listeners: Vec::new(),
        };
        if connected {
            debug!(
                session_id,
                path = session.endpoint.path(),
                "channel session opened"
            );
        } else {
            session.set_error(SensorError::ClientSocketError, CONNECT_FAILED);
        }
        session
    }

    // Lifecycle

    /// Start the session under its own id.
    pub fn start(&mut self) -> Reply<()> {
        self.start_with(self.session_id)
    }

    /// Start the session and apply the desired configuration.
    ///
    /// Order on the bus: `start`, `setStandbyOverride(true)` if requested,
    /// `setInterval`, `setBufferInterval`, `setBufferSize`. Returns the reply
    /// of `start`; the configuration replies are not inspected. Starting a
    /// running session does nothing.
    pub fn start_with(&mut self, session_id: SessionId) -> Reply<()> {
        if self.running {
            return Reply::ok(());
        }
        self.clear_error();
        self.running = true;
        self.socket.subscribe_readable();
        info!(session_id, interface = self.endpoint.interface(), "starting channel");

        let reply: Reply<()> = self.endpoint.call("start", &[Arg::Int(session_id)]);
        if self.desired.standby_override {
            let _ = self.send_standby_override(session_id, true);
        }
        let _ = self.send_interval(session_id, self.desired.interval);
        let _ = self.send_buffer_interval(session_id, self.desired.buffer_interval);
        let _ = self.send_buffer_size(session_id, self.desired.buffer_size);
        reply
    }

    /// Stop the session under its own id.
    pub fn stop(&mut self) -> Reply<()> {
        self.stop_with(self.session_id)
    }

    /// Stop the session.
    ///
    /// Order on the bus: `setStandbyOverride(false)`, `setInterval(0)`,
    /// `stop`. Returns the reply of `stop`. Stopping a stopped session does
    /// nothing.
    pub fn stop_with(&mut self, session_id: SessionId) -> Reply<()> {
        if !self.running {
            return Reply::ok(());
        }
        self.clear_error();
        self.running = false;
        self.socket.unsubscribe_readable();
        info!(session_id, interface = self.endpoint.interface(), "stopping channel");

        let _ = self.send_standby_override(session_id, false);
        let _ = self.send_interval(session_id, 0);
        self.endpoint.call("stop", &[Arg::Int(session_id)])
    }

    /// Hand the session back to the sensor manager.
    ///
    /// The session cannot deliver samples afterwards. Releasing twice only
    /// contacts the manager once.
    pub fn release(&mut self) -> bool {
        if self.released {
            return true;
        }
        self.released = true;
        let id = self.id().value_or_default();
        let released = self.manager.release_interface(&id, self.session_id);
        debug!(sensor = %id, session_id = self.session_id, released, "released session");
        released
    }

    // Remote setters

    /// `setInterval` on the bus without touching the desired configuration.
    pub fn send_interval(&mut self, session_id: SessionId, value: i32) -> Reply<()> {
        self.clear_error();
        self.endpoint
            .call("setInterval", &[Arg::Int(session_id), Arg::Int(value)])
    }

    /// `setBufferInterval` on the bus without touching the desired configuration.
    pub fn send_buffer_interval(&mut self, session_id: SessionId, value: u32) -> Reply<()> {
        self.clear_error();
        self.endpoint.call(
            "setBufferInterval",
            &[Arg::Int(session_id), Arg::UInt(value)],
        )
    }

    /// `setBufferSize` on the bus without touching the desired configuration.
    pub fn send_buffer_size(&mut self, session_id: SessionId, value: u32) -> Reply<()> {
        self.clear_error();
        self.endpoint
            .call("setBufferSize", &[Arg::Int(session_id), Arg::UInt(value)])
    }

    /// `setStandbyOverride` on the bus without touching the desired configuration.
    pub fn send_standby_override(&mut self, session_id: SessionId, value: bool) -> Reply<bool> {
        self.clear_error();
        self.endpoint.call(
            "setStandbyOverride",
            &[Arg::Int(session_id), Arg::Bool(value)],
        )
    }

    // Configuration

    /// Desired sampling interval. Pushed now only while running; otherwise
    /// applied on the next start.
    pub fn set_interval(&mut self, value: i32) {
        self.desired.interval = value;
        debug!(session_id = self.session_id, value, "interval set");
        if self.running {
            let _ = self.send_interval(self.session_id, value);
        }
    }

    /// Desired buffer interval. The daemon takes buffer settings only while
    /// the session is stopped, so a running session defers it to the next
    /// start.
    pub fn set_buffer_interval(&mut self, value: u32) {
        self.desired.buffer_interval = value;
        debug!(session_id = self.session_id, value, "buffer interval set");
        if !self.running {
            let _ = self.send_buffer_interval(self.session_id, value);
        }
    }

    /// Desired buffer size. Same push rule as
    /// [`set_buffer_interval`](Self::set_buffer_interval).
    pub fn set_buffer_size(&mut self, value: u32) {
        self.desired.buffer_size = value;
        debug!(session_id = self.session_id, value, "buffer size set");
        if !self.running {
            let _ = self.send_buffer_size(self.session_id, value);
        }
    }

    /// Desired standby override, always pushed. Returns the daemon's answer.
    pub fn set_standby_override(&mut self, value: bool) -> bool {
        self.desired.standby_override = value;
        self.send_standby_override(self.session_id, value)
            .value_or_default()
    }

    pub fn interval(&self) -> Reply<i32> {
        self.running_or_cached("interval", self.desired.interval)
    }

    pub fn buffer_interval(&self) -> Reply<u32> {
        self.running_or_cached("bufferInterval", self.desired.buffer_interval)
    }

    pub fn buffer_size(&self) -> Reply<u32> {
        self.running_or_cached("bufferSize", self.desired.buffer_size)
    }

    pub fn standby_override(&self) -> Reply<bool> {
        self.running_or_cached("standbyOverride", self.desired.standby_override)
    }

    fn running_or_cached<T: FromValue>(&self, property: &str, cached: T) -> Reply<T> {
        if self.running {
            self.endpoint.property(property)
        } else {
            Reply::ok(cached)
        }
    }

    /// Values applied on the next start.
    pub fn desired(&self) -> &DesiredConfig {
        &self.desired
    }

    // Metadata

    pub fn description(&self) -> Reply<String> {
        self.endpoint.property("description")
    }

    /// Sensor id the daemon knows this channel by.
    pub fn id(&self) -> Reply<String> {
        self.endpoint.property("id")
    }

    pub fn sensor_type(&self) -> Reply<String> {
        self.endpoint.property("type")
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    // Ranges

    pub fn available_data_ranges(&self) -> Reply<Vec<DataRange>> {
        self.endpoint.call("getAvailableDataRanges", &[])
    }

    pub fn current_data_range(&mut self) -> Reply<DataRange> {
        self.clear_error();
        self.endpoint.call("getCurrentDataRange", &[])
    }

    /// Ask the daemon to prefer `range` for this session. The daemon
    /// arbitrates between sessions, so the current range may differ.
    pub fn request_data_range(&mut self, range: DataRange) -> Reply<()> {
        self.clear_error();
        self.endpoint.call(
            "requestDataRange",
            &[Arg::Int(self.session_id), Arg::Range(range)],
        )
    }

    pub fn remove_data_range_request(&mut self) -> Reply<()> {
        self.clear_error();
        self.endpoint
            .call("removeDataRangeRequest", &[Arg::Int(self.session_id)])
    }

    /// Select the advertised range at `index`. True iff the daemon's current
    /// range is that range afterwards.
    pub fn set_data_range_index(&mut self, index: i32) -> bool {
        self.clear_error();
        let _: Reply<()> = self.endpoint.call(
            "setDataRangeIndex",
            &[Arg::Int(self.session_id), Arg::Int(index)],
        );

        let available = self.available_data_ranges().value_or_default();
        let Some(wanted) = usize::try_from(index)
            .ok()
            .and_then(|i| available.get(i).copied())
        else {
            debug!(index, advertised = available.len(), "data range index out of range");
            return false;
        };
        self.current_data_range().into_value() == Some(wanted)
    }

    pub fn available_intervals(&self) -> Reply<Vec<DataRange>> {
        self.endpoint.call("getAvailableIntervals", &[])
    }

    pub fn available_buffer_intervals(&self) -> Reply<Vec<IntegerRange>> {
        self.endpoint.call("getAvailableBufferIntervals", &[])
    }

    pub fn available_buffer_sizes(&self) -> Reply<Vec<IntegerRange>> {
        self.endpoint.call("getAvailableBufferSizes", &[])
    }

    /// Whether the sensor buffers in hardware.
    pub fn hw_buffering(&self) -> Reply<bool> {
        self.endpoint.call("hwBuffering", &[])
    }

    // Errors

    /// The local error if one is set, otherwise the daemon's.
    pub fn error_code(&self) -> SensorError {
        if self.error.is_set() {
            return self.error.code();
        }
        self.endpoint
            .property::<i32>("errorCodeInt")
            .map(SensorError::from_code)
            .value_or_default()
    }

    /// Text of [`error_code`](Self::error_code), shadowed the same way.
    pub fn error_string(&self) -> String {
        if self.error.is_set() {
            return self.error.message().to_string();
        }
        self.endpoint.property("errorString").value_or_default()
    }

    /// Record a local error and notify error listeners.
    pub fn set_error(&mut self, code: SensorError, message: &str) {
        warn!(
            session_id = self.session_id,
            code = code.code(),
            reason = message,
            "channel error"
        );
        self.error.set(code, message);
        for listener in &mut self.error_listeners {
            listener(code, message);
        }
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    /// Register a listener for locally raised errors.
    pub fn on_error(&mut self, listener: impl FnMut(SensorError, &str) + 'static) {
        self.error_listeners.push(Box::new(listener));
    }

    // Samples

    /// Fill `buf` from the sample socket. `false` if the connection was lost.
    pub fn read(&mut self, buf: &mut [u8]) -> bool {
        self.socket.read(buf)
    }

    pub fn bytes_available(&self) -> usize {
        self.socket.bytes_available()
    }

    /// Drain pending samples through the decoder.
    ///
    /// Runs the decoder at least once and keeps going while it succeeds and
    /// consumes bytes. Returns how often the decoder ran.
    ///
    /// A pass that leaves the pending byte count unchanged ends the drain;
    /// the next readable notification picks up whatever is left.
    pub fn data_received(&mut self) -> usize {
        let mut passes = 0;
        loop {
            let pending = self.socket.bytes_available();
            passes += 1;
            if !self.decoder.data_received(&mut self.socket) {
                break;
            }
            let left = self.socket.bytes_available();
            if left == 0 || left >= pending {
                break;
            }
        }
        passes
    }

    /// Wait up to `timeout` for the readable event and deliver samples.
    ///
    /// Returns [`Dispatch::Idle`] at once when the session is not started.
    pub fn process_events(&mut self, timeout: Option<Duration>) -> Dispatch {
        if !self.socket.is_subscribed() {
            return Dispatch::Idle;
        }
        match self.socket.wait_readable(timeout) {
            Ok(Readiness::Timeout) => Dispatch::Idle,
            Ok(Readiness::Readable) => Dispatch::Delivered(self.data_received()),
            Ok(Readiness::Hangup) => {
                self.set_error(SensorError::ClientSocketError, CONNECTION_LOST);
                Dispatch::Disconnected
            }
            Err(err) => {
                debug!(session_id = self.session_id, error = %err, "readable wait failed");
                self.set_error(SensorError::ClientSocketError, CONNECTION_LOST);
                Dispatch::Disconnected
            }
        }
    }

    // State

    /// Whether the control endpoint is reachable.
    pub fn is_valid(&self) -> bool {
        self.endpoint.is_valid()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_subscribed(&self) -> bool {
        self.socket.is_subscribed()
    }

    pub fn state(&self) -> ChannelState {
        if self.released || !self.socket.is_connected() {
            ChannelState::Invalid
        } else if self.running {
            ChannelState::Running
        } else {
            ChannelState::Idle
        }
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        if self.is_valid() {
            let _ = self.release();
        }
        if !self.socket.drop_connection() {
            self.set_error(SensorError::ClientSocketError, DISCONNECT_FAILED);
        }
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("endpoint", &self.endpoint)
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("desired", &self.desired)
            .field("error", &self.error)
            .finish()
    }
}
