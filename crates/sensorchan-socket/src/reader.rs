use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::{Result, SocketError};
use crate::stream::{Readiness, SampleStream};

/// Well-known sample endpoint of the sensor daemon.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/sensord.sock";

/// Width of the session id preamble written during the handshake.
pub const SESSION_ID_WIDTH: usize = std::mem::size_of::<i32>();

/// Configuration for the sample socket.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Path of the daemon's sample endpoint.
    pub path: PathBuf,
    /// Timeout for each blocking handshake operation.
    pub handshake_timeout: Duration,
    /// Read timeout applied once the handshake completes. `None` blocks.
    pub read_timeout: Option<Duration>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SOCKET_PATH),
            handshake_timeout: Duration::from_secs(5),
            read_timeout: None,
        }
    }
}

/// Owns the data connection of one channel session.
///
/// The connection is bound to a session id by a handshake: the client
/// writes the id as a little-endian `i32` and the daemon answers with a
/// single acknowledgement byte. After that the stream carries raw sample
/// records whose layout is defined by the concrete channel.
#[derive(Debug)]
pub struct SocketReader {
    config: SocketConfig,
    stream: Option<SampleStream>,
    readable_subscribed: bool,
}

impl SocketReader {
    /// Create an unconnected reader.
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            stream: None,
            readable_subscribed: false,
        }
    }

    /// Connect to the sample endpoint and bind the socket to `session_id`.
    ///
    /// Returns `true` iff connect, preamble write and acknowledgement read
    /// all succeed.
    pub fn initiate_connection(&mut self, session_id: i32) -> bool {
        match self.connect(session_id) {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id, error = %err, "sample socket connection failed");
                false
            }
        }
    }

    /// Fallible form of [`initiate_connection`](Self::initiate_connection).
    pub fn connect(&mut self, session_id: i32) -> Result<()> {
        let stream = SampleStream::connect(&self.config.path)?;
        let stream = handshake(stream, session_id, &self.config)?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Adopt an already connected stream and perform the handshake on it.
    pub fn connect_stream(&mut self, stream: SampleStream, session_id: i32) -> Result<()> {
        let stream = handshake(stream, session_id, &self.config)?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the connection. Returns `false` only if closing reported an
    /// error; dropping an absent connection succeeds.
    pub fn drop_connection(&mut self) -> bool {
        self.readable_subscribed = false;
        let Some(stream) = self.stream.take() else {
            return true;
        };
        match stream.close() {
            Ok(()) => {
                debug!("sample socket closed");
                true
            }
            Err(err) => {
                warn!(error = %err, "sample socket close failed");
                false
            }
        }
    }

    /// Fill `buf` completely. Returns `false` if the connection is lost
    /// first, in which case `buf` is left untouched.
    pub fn read(&mut self, buf: &mut [u8]) -> bool {
        match self.read_bytes(buf.len()) {
            Some(bytes) => {
                buf.copy_from_slice(&bytes);
                true
            }
            None => false,
        }
    }

    /// Read exactly `len` bytes into a fresh buffer.
    pub fn read_bytes(&mut self, len: usize) -> Option<Bytes> {
        let stream = self.stream.as_mut()?;
        let mut staging = BytesMut::zeroed(len);
        match read_full(stream, &mut staging) {
            Ok(()) => {
                trace!(len, "read sample bytes");
                Some(staging.freeze())
            }
            Err(err) => {
                warn!(len, error = %err, "sample read failed");
                None
            }
        }
    }

    /// Bytes that can be read without blocking. Zero when disconnected.
    pub fn bytes_available(&self) -> usize {
        self.stream
            .as_ref()
            .and_then(|stream| stream.bytes_available().ok())
            .unwrap_or(0)
    }

    /// Whether a handshaken connection is held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Route readable notifications to the owner.
    pub fn subscribe_readable(&mut self) {
        self.readable_subscribed = true;
    }

    /// Stop routing readable notifications.
    pub fn unsubscribe_readable(&mut self) {
        self.readable_subscribed = false;
    }

    /// Whether readable notifications are currently routed.
    pub fn is_subscribed(&self) -> bool {
        self.readable_subscribed
    }

    /// Wait for the readable event.
    ///
    /// Fails with [`SocketError::NotConnected`] when no connection is held.
    pub fn wait_readable(&self, timeout: Option<Duration>) -> Result<Readiness> {
        let stream = self.stream.as_ref().ok_or(SocketError::NotConnected)?;
        stream.wait_readable(timeout)
    }

    /// Configuration this reader was created with.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }
}

impl Drop for SocketReader {
    fn drop(&mut self) {
        if self.stream.is_some() {
            let _ = self.drop_connection();
        }
    }
}

fn handshake(
    mut stream: SampleStream,
    session_id: i32,
    config: &SocketConfig,
) -> Result<SampleStream> {
    stream.set_read_timeout(Some(config.handshake_timeout))?;
    stream.set_write_timeout(Some(config.handshake_timeout))?;

    stream
        .write_all(&session_id.to_le_bytes())
        .and_then(|()| stream.flush())
        .map_err(|err| SocketError::Handshake {
            session_id,
            reason: format!("writing session id failed: {err}"),
        })?;

    let mut ack = [0u8; 1];
    read_full(&mut stream, &mut ack).map_err(|err| SocketError::Handshake {
        session_id,
        reason: format!("reading acknowledgement failed: {err}"),
    })?;
    debug!(session_id, ack = ack[0], "sample socket handshake complete");

    // Handshake uses bounded waits; restore the runtime read behavior after it.
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(None)?;
    Ok(stream)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(SocketError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(SocketError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::thread;

    use super::*;

    fn unique_socket_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sensorchan-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("sensord.sock")
    }

    fn reader_for(path: &std::path::Path) -> SocketReader {
        SocketReader::new(SocketConfig {
            path: path.to_path_buf(),
            handshake_timeout: Duration::from_secs(2),
            read_timeout: Some(Duration::from_secs(2)),
        })
    }

    #[test]
    fn handshake_writes_little_endian_session_id() {
        let path = unique_socket_path("handshake");
        let listener = UnixListener::bind(&path).unwrap();

        let daemon = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut preamble = [0u8; SESSION_ID_WIDTH];
            stream.read_exact(&mut preamble).unwrap();
            stream.write_all(&[0x01]).unwrap();
            preamble
        });

        let mut reader = reader_for(&path);
        assert!(reader.initiate_connection(7));
        assert!(reader.is_connected());
        assert_eq!(daemon.join().unwrap(), [0x07, 0x00, 0x00, 0x00]);

        assert!(reader.drop_connection());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn refused_connection_reports_failure() {
        let path = unique_socket_path("refused");
        let mut reader = reader_for(&path);

        assert!(!reader.initiate_connection(3));
        assert!(!reader.is_connected());
        assert!(matches!(reader.connect(3), Err(SocketError::Connect { .. })));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_acknowledgement_fails_handshake() {
        let (left, right) = UnixStream::pair().unwrap();
        drop(left);

        let mut reader = SocketReader::new(SocketConfig::default());
        let result = reader.connect_stream(SampleStream::from_unix(right), 9);
        assert!(matches!(result, Err(SocketError::Handshake { session_id: 9, .. })));
        assert!(!reader.is_connected());
    }

    #[test]
    fn read_is_length_exact_across_partial_writes() {
        let (left, right) = UnixStream::pair().unwrap();

        let daemon = thread::spawn(move || {
            let mut stream = left;
            let mut preamble = [0u8; SESSION_ID_WIDTH];
            stream.read_exact(&mut preamble).unwrap();
            stream.write_all(&[0x01]).unwrap();
            stream.write_all(&[1, 2, 3]).unwrap();
            thread::sleep(Duration::from_millis(20));
            stream.write_all(&[4, 5, 6, 7, 8]).unwrap();
            stream
        });

        let mut reader = SocketReader::new(SocketConfig::default());
        reader
            .connect_stream(SampleStream::from_unix(right), 1)
            .unwrap();

        let mut buf = [0u8; 8];
        assert!(reader.read(&mut buf));
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        drop(daemon.join().unwrap());
    }

    #[test]
    fn read_after_loss_leaves_buffer_untouched() {
        let (left, right) = UnixStream::pair().unwrap();

        let daemon = thread::spawn(move || {
            let mut stream = left;
            let mut preamble = [0u8; SESSION_ID_WIDTH];
            stream.read_exact(&mut preamble).unwrap();
            stream.write_all(&[0x01, 0xAA, 0xBB]).unwrap();
        });

        let mut reader = SocketReader::new(SocketConfig::default());
        reader
            .connect_stream(SampleStream::from_unix(right), 1)
            .unwrap();
        daemon.join().unwrap();

        let mut buf = [0u8; 4];
        assert!(!reader.read(&mut buf));
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn drop_connection_is_idempotent() {
        let mut reader = SocketReader::new(SocketConfig::default());
        assert!(reader.drop_connection());
        assert!(reader.drop_connection());
        assert_eq!(reader.bytes_available(), 0);
    }

    #[test]
    fn subscription_is_cleared_on_drop_connection() {
        let mut reader = SocketReader::new(SocketConfig::default());
        reader.subscribe_readable();
        assert!(reader.is_subscribed());
        assert!(reader.drop_connection());
        assert!(!reader.is_subscribed());
    }

    #[test]
    fn wait_readable_requires_connection() {
        let reader = SocketReader::new(SocketConfig::default());
        let result = reader.wait_readable(Some(Duration::from_millis(1)));
        assert!(matches!(result, Err(SocketError::NotConnected)));
    }
}
