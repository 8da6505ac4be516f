use std::io::{Read, Write};
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SocketError};

/// Readiness reported by [`SampleStream::wait_readable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Bytes are waiting to be read.
    Readable,
    /// The daemon hung up and nothing is left to read.
    Hangup,
    /// The wait elapsed without any event.
    Timeout,
}

/// A connected stream to the daemon's sample endpoint.
///
/// Implements `Read + Write` and adds the non-blocking queries the
/// channel needs: pending byte count and readiness polling.
pub struct SampleStream {
    inner: UnixStream,
}

impl SampleStream {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    pub const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    pub const MAX_PATH_LEN: usize = 104;

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(SocketError::PathTooLong {
                path: path.to_path_buf(),
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let inner = UnixStream::connect(path).map_err(|e| SocketError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to sample socket");
        Ok(Self { inner })
    }

    /// Wrap an already connected stream.
    pub fn from_unix(inner: UnixStream) -> Self {
        Self { inner }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Number of bytes that can be read without blocking.
    pub fn bytes_available(&self) -> Result<usize> {
        let mut pending: libc::c_int = 0;

        // SAFETY: `pending` is a valid writable c_int and the descriptor is an
        // open socket owned by this stream.
        let rc = unsafe { libc::ioctl(self.inner.as_raw_fd(), libc::FIONREAD, &mut pending) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        Ok(usize::try_from(pending).unwrap_or(0))
    }

    /// Block until the stream becomes readable, the peer hangs up, or
    /// `timeout` elapses. `None` waits indefinitely.
    pub fn wait_readable(&self, timeout: Option<Duration>) -> Result<Readiness> {
        let timeout_ms = match timeout {
            Some(t) => libc::c_int::try_from(t.as_millis()).unwrap_or(libc::c_int::MAX),
            None => -1,
        };

        let mut fds = libc::pollfd {
            fd: self.inner.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            // SAFETY: `fds` points at exactly one initialized pollfd.
            let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }
            if rc == 0 {
                return Ok(Readiness::Timeout);
            }
            break;
        }

        if fds.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) == 0 {
            return Ok(Readiness::Timeout);
        }

        // POLLIN with nothing pending means end of stream.
        if self.bytes_available()? > 0 {
            Ok(Readiness::Readable)
        } else {
            Ok(Readiness::Hangup)
        }
    }

    /// Close the descriptor, reporting any error from `close(2)`.
    pub fn close(self) -> Result<()> {
        let fd = self.inner.into_raw_fd();

        // SAFETY: `fd` was just released from the UnixStream, so this is the
        // only owner and it is closed exactly once.
        let rc = unsafe { libc::close(fd) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl Read for SampleStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SampleStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for SampleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStream")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_available_tracks_pending_data() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut writer = SampleStream::from_unix(left);
        let reader = SampleStream::from_unix(right);

        assert_eq!(reader.bytes_available().unwrap(), 0);
        writer.write_all(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(reader.bytes_available().unwrap(), 5);
    }

    #[test]
    fn wait_readable_times_out_on_idle_stream() {
        let (_left, right) = UnixStream::pair().unwrap();
        let reader = SampleStream::from_unix(right);

        let readiness = reader
            .wait_readable(Some(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(readiness, Readiness::Timeout);
    }

    #[test]
    fn wait_readable_reports_data_then_hangup() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut writer = SampleStream::from_unix(left);
        let mut reader = SampleStream::from_unix(right);

        writer.write_all(b"xy").unwrap();
        assert_eq!(
            reader.wait_readable(Some(Duration::from_secs(1))).unwrap(),
            Readiness::Readable
        );

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        drop(writer);

        assert_eq!(
            reader.wait_readable(Some(Duration::from_secs(1))).unwrap(),
            Readiness::Hangup
        );
    }

    #[test]
    fn connect_rejects_long_path() {
        let long_path = "/tmp/".to_string() + &"s".repeat(200) + ".sock";
        let result = SampleStream::connect(&long_path);
        assert!(matches!(result, Err(SocketError::PathTooLong { .. })));
    }

    #[test]
    fn connect_to_missing_socket_fails() {
        let missing = std::env::temp_dir().join(format!(
            "sensorchan-missing-{}.sock",
            std::process::id()
        ));
        let result = SampleStream::connect(&missing);
        assert!(matches!(result, Err(SocketError::Connect { .. })));
    }

    #[test]
    fn close_succeeds_once() {
        let (_left, right) = UnixStream::pair().unwrap();
        let stream = SampleStream::from_unix(right);
        stream.close().unwrap();
    }
}
