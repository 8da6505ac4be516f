use std::num::NonZeroUsize;

use bytes::Bytes;
use sensorchan_socket::SocketReader;
use tracing::warn;

/// Upper bound on records accepted in one batch.
pub const MAX_BATCH_RECORDS: usize = 4096;

/// Read side of a channel's sample socket, as seen by a decoder.
pub trait SampleSource {
    /// Fill `buf` completely; `false` if the connection was lost first.
    fn read(&mut self, buf: &mut [u8]) -> bool;

    /// Read exactly `len` bytes.
    fn read_bytes(&mut self, len: usize) -> Option<Bytes>;

    /// Bytes readable without blocking.
    fn bytes_available(&self) -> usize;
}

impl SampleSource for SocketReader {
    fn read(&mut self, buf: &mut [u8]) -> bool {
        SocketReader::read(self, buf)
    }

    fn read_bytes(&mut self, len: usize) -> Option<Bytes> {
        SocketReader::read_bytes(self, len)
    }

    fn bytes_available(&self) -> usize {
        SocketReader::bytes_available(self)
    }
}

/// What a concrete sensor channel contributes to a session: its bus
/// interface name and the decoding of its sample records.
pub trait SampleDecoder {
    /// Fully qualified bus interface of the channel.
    fn interface_name(&self) -> &str;

    /// Consume records from `source`.
    ///
    /// Called while the socket has data. Returning `false` ends the current
    /// drain pass.
    fn data_received(&mut self, source: &mut dyn SampleSource) -> bool;
}

/// Decoder for channels that stream one fixed-size record at a time.
pub struct FixedRecordDecoder<F> {
    interface: String,
    record_size: NonZeroUsize,
    sink: F,
}

impl<F: FnMut(Bytes)> FixedRecordDecoder<F> {
    pub fn new(interface: impl Into<String>, record_size: NonZeroUsize, sink: F) -> Self {
        Self {
            interface: interface.into(),
            record_size,
            sink,
        }
    }
}

impl<F: FnMut(Bytes)> SampleDecoder for FixedRecordDecoder<F> {
    fn interface_name(&self) -> &str {
        &self.interface
    }

    fn data_received(&mut self, source: &mut dyn SampleSource) -> bool {
        match source.read_bytes(self.record_size.get()) {
            Some(record) => {
                (self.sink)(record);
                true
            }
            None => false,
        }
    }
}

/// Decoder for the batched layout: a native `u32` record count followed by
/// that many fixed-size records.
pub struct BatchDecoder<F> {
    interface: String,
    record_size: NonZeroUsize,
    sink: F,
}

impl<F: FnMut(Vec<Bytes>)> BatchDecoder<F> {
    pub fn new(interface: impl Into<String>, record_size: NonZeroUsize, sink: F) -> Self {
        Self {
            interface: interface.into(),
            record_size,
            sink,
        }
    }
}

impl<F: FnMut(Vec<Bytes>)> SampleDecoder for BatchDecoder<F> {
    fn interface_name(&self) -> &str {
        &self.interface
    }

    fn data_received(&mut self, source: &mut dyn SampleSource) -> bool {
        let mut header = [0u8; 4];
        if !source.read(&mut header) {
            return false;
        }
        let count = u32::from_ne_bytes(header) as usize;
        if count > MAX_BATCH_RECORDS {
            warn!(count, max = MAX_BATCH_RECORDS, "sample batch too large");
            return false;
        }

        let size = self.record_size.get();
        let Some(payload) = source.read_bytes(count * size) else {
            return false;
        };
        let records = (0..count)
            .map(|i| payload.slice(i * size..(i + 1) * size))
            .collect();
        (self.sink)(records);
        true
    }
}

/// Timestamped three-axis sample as laid out by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct XyzSample {
    /// Monotonic timestamp in microseconds.
    pub timestamp: u64,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl XyzSample {
    /// Record size on the wire, including 4 bytes of trailing padding.
    pub const SIZE: usize = 24;

    /// [`SIZE`](Self::SIZE) as a decoder record size.
    pub const RECORD_SIZE: NonZeroUsize = match NonZeroUsize::new(Self::SIZE) {
        Some(size) => size,
        None => panic!("xyz record size is zero"),
    };

    /// Decode one native-layout record.
    pub fn decode(record: &[u8]) -> Option<Self> {
        if record.len() < Self::SIZE {
            return None;
        }
        let word = |at: usize| -> Option<[u8; 4]> { record.get(at..at + 4)?.try_into().ok() };
        let timestamp = u64::from_ne_bytes(record.get(0..8)?.try_into().ok()?);
        Some(Self {
            timestamp,
            x: i32::from_ne_bytes(word(8)?),
            y: i32::from_ne_bytes(word(12)?),
            z: i32::from_ne_bytes(word(16)?),
        })
    }
}
