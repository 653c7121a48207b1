use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::codec::FrameConfig;
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete datagrams from any SLIP-framed `Read` stream.
///
/// Handles partial reads internally; callers always get whole datagrams.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::with_config(config),
        }
    }

    /// Read the next complete datagram (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A frame
    /// cut off by EOF is never returned.
    pub fn read_datagram(&mut self) -> Result<Bytes> {
        loop {
            if let Some(datagram) = self.decoder.next_datagram()? {
                return Ok(datagram);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Bytes of an unfinished frame currently buffered.
    pub fn pending(&self) -> usize {
        self.decoder.pending()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.decoder.config()
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Bytes>;

    /// Yields datagrams until the stream ends cleanly.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_datagram() {
            Ok(datagram) => Some(Ok(datagram)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
