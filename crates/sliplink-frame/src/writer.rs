use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, DEFAULT_INITIAL_CAPACITY};
use crate::error::{FrameError, Result};

/// Writes SLIP frames to any `Write` stream.
///
/// Each call encodes into an internal buffer and hands it to the stream in as
/// few writes as the stream allows, then flushes.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_INITIAL_CAPACITY),
            frames_written: 0,
        }
    }

    /// Encode and send one datagram (blocking).
    pub fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(datagram, &mut self.buf);
        self.write_buffer()?;
        self.frames_written += 1;
        self.flush()
    }

    /// Encode several datagrams back to back and send them together.
    ///
    /// Returns the number of frames written.
    pub fn send_all<I, D>(&mut self, datagrams: I) -> Result<usize>
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        self.buf.clear();
        let mut count = 0usize;
        for datagram in datagrams {
            encode_frame(datagram.as_ref(), &mut self.buf);
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }
        self.write_buffer()?;
        self.frames_written += count as u64;
        self.flush()?;
        Ok(count)
    }

    fn write_buffer(&mut self) -> Result<()> {
        let mut pending = &self.buf[..];
        while !pending.is_empty() {
            match self.inner.write(pending) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => pending = &pending[n..],
                Err(err) if is_retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if is_retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Frames fully handed to the stream so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn is_retryable(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn writes_exact_wire_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"\xC0\xDB").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, vec![0xC0, 0xDB, 0xDC, 0xDB, 0xDD, 0xC0]);
    }

    #[test]
    fn consecutive_sends_are_independent_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"one").unwrap();
        writer.send(b"").unwrap();
        writer.send(b"two").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"\xC0one\xC0\xC0\xC0\xC0two\xC0");
    }

    #[test]
    fn send_all_batches_into_one_stream() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let sent = writer.send_all([&b"a"[..], b"\xDB", b"c"]).unwrap();

        assert_eq!(sent, 3);
        assert_eq!(writer.frames_written(), 3);
        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"\xC0a\xC0\xC0\xDB\xDD\xC0\xC0c\xC0");
    }

    #[test]
    fn send_all_with_nothing_writes_nothing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(writer.send_all(Vec::<Vec<u8>>::new()).unwrap(), 0);
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block() {
        let mut writer = FrameWriter::new(FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        });
        writer.send(b"retry").unwrap();
        assert_eq!(writer.get_ref().data, b"\xC0retry\xC0");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut writer = FrameWriter::new(FlakyWriter {
            failures: vec![ErrorKind::BrokenPipe],
            data: Vec::new(),
        });
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"z\xC0").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = crate::reader::FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_datagram().unwrap().as_ref(), b"z\xC0");
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails once with each listed kind, in order, then accepts everything.
    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.failures.is_empty() {
                return Err(std::io::Error::from(self.failures.remove(0)));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
