use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::sync::{lock, read_guard, write_guard};
use crate::traits::{RawReceiver, SerialLine};

const READ_CHUNK_SIZE: usize = 8 * 1024;

type SharedReceiver = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A duplex byte stream that can be split into independent read and write
/// handles.
pub trait DuplexStream: Read + Write + Send + 'static {
    /// Create a second handle to the same underlying stream.
    fn try_clone_stream(&self) -> std::io::Result<Self>
    where
        Self: Sized;

    /// Shut the stream down so a blocked reader on another handle returns.
    fn shutdown_stream(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl DuplexStream for std::os::unix::net::UnixStream {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_stream(&self) -> std::io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }
}

impl DuplexStream for std::net::TcpStream {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_stream(&self) -> std::io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }
}

impl DuplexStream for std::fs::File {
    fn try_clone_stream(&self) -> std::io::Result<Self> {
        self.try_clone()
    }
}

/// Serial line over a duplex stream.
///
/// Incoming bytes are read on a dedicated thread, started when the first
/// receiver is registered, and handed to the receiver chunk by chunk in the
/// order they were read. Until then they wait in the stream itself, so nothing
/// is lost between connecting and wiring up the link.
pub struct StreamLine<S: DuplexStream> {
    writer: Mutex<S>,
    reader: Mutex<Option<S>>,
    shared: Arc<StreamShared>,
    label: String,
}

struct StreamShared {
    receiver: RwLock<Option<SharedReceiver>>,
    closed: AtomicBool,
}

impl<S: DuplexStream> StreamLine<S> {
    /// Wrap a stream.
    pub fn new(stream: S) -> Result<Self> {
        Self::with_label(stream, "stream")
    }

    /// Wrap a stream with a diagnostic label (used in logs and thread names).
    pub fn with_label(stream: S, label: impl Into<String>) -> Result<Self> {
        let reader = stream.try_clone_stream()?;
        Ok(Self {
            writer: Mutex::new(stream),
            reader: Mutex::new(Some(reader)),
            shared: Arc::new(StreamShared {
                receiver: RwLock::new(None),
                closed: AtomicBool::new(false),
            }),
            label: label.into(),
        })
    }

    /// Whether the remote end closed the stream or a read failed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn start_reader(&self) {
        let Some(stream) = lock(&self.reader).take() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let label = self.label.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("sliplink-rx-{label}"))
            .spawn(move || read_loop(stream, &shared, &label));

        if let Err(err) = spawned {
            warn!(label = %self.label, error = %err, "failed to start reader thread");
            self.shared.closed.store(true, Ordering::SeqCst);
        }
    }
}

fn read_loop<S: Read>(mut stream: S, shared: &StreamShared, label: &str) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                debug!(%label, "line closed by remote end");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(%label, error = %err, "line read failed");
                break;
            }
        };

        trace!(%label, size = read, "received raw bytes");
        let receiver = read_guard(&shared.receiver).clone();
        if let Some(receiver) = receiver {
            receiver(&chunk[..read]);
        }
    }
    shared.closed.store(true, Ordering::SeqCst);
}

impl<S: DuplexStream> SerialLine for StreamLine<S> {
    fn register_receiver(&self, receiver: RawReceiver) {
        *write_guard(&self.shared.receiver) = Some(Arc::from(receiver));
        self.start_reader();
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut writer = lock(&self.writer);
        let mut offset = 0usize;
        while offset < bytes.len() {
            match writer.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<S: DuplexStream> Drop for StreamLine<S> {
    fn drop(&mut self) {
        if let Err(err) = lock(&self.writer).shutdown_stream() {
            trace!(label = %self.label, error = %err, "shutdown on drop failed");
        }
    }
}

impl<S: DuplexStream> std::fmt::Debug for StreamLine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLine")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}
