use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::sync::{lock, read_guard, write_guard};
use crate::traits::{RawReceiver, SerialLine};

type SharedReceiver = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// In-process serial line.
///
/// A standalone line records every chunk passed to [`SerialLine::send`] and
/// accepts bytes from the test side through [`MemoryLine::inject`]. Two lines
/// created by [`MemoryLine::pair`] are cross-connected: bytes sent on one are
/// delivered synchronously to the other's receiver.
///
/// Cloning yields another handle to the same line.
#[derive(Clone)]
pub struct MemoryLine {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    label: String,
    receiver: RwLock<Option<SharedReceiver>>,
    sent: Mutex<Vec<Vec<u8>>>,
    peer: RwLock<Option<Weak<MemoryInner>>>,
    closed: AtomicBool,
}

impl MemoryLine {
    /// Create an unconnected line.
    pub fn new() -> Self {
        Self::with_label("memory")
    }

    /// Create an unconnected line with a diagnostic label.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                label: label.into(),
                receiver: RwLock::new(None),
                sent: Mutex::new(Vec::new()),
                peer: RwLock::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Create two cross-connected lines.
    pub fn pair() -> (Self, Self) {
        let left = Self::with_label("memory-left");
        let right = Self::with_label("memory-right");
        *write_guard(&left.inner.peer) = Some(Arc::downgrade(&right.inner));
        *write_guard(&right.inner.peer) = Some(Arc::downgrade(&left.inner));
        (left, right)
    }

    /// Deliver raw bytes to this line's receiver as if they came off the wire.
    ///
    /// Bytes injected while no receiver is registered are dropped.
    pub fn inject(&self, bytes: &[u8]) {
        self.inner.deliver(bytes);
    }

    /// Every chunk sent on this line so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.sent).clone()
    }

    /// All bytes sent so far, concatenated, clearing the record.
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut *lock(&self.inner.sent)).concat()
    }

    /// Whether a receiver has been registered.
    pub fn has_receiver(&self) -> bool {
        read_guard(&self.inner.receiver).is_some()
    }

    /// Mark the line closed; further sends fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Diagnostic label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl Default for MemoryLine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn deliver(&self, bytes: &[u8]) {
        let receiver = read_guard(&self.receiver).clone();
        match receiver {
            Some(receiver) => receiver(bytes),
            None => trace!(
                label = %self.label,
                size = bytes.len(),
                "no receiver registered; dropping bytes"
            ),
        }
    }
}

impl SerialLine for MemoryLine {
    fn register_receiver(&self, receiver: RawReceiver) {
        *write_guard(&self.inner.receiver) = Some(Arc::from(receiver));
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        lock(&self.inner.sent).push(bytes.to_vec());

        let peer = read_guard(&self.inner.peer)
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(peer) = peer {
            peer.deliver(bytes);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLine")
            .field("label", &self.inner.label)
            .finish()
    }
}
