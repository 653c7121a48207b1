use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bytes::{Bytes, BytesMut};
use sliplink_frame::{encode_frame, encoded_len, FrameConfig, FrameDecoder};
use sliplink_transport::SerialLine;
use tracing::{error, trace, warn};

use crate::error::{CallbackError, Result};
use crate::sync::{lock, read_guard, write_guard};

pub(crate) type SharedReceiver =
    Arc<dyn Fn(Bytes) -> std::result::Result<(), CallbackError> + Send + Sync>;

/// One physical connection: SLIP framing on the way out, reassembly on the
/// way in.
///
/// Construction registers the link's decode entry point as the line's raw
/// receiver. Every complete datagram is handed to the link's receiver exactly
/// once, regardless of how the line chops up or coalesces the byte stream.
pub struct Link {
    line: Arc<dyn SerialLine>,
    shared: Arc<LinkShared>,
}

struct LinkShared {
    label: String,
    inbound: Mutex<Inbound>,
    receiver: RwLock<Option<SharedReceiver>>,
    counters: Counters,
}

/// Reassembly state plus the datagrams decoded but not yet handed up.
///
/// Only one caller delivers at a time; `delivering` marks it. Anyone else
/// appends to `queue` and leaves, so datagrams go up in arrival order even
/// when chunks arrive concurrently or from inside a receiver.
struct Inbound {
    decoder: FrameDecoder,
    queue: VecDeque<Bytes>,
    delivering: bool,
}

#[derive(Default)]
struct Counters {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    datagrams_delivered: AtomicU64,
    datagrams_unclaimed: AtomicU64,
    callback_failures: AtomicU64,
}

/// Point-in-time counters for one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames handed to the line.
    pub frames_sent: u64,
    /// Wire bytes handed to the line, delimiters and escapes included.
    pub bytes_sent: u64,
    /// Datagrams the receiver accepted.
    pub datagrams_delivered: u64,
    /// Datagrams decoded while no receiver was registered.
    pub datagrams_unclaimed: u64,
    /// Datagrams whose receiver returned an error or panicked.
    pub callback_failures: u64,
    /// Times the reassembly cap was exceeded.
    pub overflows: u64,
    /// Bytes dropped because of those overflows.
    pub bytes_discarded: u64,
}

impl Link {
    /// Bind a link to a line with default (unbounded) reassembly.
    pub fn new(line: Arc<dyn SerialLine>) -> Self {
        Self::with_config(line, FrameConfig::default())
    }

    /// Bind a link to a line with explicit reassembly configuration.
    pub fn with_config(line: Arc<dyn SerialLine>, config: FrameConfig) -> Self {
        Self::labelled(line, config, "link", None)
    }

    /// Bind a link with its receiver already in place.
    ///
    /// Lines that start reading as soon as they are bound (socket and pty
    /// lines) can deliver before a later `register_receiver` call lands;
    /// installing the receiver here closes that window.
    pub fn with_receiver<F>(line: Arc<dyn SerialLine>, config: FrameConfig, receiver: F) -> Self
    where
        F: Fn(Bytes) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self::labelled(line, config, "link", Some(Arc::new(receiver)))
    }

    pub(crate) fn labelled(
        line: Arc<dyn SerialLine>,
        config: FrameConfig,
        label: impl Into<String>,
        receiver: Option<SharedReceiver>,
    ) -> Self {
        let shared = Arc::new(LinkShared {
            label: label.into(),
            inbound: Mutex::new(Inbound {
                decoder: FrameDecoder::with_config(config),
                queue: VecDeque::new(),
                delivering: false,
            }),
            receiver: RwLock::new(receiver),
            counters: Counters::default(),
        });

        let inbound = Arc::clone(&shared);
        line.register_receiver(Box::new(move |chunk| inbound.on_raw_bytes(chunk)));

        Self { line, shared }
    }

    /// Install the receiver for decoded datagrams, replacing any previous one.
    ///
    /// A receiver error or panic is logged and counted; it never stops the
    /// link from delivering the datagrams that follow.
    pub fn register_receiver<F>(&self, receiver: F)
    where
        F: Fn(Bytes) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        *write_guard(&self.shared.receiver) = Some(Arc::new(receiver));
    }

    /// Remove the receiver; datagrams decoded afterwards are dropped.
    pub fn clear_receiver(&self) {
        *write_guard(&self.shared.receiver) = None;
    }

    /// Frame `datagram` and hand it to the line.
    ///
    /// Any length is accepted, including zero.
    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        let mut frame = BytesMut::with_capacity(encoded_len(datagram));
        encode_frame(datagram, &mut frame);
        self.line.send(&frame)?;

        let counters = &self.shared.counters;
        counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        counters
            .bytes_sent
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
        trace!(link = %self.shared.label, size = datagram.len(), wire = frame.len(), "sent frame");
        Ok(())
    }

    /// Feed raw bytes as if the line had just received them.
    ///
    /// The line calls this on its own; it is public for hosts that pump bytes
    /// into the link themselves. If another call is already delivering, the
    /// datagrams completed here are queued behind its own and delivered by
    /// that call, so this may return before they reach the receiver.
    pub fn on_raw_bytes(&self, chunk: &[u8]) {
        self.shared.on_raw_bytes(chunk);
    }

    /// Bytes buffered for a frame that has not been closed yet.
    pub fn pending(&self) -> usize {
        lock(&self.shared.inbound).decoder.pending()
    }

    /// Diagnostic label (the next-hop address when owned by a `LinkLayer`).
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Snapshot of this link's counters.
    pub fn stats(&self) -> LinkStats {
        let counters = &self.shared.counters;
        let (overflows, bytes_discarded) = {
            let inbound = lock(&self.shared.inbound);
            (inbound.decoder.overflows(), inbound.decoder.discarded_bytes())
        };
        LinkStats {
            frames_sent: counters.frames_sent.load(Ordering::Relaxed),
            bytes_sent: counters.bytes_sent.load(Ordering::Relaxed),
            datagrams_delivered: counters.datagrams_delivered.load(Ordering::Relaxed),
            datagrams_unclaimed: counters.datagrams_unclaimed.load(Ordering::Relaxed),
            callback_failures: counters.callback_failures.load(Ordering::Relaxed),
            overflows,
            bytes_discarded,
        }
    }
}

impl LinkShared {
    fn on_raw_bytes(&self, chunk: &[u8]) {
        {
            let mut inbound = lock(&self.inbound);
            let mut ready = Vec::new();
            if let Err(err) = inbound.decoder.decode(chunk, &mut ready) {
                warn!(link = %self.label, error = %err, "dropped oversized frame");
            }
            inbound.queue.extend(ready);
            if inbound.delivering {
                return;
            }
            inbound.delivering = true;
        }

        // The lock is released around each dispatch so the receiver can
        // send, or feed this link again.
        loop {
            let next = {
                let mut inbound = lock(&self.inbound);
                let next = inbound.queue.pop_front();
                if next.is_none() {
                    inbound.delivering = false;
                }
                next
            };
            match next {
                Some(datagram) => self.dispatch(datagram),
                None => return,
            }
        }
    }

    fn dispatch(&self, datagram: Bytes) {
        let receiver = read_guard(&self.receiver).clone();
        let Some(receiver) = receiver else {
            self.counters
                .datagrams_unclaimed
                .fetch_add(1, Ordering::Relaxed);
            trace!(link = %self.label, size = datagram.len(), "no receiver; dropping datagram");
            return;
        };

        let size = datagram.len();
        trace!(link = %self.label, size, "delivering datagram");
        match panic::catch_unwind(AssertUnwindSafe(|| receiver(datagram))) {
            Ok(Ok(())) => {
                self.counters
                    .datagrams_delivered
                    .fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                self.counters.callback_failures.fetch_add(1, Ordering::Relaxed);
                error!(link = %self.label, size, error = %err, "datagram receiver failed");
            }
            Err(payload) => {
                self.counters.callback_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    link = %self.label,
                    size,
                    panic = panic_message(payload.as_ref()),
                    "datagram receiver panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("label", &self.shared.label)
            .field("pending", &self.pending())
            .finish()
    }
}
