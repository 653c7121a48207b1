use crate::error::Result;

/// Callback invoked with every chunk of raw bytes a line receives.
///
/// Chunks carry no framing guarantees: a chunk may hold part of a frame,
/// several frames, or anything in between.
pub type RawReceiver = Box<dyn Fn(&[u8]) + Send + Sync>;

/// A byte-stream endpoint ("serial line").
///
/// Exactly two operations are assumed of a line: registering the receiver
/// for incoming raw bytes, and fire-and-forget transmission of raw bytes.
pub trait SerialLine: Send + Sync {
    /// Install the receiver for incoming bytes.
    ///
    /// There is a single slot: the most recent registration replaces any
    /// previous receiver.
    fn register_receiver(&self, receiver: RawReceiver);

    /// Transmit raw bytes.
    fn send(&self, bytes: &[u8]) -> Result<()>;
}

impl<L: SerialLine + ?Sized> SerialLine for std::sync::Arc<L> {
    fn register_receiver(&self, receiver: RawReceiver) {
        (**self).register_receiver(receiver)
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }
}
