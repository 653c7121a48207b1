use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{encode_frame, FrameConfig, Reassembly};
use crate::error::FrameError;

/// SLIP codec for `tokio_util::codec::{FramedRead, FramedWrite, Framed}`.
///
/// Decoding follows the same rules as [`FrameDecoder`](crate::FrameDecoder):
/// empty frames are skipped, a frame longer than the cap is dropped with
/// [`FrameError::BufferOverflow`] and, if it was still open, input is
/// discarded until the next delimiter.
#[derive(Debug, Clone, Default)]
pub struct SlipCodec {
    guard: Reassembly,
}

impl SlipCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            guard: Reassembly::new(config.max_buffer_size),
        }
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.guard.next_datagram(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(datagram) = self.decode(src)? {
            return Ok(Some(datagram));
        }
        if !src.is_empty() {
            debug!(size = src.len(), "dropping unterminated frame at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

impl Encoder<&[u8]> for SlipCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst);
        Ok(())
    }
}
