use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::{FrameError, Result};

/// Frame delimiter.
pub const END: u8 = 0xC0;

/// Escape byte.
pub const ESC: u8 = 0xDB;

/// Follows [`ESC`] to stand for a literal [`END`] inside a payload.
pub const ESC_END: u8 = 0xDC;

/// Follows [`ESC`] to stand for a literal [`ESC`] inside a payload.
pub const ESC_ESC: u8 = 0xDD;

/// Number of bytes `datagram` occupies on the wire, delimiters included.
pub fn encoded_len(datagram: &[u8]) -> usize {
    let specials = datagram.iter().filter(|&&b| b == END || b == ESC).count();
    datagram.len() + specials + 2
}

/// Append the escaped form of `payload` to `dst`, without delimiters.
///
/// Every [`ESC`] becomes `ESC ESC_ESC` and every [`END`] becomes
/// `ESC ESC_END`. Working byte by byte means an escape introduced for a
/// delimiter is never escaped a second time.
pub fn escape_into(payload: &[u8], dst: &mut BytesMut) {
    let mut rest = payload;
    while let Some(pos) = rest.iter().position(|&b| b == END || b == ESC) {
        dst.put_slice(&rest[..pos]);
        let escaped = if rest[pos] == END { ESC_END } else { ESC_ESC };
        dst.put_slice(&[ESC, escaped]);
        rest = &rest[pos + 1..];
    }
    dst.put_slice(rest);
}

/// Encode a datagram into its wire frame.
///
/// Wire format:
/// ```text
/// ┌──────┬────────────────────────────┬──────┐
/// │ 0xC0 │ escaped payload (0..n B)   │ 0xC0 │
/// └──────┴────────────────────────────┴──────┘
/// ```
///
/// An empty datagram encodes to two back-to-back delimiters, which a decoder
/// treats as padding rather than as a datagram.
pub fn encode_frame(datagram: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(datagram));
    dst.put_u8(END);
    escape_into(datagram, dst);
    dst.put_u8(END);
}

/// Reverse [`escape_into`].
///
/// `ESC ESC_END` yields [`END`] and `ESC ESC_ESC` yields [`ESC`]. An [`ESC`]
/// followed by anything else, or at the very end, is kept verbatim and the
/// following byte is processed normally; malformed input is passed through,
/// never dropped.
pub fn unescape(escaped: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.iter().position(|&b| b == ESC) {
        out.put_slice(&rest[..pos]);
        match rest.get(pos + 1) {
            Some(&ESC_END) => {
                out.put_u8(END);
                rest = &rest[pos + 2..];
            }
            Some(&ESC_ESC) => {
                out.put_u8(ESC);
                rest = &rest[pos + 2..];
            }
            _ => {
                out.put_u8(ESC);
                rest = &rest[pos + 1..];
            }
        }
    }
    out.put_slice(rest);
    out.freeze()
}

/// Decode the next datagram from a reassembly buffer.
///
/// Returns `None` once no delimiter is left in `src`; the remaining bytes are
/// a partial frame and stay buffered. Empty candidates (a frame's leading
/// delimiter, or runs of consecutive delimiters) are consumed silently.
pub fn decode_frame(src: &mut BytesMut) -> Option<Bytes> {
    split_frame(src).map(|raw| unescape(&raw))
}

/// Split the next non-empty escaped frame off `src`, consuming its closing
/// delimiter.
fn split_frame(src: &mut BytesMut) -> Option<BytesMut> {
    loop {
        let pos = src.iter().position(|&b| b == END)?;
        let candidate = src.split_to(pos);
        src.advance(1);
        if !candidate.is_empty() {
            return Some(candidate);
        }
    }
}

/// Cap enforcement and resynchronisation shared by every decoder in this
/// crate.
///
/// A frame whose escaped length exceeds the cap is dropped with
/// [`FrameError::BufferOverflow`], whether it arrived closed or is still
/// growing. An open frame that is dropped puts the guard into discard mode
/// until the next delimiter.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reassembly {
    max: Option<usize>,
    discarding: bool,
    discarded_bytes: u64,
    overflows: u64,
}

impl Reassembly {
    pub(crate) fn new(max: Option<usize>) -> Self {
        Self {
            max,
            ..Self::default()
        }
    }

    /// How many leading bytes of `input` belong to a dropped frame.
    ///
    /// Leaves discard mode when a delimiter is found; the delimiter itself is
    /// kept.
    pub(crate) fn skip_discarded(&mut self, input: &[u8]) -> usize {
        if !self.discarding {
            return 0;
        }
        match input.iter().position(|&b| b == END) {
            Some(pos) => {
                self.discarding = false;
                self.discarded_bytes += pos as u64;
                debug!(dropped = pos, "resynchronised on delimiter after overflow");
                pos
            }
            None => {
                self.discarded_bytes += input.len() as u64;
                input.len()
            }
        }
    }

    /// Pull the next datagram out of `src`, applying the cap.
    ///
    /// After an overflow `src` still holds whatever followed the dropped
    /// frame, so the caller may keep pulling.
    pub(crate) fn next_datagram(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if self.discarding {
            let skip = self.skip_discarded(&src[..]);
            src.advance(skip);
            if self.discarding {
                return Ok(None);
            }
        }

        if let Some(raw) = split_frame(src) {
            return match self.max {
                Some(max) if raw.len() > max => Err(self.overflow(raw.len(), max)),
                _ => Ok(Some(unescape(&raw))),
            };
        }

        match self.max {
            Some(max) if src.len() > max => {
                let size = src.len();
                src.clear();
                self.discarding = true;
                Err(self.overflow(size, max))
            }
            _ => Ok(None),
        }
    }

    fn overflow(&mut self, size: usize, max: usize) -> FrameError {
        warn!(size, max, "frame exceeds reassembly cap; discarding");
        self.discarded_bytes += size as u64;
        self.overflows += 1;
        FrameError::BufferOverflow { size, max }
    }

    pub(crate) fn is_discarding(&self) -> bool {
        self.discarding
    }

    pub(crate) fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    pub(crate) fn overflows(&self) -> u64 {
        self.overflows
    }

    pub(crate) fn reset(&mut self) {
        self.discarding = false;
    }
}

/// Configuration for frame reassembly.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Upper bound on the escaped length of one frame, delimiters excluded.
    /// Longer frames are dropped whether they arrive closed or are still
    /// being buffered. `None` (the default) imposes no limit.
    pub max_buffer_size: Option<usize>,
    /// Initial capacity of the reassembly buffer.
    pub initial_capacity: usize,
}

/// Default initial reassembly buffer capacity: 2 KiB.
pub const DEFAULT_INITIAL_CAPACITY: usize = 2 * 1024;

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: None,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl FrameConfig {
    /// Configuration with a reassembly cap.
    pub fn with_max_buffer_size(max: usize) -> Self {
        Self {
            max_buffer_size: Some(max),
            ..Self::default()
        }
    }
}
