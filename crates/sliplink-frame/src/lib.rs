//! SLIP (RFC 1055) framing for byte-stream links.
//!
//! Every datagram goes on the wire as `END · escaped(datagram) · END`:
//! - `END` (0xC0) delimits frames; runs of delimiters are padding
//! - `ESC` (0xDB) introduces `ESC_END` (0xDC) for a literal 0xC0 and
//!   `ESC_ESC` (0xDD) for a literal 0xDB
//!
//! [`FrameDecoder`] turns an arbitrarily fragmented byte stream back into
//! datagrams. [`FrameReader`] and [`FrameWriter`] do the same over blocking
//! `Read`/`Write` streams, and with the `async` feature [`SlipCodec`] plugs
//! into `tokio_util::codec`.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_frame, encode_frame, encoded_len, escape_into, unescape, FrameConfig,
    DEFAULT_INITIAL_CAPACITY, END, ESC, ESC_END, ESC_ESC,
};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
