//! Byte-stream endpoints for the sliplink link layer.
//!
//! A [`SerialLine`] is the lowest layer of sliplink: an unbounded,
//! order-preserving byte stream that can deliver received chunks to a single
//! registered receiver and transmit raw bytes. Nothing here knows about
//! framing; chunks arrive split or coalesced however the medium likes.
//!
//! Provided endpoints:
//! - [`MemoryLine`]: in-process line for tests and loopback wiring
//! - [`StreamLine`]: any duplex `Read + Write` stream driven by a reader thread
//! - [`UnixDomainSocket`]: bind/accept/connect producing stream lines (Unix)
//! - [`PtyLine`]: pseudo-terminal master in raw mode (Linux)

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

mod sync;

#[cfg(target_os = "linux")]
pub mod pty;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryLine;
pub use stream::{DuplexStream, StreamLine};
pub use traits::{RawReceiver, SerialLine};

#[cfg(target_os = "linux")]
pub use pty::PtyLine;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
