//! SLIP (RFC 1055) link layer for serial-like byte streams.
//!
//! sliplink turns an unreliable-boundary byte stream (a serial port, a
//! pseudo-terminal, a Unix socket) into a datagram link, and multiplexes
//! several such links behind one interface routed by next-hop address.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream endpoints implementing `SerialLine`
//! - [`frame`]: SLIP encoding, decoding and incremental reassembly
//! - [`link`]: `Link` (one line) and `LinkLayer` (routed set of lines)
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use sliplink::link::Link;
//! use sliplink::transport::MemoryLine;
//!
//! let (near, far) = MemoryLine::pair();
//! let sender = Link::new(Arc::new(near));
//! let receiver = Link::new(Arc::new(far));
//!
//! let got = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&got);
//! receiver.register_receiver(move |datagram| {
//!     sink.lock().unwrap().push(datagram);
//!     Ok(())
//! });
//!
//! sender.send(b"\xC0 needs escaping")?;
//! assert_eq!(got.lock().unwrap()[0].as_ref(), b"\xC0 needs escaping");
//! # Ok::<(), sliplink::link::LinkError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use sliplink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sliplink_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use sliplink_link::*;
}

pub use sliplink_link::{Link, LinkError, LinkLayer};
