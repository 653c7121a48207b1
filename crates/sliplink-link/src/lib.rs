//! SLIP (RFC 1055) link layer.
//!
//! A [`Link`] owns one [`SerialLine`](sliplink_transport::SerialLine): it
//! frames outgoing datagrams and reassembles incoming ones from arbitrarily
//! fragmented byte chunks. A [`LinkLayer`] keys several links by next-hop
//! address, routes sends to the right one and merges everything received
//! into a single upward receiver.
//!
//! ```
//! use std::sync::Arc;
//! use sliplink_link::LinkLayer;
//! use sliplink_transport::{MemoryLine, SerialLine};
//!
//! let (near, far) = MemoryLine::pair();
//! let layer = LinkLayer::new([("peer", Arc::new(near) as Arc<dyn SerialLine>)])?;
//! layer.send(b"hello", &"peer")?;
//! # let _ = far;
//! # Ok::<(), sliplink_link::LinkError>(())
//! ```

pub mod error;
pub mod layer;
pub mod link;

mod sync;

pub use error::{CallbackError, LinkError, Result};
pub use layer::LinkLayer;
pub use link::{Link, LinkStats};
