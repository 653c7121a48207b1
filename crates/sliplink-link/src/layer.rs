use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use sliplink_frame::FrameConfig;
use sliplink_transport::SerialLine;
use tracing::{debug, trace};

use crate::error::{CallbackError, LinkError, Result};
use crate::link::{Link, SharedReceiver};
use crate::sync::{read_guard, write_guard};

/// A set of links keyed by next-hop address, with one merged upward receiver.
///
/// Outbound datagrams are routed to the link registered for the next hop.
/// Inbound datagrams from every link reach the same receiver; which link a
/// datagram arrived on is not reported.
pub struct LinkLayer<A> {
    links: HashMap<A, Link>,
    dispatch: Arc<MergedDispatch>,
    config: FrameConfig,
}

#[derive(Default)]
struct MergedDispatch {
    receiver: RwLock<Option<SharedReceiver>>,
    unclaimed: AtomicU64,
}

impl MergedDispatch {
    fn deliver(&self, datagram: Bytes) -> std::result::Result<(), CallbackError> {
        let receiver = read_guard(&self.receiver).clone();
        match receiver {
            Some(receiver) => receiver(datagram),
            None => {
                self.unclaimed.fetch_add(1, Ordering::Relaxed);
                trace!(size = datagram.len(), "no upper-layer receiver; dropping datagram");
                Ok(())
            }
        }
    }
}

impl<A> LinkLayer<A>
where
    A: Eq + Hash + Clone + fmt::Display,
{
    /// Build one link per `(next_hop, line)` pair.
    ///
    /// Fails with [`LinkError::Configuration`] if a next hop appears twice.
    pub fn new<I>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, Arc<dyn SerialLine>)>,
    {
        Self::with_config(lines, FrameConfig::default())
    }

    /// Like [`new`](Self::new), applying `config` to every link.
    pub fn with_config<I>(lines: I, config: FrameConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (A, Arc<dyn SerialLine>)>,
    {
        let mut layer = Self {
            links: HashMap::new(),
            dispatch: Arc::new(MergedDispatch::default()),
            config,
        };
        for (next_hop, line) in lines {
            layer.add_link(next_hop, line)?;
        }
        debug!(links = layer.links.len(), "link layer ready");
        Ok(layer)
    }

    /// Install the upward receiver, replacing any previous one.
    ///
    /// Datagrams decoded before a receiver is registered are dropped.
    pub fn register_receiver<F>(&self, receiver: F)
    where
        F: Fn(Bytes) -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
    {
        *write_guard(&self.dispatch.receiver) = Some(Arc::new(receiver));
    }

    /// Send `datagram` over the link registered for `next_hop`.
    pub fn send(&self, datagram: &[u8], next_hop: &A) -> Result<()> {
        let link = self
            .links
            .get(next_hop)
            .ok_or_else(|| LinkError::AddressUnknown(next_hop.to_string()))?;
        link.send(datagram)
    }

    /// Attach another line under `next_hop`.
    pub fn add_link(&mut self, next_hop: A, line: Arc<dyn SerialLine>) -> Result<()> {
        if self.links.contains_key(&next_hop) {
            return Err(LinkError::Configuration(format!(
                "duplicate next hop {next_hop}"
            )));
        }

        let dispatch = Arc::clone(&self.dispatch);
        let link = Link::labelled(
            line,
            self.config.clone(),
            next_hop.to_string(),
            Some(Arc::new(move |datagram| dispatch.deliver(datagram))),
        );

        debug!(next_hop = %next_hop, "link added");
        self.links.insert(next_hop, link);
        Ok(())
    }

    /// Detach the link for `next_hop`.
    ///
    /// The returned link no longer feeds the merged receiver.
    pub fn remove_link(&mut self, next_hop: &A) -> Option<Link> {
        let link = self.links.remove(next_hop)?;
        link.clear_receiver();
        debug!(next_hop = %next_hop, "link removed");
        Some(link)
    }

    /// The link registered for `next_hop`, if any.
    pub fn link(&self, next_hop: &A) -> Option<&Link> {
        self.links.get(next_hop)
    }

    /// Registered next-hop addresses, in no particular order.
    pub fn addresses(&self) -> impl Iterator<Item = &A> {
        self.links.keys()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Datagrams dropped because no upward receiver was registered.
    pub fn unclaimed(&self) -> u64 {
        self.dispatch.unclaimed.load(Ordering::Relaxed)
    }
}

impl<A: fmt::Debug> fmt::Debug for LinkLayer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkLayer")
            .field("links", &self.links.keys().collect::<Vec<_>>())
            .finish()
    }
}
