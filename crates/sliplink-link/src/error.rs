/// Errors that can occur in link-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// `send` named a next hop with no link registered for it.
    #[error("no link to next hop {0}")]
    AddressUnknown(String),

    /// The link set is inconsistent, e.g. one address maps to two lines.
    #[error("link configuration error: {0}")]
    Configuration(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sliplink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sliplink_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Error a datagram receiver may return. It is logged at the dispatch
/// boundary and never propagated back into the line.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
