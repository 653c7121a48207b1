use std::path::PathBuf;

/// Errors raised by serial-line endpoints.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be created at `path`.
    #[error("cannot bind socket {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No listener answered at `path`.
    #[error("cannot connect to socket {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("accept on listening socket failed: {0}")]
    Accept(std::io::Error),

    /// Reading from or writing to the line failed.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `sockaddr_un.sun_path` cannot hold the path.
    #[error("socket path {path} is {len} bytes; the platform limit is {max}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A pseudo-terminal system call failed.
    #[error("pty {op} failed: {source}")]
    Pty {
        op: &'static str,
        source: std::io::Error,
    },

    /// The remote end hung up, or a read failed and the line stopped.
    #[error("line closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
