//! SLIP echo server over a Unix socket.
//!
//! Run with:
//!   cargo run -p sliplink --example uds-echo
//!
//! In another terminal:
//!   cargo run -p sliplink --features cli -- send \
//!     --route 10.0.0.1=/tmp/sliplink-echo-<pid>/echo.sock \
//!     --next-hop 10.0.0.1 --data hello

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;
    use std::sync::{mpsc, Arc};

    use sliplink::frame::FrameConfig;
    use sliplink::transport::UnixDomainSocket;
    use sliplink::Link;

    let sock_dir = std::env::temp_dir().join(format!("sliplink-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let socket = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    loop {
        let line = Arc::new(socket.accept()?);
        eprintln!("Peer connected");

        let (tx, rx) = mpsc::channel();
        let link = Link::with_receiver(
            line.clone(),
            FrameConfig::with_max_buffer_size(64 * 1024),
            move |datagram| Ok(tx.send(datagram)?),
        );

        while !line.is_closed() {
            let Ok(datagram) = rx.recv_timeout(std::time::Duration::from_millis(200)) else {
                continue;
            };
            eprintln!("Received {} bytes", datagram.len());
            if let Err(err) = link.send(&datagram) {
                eprintln!("Echo failed: {err}");
                break;
            }
        }
        eprintln!("Peer disconnected: {:?}", link.stats());
    }
}

#[cfg(not(unix))]
fn main() {
    eprintln!("uds-echo needs Unix domain sockets");
}
