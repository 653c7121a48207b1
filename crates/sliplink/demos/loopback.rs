//! A router and two peers (sensor, logger) joined by in-memory lines, one per
//! next hop.
//!
//! Run with:
//!   cargo run -p sliplink --example loopback

use std::net::Ipv4Addr;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use sliplink::transport::{MemoryLine, SerialLine};
use sliplink::LinkLayer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let router = Ipv4Addr::new(10, 0, 0, 1);
    let sensor = Ipv4Addr::new(10, 0, 0, 2);
    let logger = Ipv4Addr::new(10, 0, 0, 3);

    let (router_to_sensor, sensor_side) = MemoryLine::pair();
    let (router_to_logger, logger_side) = MemoryLine::pair();

    let router_layer = LinkLayer::new([
        (sensor, Arc::new(router_to_sensor) as Arc<dyn SerialLine>),
        (logger, Arc::new(router_to_logger) as Arc<dyn SerialLine>),
    ])?;
    let sensor_layer = LinkLayer::new([(router, Arc::new(sensor_side) as Arc<dyn SerialLine>)])?;
    let logger_layer = LinkLayer::new([(router, Arc::new(logger_side) as Arc<dyn SerialLine>)])?;

    let (tx, rx) = mpsc::channel();
    logger_layer.register_receiver(move |datagram| Ok(tx.send(datagram)?));

    // The router forwards everything it hears to the logger.
    let (fwd_tx, fwd_rx) = mpsc::channel();
    router_layer.register_receiver(move |datagram| Ok(fwd_tx.send(datagram)?));

    for reading in ["temp=21.5", "temp=21.7", "door=\u{00C0}open"] {
        sensor_layer.send(reading.as_bytes(), &router)?;
    }

    while let Ok(datagram) = fwd_rx.recv_timeout(Duration::from_millis(50)) {
        router_layer.send(&datagram, &logger)?;
    }

    while let Ok(datagram) = rx.recv_timeout(Duration::from_millis(50)) {
        println!("logger got {:?}", String::from_utf8_lossy(&datagram));
    }

    if let Some(link) = router_layer.link(&logger) {
        println!("router -> logger: {:?}", link.stats());
    }
    Ok(())
}
