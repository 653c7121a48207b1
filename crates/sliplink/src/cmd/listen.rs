use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use sliplink_link::Link;
use sliplink_transport::UnixDomainSocket;
use tracing::{debug, info};

use crate::cmd::{frame_config, install_ctrlc_handler, pump_datagrams, ListenArgs, Stop};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_datagram, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = frame_config(args.max_buffer)?;
    let socket =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %socket.path().display(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    let mut connections = 0usize;

    while running.load(Ordering::SeqCst) {
        let line = Arc::new(
            socket
                .accept()
                .map_err(|err| transport_error("accept failed", err))?,
        );
        connections += 1;
        let source = format!("conn-{connections}");
        debug!(source = %source, "connection accepted");

        let (tx, inbox) = mpsc::channel();
        let link = Link::with_receiver(line.clone(), config.clone(), move |datagram| {
            Ok(tx.send(datagram)?)
        });

        let stop = pump_datagrams(&inbox, &running, || line.is_closed(), |datagram| {
            received += 1;
            print_datagram(&datagram, &source, received, format);
            Ok(args.count.is_some_and(|count| received >= count))
        })?;

        let stats = link.stats();
        debug!(
            source = %source,
            delivered = stats.datagrams_delivered,
            overflows = stats.overflows,
            "connection finished"
        );

        if stop != Stop::LineClosed {
            break;
        }
    }

    Ok(SUCCESS)
}
