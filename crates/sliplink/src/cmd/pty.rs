use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use serde::Serialize;
use sliplink_link::Link;
use sliplink_transport::PtyLine;
use tracing::{info, warn};

use crate::cmd::{frame_config, install_ctrlc_handler, pump_datagrams, PtyArgs, Stop};
use crate::exit::{link_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_datagram, print_json, OutputFormat};

#[derive(Serialize)]
struct PtyReady<'a> {
    slave_path: &'a str,
    echo: bool,
}

pub fn run(args: PtyArgs, format: OutputFormat) -> CliResult<i32> {
    let config = frame_config(args.max_buffer)?;
    let line = Arc::new(PtyLine::open().map_err(|err| transport_error("pty open failed", err))?);
    let slave_path = line.slave_path().display().to_string();

    match format {
        OutputFormat::Json => print_json(&PtyReady {
            slave_path: &slave_path,
            echo: args.echo,
        }),
        // Raw output carries datagram bytes only; announce the path on stderr.
        OutputFormat::Raw => eprintln!("{slave_path}"),
        OutputFormat::Table | OutputFormat::Pretty => println!("slave: {slave_path}"),
    }
    info!(slave = %slave_path, echo = args.echo, "pty line open");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, inbox) = mpsc::channel();
    let link = Link::with_receiver(line.clone(), config, move |datagram| Ok(tx.send(datagram)?));

    let mut received = 0usize;
    let stop = pump_datagrams(&inbox, &running, || line.is_closed(), |datagram| {
        received += 1;
        print_datagram(&datagram, &slave_path, received, format);
        if args.echo {
            link.send(&datagram)
                .map_err(|err| link_error("echo failed", err))?;
        }
        Ok(args.count.is_some_and(|count| received >= count))
    })?;

    if stop == Stop::LineClosed {
        warn!(slave = %slave_path, "pty line closed");
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}
