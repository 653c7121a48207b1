use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;
use sliplink_frame::encode_frame;
use sliplink_link::LinkLayer;
use sliplink_transport::{SerialLine, UnixDomainSocket};
use tracing::debug;

use crate::cmd::{read_payload, SendArgs};
use crate::exit::{link_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame_summary, FrameSummary, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    check_next_hop(&args.routes, args.next_hop)?;
    let datagram = read_payload(args.data.as_deref(), args.file.as_deref(), false)?;

    let mut lines: Vec<(Ipv4Addr, Arc<dyn SerialLine>)> = Vec::with_capacity(args.routes.len());
    for (next_hop, path) in &args.routes {
        let line = UnixDomainSocket::connect(path).map_err(|err| {
            transport_error(&format!("connect to {next_hop} failed"), err)
        })?;
        debug!(next_hop = %next_hop, path = %path.display(), "route connected");
        let line: Arc<dyn SerialLine> = Arc::new(line);
        lines.push((*next_hop, line));
    }

    let layer = LinkLayer::new(lines).map_err(|err| link_error("invalid routes", err))?;
    layer
        .send(&datagram, &args.next_hop)
        .map_err(|err| link_error("send failed", err))?;

    let mut frame = BytesMut::new();
    encode_frame(&datagram, &mut frame);
    let mut summary = FrameSummary::new(&datagram, &frame);
    summary.next_hop = Some(args.next_hop.to_string());
    print_frame_summary(&summary, format);

    Ok(SUCCESS)
}

/// Reject an unroutable next hop before any socket is touched.
fn check_next_hop(routes: &[(Ipv4Addr, PathBuf)], next_hop: Ipv4Addr) -> CliResult<()> {
    if routes.iter().any(|(addr, _)| *addr == next_hop) {
        return Ok(());
    }
    Err(CliError::usage(format!(
        "no --route for next hop {next_hop}"
    )))
}
