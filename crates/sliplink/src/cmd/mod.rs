use std::fs;
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use bytes::Bytes;
use clap::{Args, Subcommand};
use sliplink_frame::FrameConfig;

use crate::exit::{io_error, CliError, CliResult, INTERNAL, INTERRUPTED};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
#[cfg(target_os = "linux")]
pub mod pty;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a datagram and write the wire bytes.
    Encode(EncodeArgs),
    /// Decode a SLIP byte stream and print each datagram.
    Decode(DecodeArgs),
    /// Accept Unix socket connections and print received datagrams.
    Listen(ListenArgs),
    /// Send one datagram through a routed set of socket links.
    Send(SendArgs),
    /// Open a pseudo-terminal line and print received datagrams.
    #[cfg(target_os = "linux")]
    Pty(PtyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        #[cfg(target_os = "linux")]
        Command::Pty(args) => pty::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file. Without --data or --file, stdin is read.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read the byte stream from file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Cap on an unfinished frame, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_buffer: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Cap on an unfinished frame, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_buffer: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Link to a next hop, as ADDR=SOCKET. Repeatable.
    #[arg(long = "route", value_name = "ADDR=SOCKET", value_parser = parse_route, required = true)]
    pub routes: Vec<(Ipv4Addr, PathBuf)>,
    /// Next hop to send through.
    #[arg(long, value_name = "ADDR")]
    pub next_hop: Ipv4Addr,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[cfg(target_os = "linux")]
#[derive(Args, Debug)]
pub struct PtyArgs {
    /// Send every received datagram back over the line.
    #[arg(long)]
    pub echo: bool,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Cap on an unfinished frame, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_buffer: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_route(input: &str) -> Result<(Ipv4Addr, PathBuf), String> {
    let (addr, path) = input
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=SOCKET, got '{input}'"))?;
    let addr = addr
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|err| format!("invalid next-hop address '{addr}': {err}"))?;
    if path.is_empty() {
        return Err("socket path must not be empty".to_string());
    }
    Ok((addr, PathBuf::from(path)))
}

pub(crate) fn frame_config(max_buffer: Option<usize>) -> CliResult<FrameConfig> {
    match max_buffer {
        None => Ok(FrameConfig::default()),
        Some(0) => Err(CliError::usage("--max-buffer must be greater than zero")),
        Some(max) => Ok(FrameConfig::with_max_buffer_size(max)),
    }
}

/// Payload from `--data`, `--file`, or stdin when `stdin_fallback` is set.
pub(crate) fn read_payload(
    data: Option<&str>,
    file: Option<&Path>,
    stdin_fallback: bool,
) -> CliResult<Vec<u8>> {
    if let Some(data) = data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if !stdin_fallback {
        return Ok(Vec::new());
    }

    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    // The first Ctrl-C stops the loop at its next poll; a second one exits
    // even while blocked in accept.
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    LineClosed,
    Interrupted,
    Done,
}

/// Hand datagrams from `inbox` to `handle` until the line closes, Ctrl-C is
/// pressed, or `handle` returns `true`.
///
/// Datagrams already queued when the line closes are still handled.
pub(crate) fn pump_datagrams(
    inbox: &mpsc::Receiver<Bytes>,
    running: &AtomicBool,
    line_closed: impl Fn() -> bool,
    mut handle: impl FnMut(Bytes) -> CliResult<bool>,
) -> CliResult<Stop> {
    loop {
        match inbox.recv_timeout(POLL_INTERVAL) {
            Ok(datagram) => {
                if handle(datagram)? {
                    return Ok(Stop::Done);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) {
                    return Ok(Stop::Interrupted);
                }
                if line_closed() {
                    while let Ok(datagram) = inbox.try_recv() {
                        if handle(datagram)? {
                            return Ok(Stop::Done);
                        }
                    }
                    return Ok(Stop::LineClosed);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(Stop::LineClosed),
        }
    }
}
