use std::fs::File;
use std::io::Read;

use sliplink_frame::{FrameError, FrameReader};
use tracing::{debug, warn};

use crate::cmd::{frame_config, DecodeArgs};
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_datagram, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = frame_config(args.max_buffer)?;
    let (input, source): (Box<dyn Read>, String) = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            (Box::new(file), path.display().to_string())
        }
        None => (Box::new(std::io::stdin().lock()), "stdin".to_string()),
    };

    let mut reader = FrameReader::with_config(input, config);
    let mut decoded = 0usize;
    let mut overflows = 0usize;

    loop {
        match reader.read_datagram() {
            Ok(datagram) => {
                decoded += 1;
                print_datagram(&datagram, &source, decoded, format);
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(FrameError::BufferOverflow { size, max }) => {
                overflows += 1;
                warn!(size, max, "dropped frame longer than --max-buffer");
            }
            Err(err) => return Err(frame_error("read failed", err)),
        }
    }

    if reader.pending() > 0 {
        debug!(size = reader.pending(), "input ended inside a frame; tail dropped");
    }
    debug!(decoded, overflows, "decode finished");

    Ok(if overflows > 0 { DATA_INVALID } else { SUCCESS })
}
