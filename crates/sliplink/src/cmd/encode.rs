use bytes::BytesMut;
use sliplink_frame::{encode_frame, encoded_len, FrameWriter};

use crate::cmd::{read_payload, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame_summary, FrameSummary, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let datagram = read_payload(args.data.as_deref(), args.file.as_deref(), true)?;

    if let OutputFormat::Raw = format {
        let mut writer = FrameWriter::new(std::io::stdout().lock());
        writer
            .send(&datagram)
            .map_err(|err| frame_error("write failed", err))?;
        return Ok(SUCCESS);
    }

    let mut frame = BytesMut::with_capacity(encoded_len(&datagram));
    encode_frame(&datagram, &mut frame);
    print_frame_summary(&FrameSummary::new(&datagram, &frame), format);
    Ok(SUCCESS)
}
