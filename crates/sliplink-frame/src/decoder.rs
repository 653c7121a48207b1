use bytes::{Bytes, BytesMut};

use crate::codec::{FrameConfig, Reassembly};
use crate::error::Result;

/// Incremental SLIP reassembly.
///
/// Raw chunks are appended with [`extend`](Self::extend) in arrival order and
/// complete datagrams are pulled out with
/// [`next_datagram`](Self::next_datagram). Between passes the buffer only
/// ever holds the undelimited tail of a frame still in flight.
///
/// With a configured cap, any frame longer than the cap is dropped however
/// the stream was split. If the frame is still open when it crosses the cap,
/// the decoder discards input until the next delimiter, where it
/// resynchronises.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    config: FrameConfig,
    guard: Reassembly,
}

impl FrameDecoder {
    /// Create a decoder with default configuration (unbounded).
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.initial_capacity),
            guard: Reassembly::new(config.max_buffer_size),
            config,
        }
    }

    /// Append a raw chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        let skip = self.guard.skip_discarded(chunk);
        self.buf.extend_from_slice(&chunk[skip..]);
    }

    /// Pull the next complete datagram, if one is buffered.
    ///
    /// Returns [`FrameError::BufferOverflow`](crate::FrameError::BufferOverflow)
    /// once per dropped frame; the decoder stays usable and later calls pick
    /// up after the dropped frame.
    pub fn next_datagram(&mut self) -> Result<Option<Bytes>> {
        self.guard.next_datagram(&mut self.buf)
    }

    /// Append `chunk` and collect every datagram it completes.
    ///
    /// The whole chunk is drained even when a frame in it overflows; the
    /// first overflow is then returned, after `out` has been filled.
    pub fn decode(&mut self, chunk: &[u8], out: &mut Vec<Bytes>) -> Result<()> {
        self.extend(chunk);
        let mut first_err = None;
        loop {
            match self.next_datagram() {
                Ok(Some(datagram)) => out.push(datagram),
                Ok(None) => break,
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Bytes held for a frame that has not been closed yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Whether input is being dropped until the next delimiter.
    pub fn is_discarding(&self) -> bool {
        self.guard.is_discarding()
    }

    /// Total bytes dropped because of overflow.
    pub fn discarded_bytes(&self) -> u64 {
        self.guard.discarded_bytes()
    }

    /// Number of overflow events.
    pub fn overflows(&self) -> u64 {
        self.guard.overflows()
    }

    /// Drop any partial frame and leave discard mode.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.guard.reset();
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, END, ESC, ESC_END, ESC_ESC};
    use crate::error::FrameError;

    fn frame(datagram: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(datagram, &mut buf);
        buf.to_vec()
    }

    fn feed(decoder: &mut FrameDecoder, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        decoder.decode(chunk, &mut out).unwrap();
        out.into_iter().map(|b| b.to_vec()).collect()
    }

    #[test]
    fn three_chunk_scenario() {
        let mut decoder = FrameDecoder::new();
        assert!(feed(&mut decoder, &[0xC0]).is_empty());
        assert!(feed(&mut decoder, &[0x41, 0x42]).is_empty());
        assert_eq!(
            feed(&mut decoder, &[0xC0, 0x43, 0xC0]),
            vec![b"AB".to_vec(), b"C".to_vec()]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn byte_at_a_time_matches_whole_frame() {
        let wire = frame(b"\xC0 split \xDB across \xC0\xDB");
        let mut decoder = FrameDecoder::new();
        let mut got = Vec::new();
        for byte in &wire {
            got.extend(feed(&mut decoder, std::slice::from_ref(byte)));
        }
        assert_eq!(got, vec![b"\xC0 split \xDB across \xC0\xDB".to_vec()]);
    }

    #[test]
    fn every_two_way_split_yields_one_datagram() {
        let datagram = b"\xDB\xC0mid\xC0\xDB";
        let wire = frame(datagram);
        for cut in 1..wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut got = feed(&mut decoder, &wire[..cut]);
            got.extend(feed(&mut decoder, &wire[cut..]));
            assert_eq!(got, vec![datagram.to_vec()], "cut at {cut}");
        }
    }

    #[test]
    fn coalesced_frames_come_out_in_order() {
        let mut wire = frame(b"one");
        wire.extend(frame(b"two"));
        wire.extend(frame(b"\xC0three"));

        let mut decoder = FrameDecoder::new();
        assert_eq!(
            feed(&mut decoder, &wire),
            vec![b"one".to_vec(), b"two".to_vec(), b"\xC0three".to_vec()]
        );
    }

    #[test]
    fn delimiter_only_chunks_yield_nothing() {
        let mut decoder = FrameDecoder::new();
        for count in 1..8 {
            assert!(feed(&mut decoder, &vec![END; count]).is_empty());
        }
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn empty_datagram_is_not_delivered() {
        let mut decoder = FrameDecoder::new();
        assert!(feed(&mut decoder, &frame(b"")).is_empty());
    }

    #[test]
    fn unterminated_frame_stays_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(feed(&mut decoder, b"\xC0never closed").is_empty());
        assert_eq!(decoder.pending(), b"never closed".len());
        assert_eq!(feed(&mut decoder, b"\xC0"), vec![b"never closed".to_vec()]);
    }

    #[test]
    fn overflow_discards_and_resynchronises() {
        let mut decoder = FrameDecoder::with_config(FrameConfig::with_max_buffer_size(8));

        let mut out = Vec::new();
        let err = decoder.decode(b"\xC0way too long", &mut out).unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { size: 12, max: 8 }));
        assert!(out.is_empty());
        assert!(decoder.is_discarding());
        assert_eq!(decoder.pending(), 0);

        // Still garbage from the oversized frame: dropped.
        assert!(feed(&mut decoder, b"more junk").is_empty());
        assert_eq!(decoder.pending(), 0);

        // The next delimiter closes the junk and the decoder is back in sync.
        assert_eq!(feed(&mut decoder, b"tail\xC0ok\xC0"), vec![b"ok".to_vec()]);
        assert!(!decoder.is_discarding());
        assert_eq!(decoder.overflows(), 1);
        assert_eq!(decoder.discarded_bytes(), 12 + 9 + 4);
    }

    #[test]
    fn overflow_reported_after_preceding_datagrams() {
        let mut decoder = FrameDecoder::with_config(FrameConfig::with_max_buffer_size(4));
        let mut out = Vec::new();
        let err = decoder.decode(b"\xC0ab\xC0overlong", &mut out).unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { .. }));
        assert_eq!(out, vec![Bytes::from_static(b"ab")]);
    }

    #[test]
    fn cap_applies_per_frame_not_per_chunk() {
        let mut decoder = FrameDecoder::with_config(FrameConfig::with_max_buffer_size(4));
        let mut wire = frame(b"abc");
        wire.extend(frame(b"def"));
        wire.extend(frame(b"ghi"));
        assert_eq!(feed(&mut decoder, &wire).len(), 3);
        assert_eq!(decoder.overflows(), 0);
    }

    #[test]
    fn oversized_frame_is_dropped_however_it_is_split() {
        let wire = frame(b"abcdefgh");
        for cut in 0..=wire.len() {
            let mut decoder = FrameDecoder::with_config(FrameConfig::with_max_buffer_size(4));
            let mut out = Vec::new();
            let first = decoder.decode(&wire[..cut], &mut out);
            let second = decoder.decode(&wire[cut..], &mut out);

            assert!(out.is_empty(), "cut at {cut}: delivered {out:?}");
            assert!(
                first.is_err() || second.is_err(),
                "cut at {cut}: overflow not reported"
            );
            assert_eq!(decoder.overflows(), 1, "cut at {cut}");
            assert!(!decoder.is_discarding(), "cut at {cut}");

            assert_eq!(feed(&mut decoder, &frame(b"ok")), vec![b"ok".to_vec()]);
        }
    }

    #[test]
    fn closed_oversized_frame_does_not_hide_its_neighbours() {
        let mut decoder = FrameDecoder::with_config(FrameConfig::with_max_buffer_size(4));
        let mut wire = frame(b"one");
        wire.extend(frame(b"far too long"));
        wire.extend(frame(b"two"));

        let mut out = Vec::new();
        let err = decoder.decode(&wire, &mut out).unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { size: 12, max: 4 }));
        assert_eq!(out, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
        assert_eq!(decoder.discarded_bytes(), 12);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn encode_then_decode_round_trips_every_short_payload() {
        let alphabet = [END, ESC, ESC_END, ESC_ESC, 0x41];
        let mut payloads: Vec<Vec<u8>> = vec![Vec::new()];
        let mut last = payloads.clone();
        for _ in 0..4 {
            last = last
                .iter()
                .flat_map(|prefix| {
                    alphabet.iter().map(move |&b| {
                        let mut next = prefix.clone();
                        next.push(b);
                        next
                    })
                })
                .collect();
            payloads.extend(last.iter().cloned());
        }
        assert_eq!(payloads.len(), 1 + 5 + 25 + 125 + 625);

        let mut decoder = FrameDecoder::new();
        for payload in payloads.iter().filter(|p| !p.is_empty()) {
            assert_eq!(
                feed(&mut decoder, &frame(payload)),
                vec![payload.clone()],
                "payload {payload:02X?}"
            );
        }

        // All of them back to back, then one byte at a time.
        let mut wire = Vec::new();
        for payload in &payloads {
            wire.extend(frame(payload));
        }
        let expected: Vec<Vec<u8>> = payloads.into_iter().filter(|p| !p.is_empty()).collect();
        assert_eq!(feed(&mut decoder, &wire), expected);

        let mut trickled = Vec::new();
        for byte in &wire {
            trickled.extend(feed(&mut decoder, std::slice::from_ref(byte)));
        }
        assert_eq!(trickled, expected);
    }

    #[test]
    fn clear_resets_state() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\xC0partial");
        decoder.clear();
        assert_eq!(decoder.pending(), 0);
        assert_eq!(feed(&mut decoder, b"x\xC0"), vec![b"x".to_vec()]);
    }
}
