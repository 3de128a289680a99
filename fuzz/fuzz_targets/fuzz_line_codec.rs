//! Fuzz target: `LineCodec::feed` / `drain`
//!
//! Drives arbitrary byte sequences into the streaming line decoder and
//! asserts that it never panics, never buffers more than one line's worth
//! of bytes, and accepts a clean frame after a reset.
//!
//! cargo fuzz run fuzz_line_codec

#![no_main]

use growctl::protocol::codec::MAX_LINE_LEN;
use growctl::protocol::{Frame, LineCodec, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut codec = LineCodec::new();

    // Split the input so partial lines straddle feeds.
    let mid = data.len() / 2;
    codec.feed(&data[..mid]);
    let _ = codec.drain();
    codec.feed(&data[mid..]);
    let _ = codec.drain();
    assert!(codec.pending() <= MAX_LINE_LEN, "codec held an overlong line");

    // After a reset the codec must decode a clean frame.
    codec.reset();
    codec.feed(&encode(&Frame::Keepalive));
    assert_eq!(codec.drain(), vec![Ok(Frame::Keepalive)]);
});
