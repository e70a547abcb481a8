#![no_main]

use libfuzzer_sys::fuzz_target;
use ionframe_decoder::{BufferConfig, NoOpHandler, PushSource, TopLevelReader};

// Fuzz target: framing arbitrary bytes with a small bounded buffer.
//
// The first byte picks the maximum buffer size and the second the
// fragment size; the rest is the stream. Errors are fine, panics and
// over-counting are not.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let maximum = 5 + usize::from(data[0] % 60);
    let fragment = 1 + usize::from(data[1] % 16);
    let stream = &data[2..];

    let config = BufferConfig::builder()
        .initial_buffer_size(maximum.min(8))
        .maximum_buffer_size(maximum)
        .handler(NoOpHandler)
        .build()
        .unwrap();
    let mut reader = TopLevelReader::new(config, PushSource::new());

    for chunk in stream.chunks(fragment) {
        reader.source_mut().push(chunk);
        loop {
            match reader.next() {
                Ok(Some(value)) => assert!(value.bytes.len() <= maximum),
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
    let _ = reader.close();
    assert!(reader.engine().bytes_consumed() <= stream.len() as u64);
});
