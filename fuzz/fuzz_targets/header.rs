#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: ValueHeader::read_from header parsing.
//
// Catches bugs in:
// - Truncated length fields
// - Over-long VarUInt lengths
// - Invalid type ID bytes
fuzz_target!(|data: &[u8]| {
    if let Ok(header) = ionframe_wire::header::ValueHeader::read_from(data) {
        assert!(header.header_len <= data.len());
    }
});
