#![no_main]

use libfuzzer_sys::fuzz_target;
use ionframe_wire::varuint::{decode_varuint, MAX_VARUINT_BYTES};

// Fuzz target: VarUInt decoding from arbitrary bytes.
//
// Catches bugs in:
// - Accumulator overflow past 63 bits
// - Missing stop bit at end of input
fuzz_target!(|data: &[u8]| {
    if let Ok((value, n)) = decode_varuint(data) {
        assert!(n <= MAX_VARUINT_BYTES);
        assert!(value < 1 << 63);
        assert!(data[n - 1] & 0x80 != 0);
    }
});
