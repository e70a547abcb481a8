#![no_main]

use libfuzzer_sys::fuzz_target;
use ionframe_wire::varuint::{decode_varuint, encode_varuint, varuint_len, MAX_ENCODED_VARUINT_BYTES};

// Fuzz target: VarUInt encode->decode roundtrip.
//
// Takes 8 bytes of fuzz input as a u64, keeps the low 63 bits (the range
// header fields may carry), encodes it and decodes it back.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let value = u64::from_le_bytes(data[..8].try_into().unwrap()) >> 1;

    let mut buf = [0u8; MAX_ENCODED_VARUINT_BYTES];
    let encoded_len = encode_varuint(value, &mut buf);
    assert_eq!(encoded_len, varuint_len(value));

    let (decoded, decoded_len) = decode_varuint(&buf[..encoded_len]).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded_len, encoded_len);
});
