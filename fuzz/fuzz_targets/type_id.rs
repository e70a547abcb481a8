#![no_main]

use libfuzzer_sys::fuzz_target;
use ionframe_wire::type_id::{classify, classify_checked};
use ionframe_wire::HeaderKind;

// Fuzz target: header classification table.
//
// Every byte classifies to something, and the checked variant rejects
// exactly the bytes the table marks invalid.
fuzz_target!(|data: &[u8]| {
    for &byte in data {
        let type_id = classify(byte);
        assert_eq!(type_id.byte, byte);
        let invalid = type_id.header_kind() == HeaderKind::Invalid;
        assert_eq!(classify_checked(byte).is_err(), invalid);
        if type_id.is_nop_pad {
            assert_eq!(type_id.header_kind(), HeaderKind::NopPad);
        }
    }
});
