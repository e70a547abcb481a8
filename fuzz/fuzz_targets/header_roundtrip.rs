#![no_main]

use libfuzzer_sys::fuzz_target;
use ionframe_wire::header::ValueHeader;
use ionframe_wire::TypeCode;

/// Codes whose headers are valid at every length.
const CODES: [TypeCode; 9] = [
    TypeCode::PosInt,
    TypeCode::Decimal,
    TypeCode::Symbol,
    TypeCode::String,
    TypeCode::Clob,
    TypeCode::Blob,
    TypeCode::List,
    TypeCode::Sexp,
    TypeCode::Struct,
];

// Fuzz target: ValueHeader write->read roundtrip.
//
// One byte picks the type code, the next four the length.
fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let code = CODES[usize::from(data[0]) % CODES.len()];
    let length = u32::from_le_bytes(data[1..5].try_into().unwrap()) as usize;

    let mut buf = Vec::new();
    let written = ValueHeader::write_to(code, length, &mut buf).unwrap();
    assert_eq!(written, buf.len());

    let header = ValueHeader::read_from(&buf).unwrap();
    assert_eq!(header.type_id.code, code);
    assert_eq!(header.header_len, written);
    assert_eq!(header.length, length as u64);
});
