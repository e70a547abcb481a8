#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ionframe_decoder::{BufferConfig, PushSource, TopLevelReader, TopLevelValue};
use ionframe_encoder::IonEncoder;

#[derive(Arbitrary, Debug)]
enum Unit {
    VersionMarker,
    NopPad(u8),
    Bool(bool),
    Int(i64),
    String(String),
    Symbol(u32),
    SymbolTable(Vec<String>),
    Annotated(Vec<u16>, i64),
}

#[derive(Arbitrary, Debug)]
struct Input {
    units: Vec<Unit>,
    cuts: Vec<u8>,
}

fn encode(units: &[Unit]) -> Vec<u8> {
    let mut encoder = IonEncoder::new();
    encoder.ivm();
    for unit in units {
        match unit {
            Unit::VersionMarker => encoder.ivm(),
            Unit::NopPad(len) => encoder.nop_pad(usize::from(*len).max(1)),
            Unit::Bool(value) => encoder.bool(*value),
            Unit::Int(value) => encoder.int(*value),
            Unit::String(value) => encoder.string(value),
            Unit::Symbol(sid) => encoder.symbol(u64::from(*sid)),
            Unit::SymbolTable(symbols) => {
                let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
                encoder.symbol_table(&symbols)
            }
            Unit::Annotated(sids, value) if !sids.is_empty() => {
                let sids: Vec<u64> = sids.iter().map(|&sid| u64::from(sid)).collect();
                encoder.annotated(&sids, IonEncoder::new().int(*value))
            }
            Unit::Annotated(_, value) => encoder.int(*value),
        };
    }
    encoder.encode().unwrap()
}

fn read(stream: &[u8], cuts: &[u8]) -> Vec<TopLevelValue> {
    let mut reader = TopLevelReader::new(BufferConfig::default(), PushSource::new());
    let mut values = Vec::new();
    let mut sizes = cuts.iter().map(|&c| usize::from(c));
    let mut rest = stream;
    while !rest.is_empty() {
        let n = sizes.next().unwrap_or(rest.len()).min(rest.len());
        reader.source_mut().push(&rest[..n]);
        rest = &rest[n..];
        while let Some(value) = reader.next().unwrap() {
            values.push(value);
        }
    }
    reader.close().unwrap();
    values
}

// Fuzz target: well-formed streams split at arbitrary points.
//
// Any stream the encoder writes must frame without error, and where it
// is split must not change the values surfaced.
fuzz_target!(|input: Input| {
    let stream = encode(&input.units);
    let whole = read(&stream, &[]);
    assert_eq!(read(&stream, &input.cuts), whole);
});
