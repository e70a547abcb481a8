//! Golden fixture generator for the framing conformance suite.
//!
//! Writes every stream under `tests/golden/` as a single line of hex, so
//! the fixtures stay reviewable in diffs. Run it after changing the
//! encoder, then check the conformance tests still agree.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_golden -p ionframe-tests
//! ```
//!
//! # Generated fixtures
//!
//! | File                        | Contents                                          |
//! |-----------------------------|---------------------------------------------------|
//! | padded_values               | Scalars separated by padding of several sizes     |
//! | symbol_tables               | Two symbol table contexts, annotated values       |
//! | oversized_value             | A string too large for an 8 byte buffer, then int |
//! | padded_symbol_table         | Padding on both sides of a symbol table           |
//! | multiple_pads               | Two pads in front of a value that needs their room |
//! | symbol_table_annotated_int  | `$ion_symbol_table::` on an int                   |
//! | truncated_pad               | Stream ending one byte short of a pad's end       |

#![allow(clippy::pedantic)]

use std::path::Path;

use ionframe_encoder::IonEncoder;
use ionframe_tests::golden_dir;

fn main() {
    let golden_dir = golden_dir();
    for (name, encoder) in fixtures() {
        let bytes = encoder.encode().expect("encode fixture");
        write_hex(&golden_dir.join(format!("{name}.hex")), &bytes);
    }
    println!("All golden fixtures written to {}", golden_dir.display());
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn write_hex(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create_dir_all");
    }
    std::fs::write(path, format!("{}\n", hex::encode(data))).expect("write_hex");
    println!("  wrote {}", path.display());
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn fixtures() -> Vec<(&'static str, IonEncoder)> {
    let mut padded_values = IonEncoder::new();
    padded_values
        .ivm()
        .nop_pad(1)
        .nop_pad(2)
        .int(0)
        .string("ion")
        .nop_pad(3)
        .bool(true);

    let mut symbol_tables = IonEncoder::new();
    symbol_tables
        .ivm()
        .symbol_table(&["a"])
        .symbol(10)
        .ivm()
        .symbol_table(&["b", "c"])
        .annotated(&[10], IonEncoder::new().int(7))
        .symbol(11)
        // Not a symbol table: `$ion_symbol_table` is the second annotation.
        .annotated(&[4, 3], IonEncoder::new().structure(IonEncoder::new().field(4).int(1)));

    let mut oversized_value = IonEncoder::new();
    oversized_value.ivm().string("abcd").int(1);

    let mut padded_symbol_table = IonEncoder::new();
    padded_symbol_table
        .ivm()
        .nop_pad(4)
        .symbol_table(&["a"])
        .nop_pad(4)
        .int(7);

    let mut multiple_pads = IonEncoder::new();
    multiple_pads.ivm().nop_pad(3).nop_pad(3).int(0x01_0203_0405);

    let mut symbol_table_annotated_int = IonEncoder::new();
    symbol_table_annotated_int
        .ivm()
        .annotated(&[3], IonEncoder::new().int(0x01_0203_0405))
        .int(0);

    let mut truncated_pad = IonEncoder::new();
    truncated_pad.ivm().raw(&[0x0E, 0x90]).raw(&[0; 15]);

    vec![
        ("padded_values", padded_values),
        ("symbol_tables", symbol_tables),
        ("oversized_value", oversized_value),
        ("padded_symbol_table", padded_symbol_table),
        ("multiple_pads", multiple_pads),
        ("symbol_table_annotated_int", symbol_table_annotated_int),
        ("truncated_pad", truncated_pad),
    ]
}
