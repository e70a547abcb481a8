/// Errors raised by the leaf codecs.
///
/// ```text
///   WireError
///   ├── InvalidTypeId          ← header byte is illegal at this position
///   ├── VarUIntTooLarge        ← VarUInt would not fit a 63-bit accumulator
///   ├── UnexpectedEof          ← slice ended inside a header or VarUInt
///   ├── InvalidVersionMarker   ← 4 bytes starting 0xE0 are not an IVM
///   ├── UnsupportedVersion     ← IVM names a version other than 1.0
///   └── Io(std::io::Error)     ← from the writer during encoding
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The header byte is reserved or describes an impossible length.
    #[error("invalid type ID {byte:#04X}")]
    InvalidTypeId { byte: u8 },

    /// A VarUInt ran past the number of bytes a 63-bit value can occupy.
    #[error("VarUInt too large: exceeded {limit}-byte limit", limit = crate::varuint::MAX_VARUINT_BYTES)]
    VarUIntTooLarge,

    /// Input ended before a complete header or VarUInt could be read.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// A version marker did not have the `E0 xx yy EA` shape.
    #[error("invalid version marker: {found:02X?}")]
    InvalidVersionMarker { found: [u8; 4] },

    /// The version marker names a version this crate cannot frame.
    #[error("unsupported version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// I/O error during write.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
