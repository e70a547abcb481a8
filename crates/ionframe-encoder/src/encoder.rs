use ionframe_wire::TypeCode;
use ionframe_wire::header::ValueHeader;
use ionframe_wire::type_id::{NULL_NIBBLE, VARIABLE_LENGTH_NIBBLE};
use ionframe_wire::varuint::{MAX_ENCODED_VARUINT_BYTES, encode_varuint, varuint_len};
use ionframe_wire::version_marker::IVM_1_0;

use crate::error::EncodeError;

/// Symbol ID of `$ion_symbol_table`.
const ION_SYMBOL_TABLE_SID: u64 = 3;

/// Symbol ID of `symbols`.
const SYMBOLS_SID: u64 = 7;

/// Builds binary Ion streams for tests, benchmarks and fuzz seeds.
///
/// Methods append top-level units to an internal list and return
/// `&mut Self` for chaining. Containers and annotation wrappers take
/// another encoder holding their contents. Nothing is serialized until
/// [`encode`](Self::encode), which is also where invalid requests (empty
/// padding, empty annotation lists) are reported.
///
/// Only what the framing engine needs to see is supported: no decimals,
/// timestamps or clobs, and symbol IDs are written as given.
///
/// # Usage
///
/// ```rust
/// use ionframe_encoder::IonEncoder;
///
/// let bytes = IonEncoder::new()
///     .ivm()
///     .symbol_table(&["id"])
///     .annotated(&[10], IonEncoder::new().structure(
///         IonEncoder::new().field(10).int(42),
///     ))
///     .nop_pad(3)
///     .string("done")
///     .encode()
///     .unwrap();
/// assert_eq!(&bytes[..4], &[0xE0, 0x01, 0x00, 0xEA]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct IonEncoder {
    units: Vec<Pending>,
}

/// A unit awaiting serialization.
#[derive(Clone, Debug)]
enum Pending {
    VersionMarker,
    /// Total encoded size, header included.
    NopPad(usize),
    Null(TypeCode),
    Bool(bool),
    Scalar { code: TypeCode, body: Vec<u8> },
    FieldName(u64),
    Container { code: TypeCode, children: Vec<Pending> },
    Annotated { annotations: Vec<u64>, value: Vec<Pending> },
    Raw(Vec<u8>),
}

impl IonEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a 1.0 version marker.
    pub fn ivm(&mut self) -> &mut Self {
        self.push(Pending::VersionMarker)
    }

    /// Append no-op padding occupying exactly `len` bytes.
    pub fn nop_pad(&mut self, len: usize) -> &mut Self {
        self.push(Pending::NopPad(len))
    }

    /// Append a typed null such as `null.int` or `null.struct`.
    pub fn null(&mut self, code: TypeCode) -> &mut Self {
        self.push(Pending::Null(code))
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.push(Pending::Bool(value))
    }

    pub fn int(&mut self, value: i64) -> &mut Self {
        let code = if value < 0 { TypeCode::NegInt } else { TypeCode::PosInt };
        self.scalar(code, magnitude(value.unsigned_abs()))
    }

    /// Append a 64-bit float.
    pub fn float(&mut self, value: f64) -> &mut Self {
        self.scalar(TypeCode::Float, value.to_be_bytes().to_vec())
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.scalar(TypeCode::String, value.as_bytes().to_vec())
    }

    /// Append a symbol by ID.
    pub fn symbol(&mut self, sid: u64) -> &mut Self {
        self.scalar(TypeCode::Symbol, magnitude(sid))
    }

    pub fn blob(&mut self, value: &[u8]) -> &mut Self {
        self.scalar(TypeCode::Blob, value.to_vec())
    }

    /// Append a struct field name. Only meaningful inside the contents
    /// passed to [`structure`](Self::structure).
    pub fn field(&mut self, sid: u64) -> &mut Self {
        self.push(Pending::FieldName(sid))
    }

    /// Append a list holding the units of `items`.
    pub fn list(&mut self, items: &IonEncoder) -> &mut Self {
        self.push(Pending::Container {
            code: TypeCode::List,
            children: items.units.clone(),
        })
    }

    /// Append a struct holding the fields of `fields`, which alternates
    /// [`field`](Self::field) names and values.
    pub fn structure(&mut self, fields: &IonEncoder) -> &mut Self {
        self.push(Pending::Container {
            code: TypeCode::Struct,
            children: fields.units.clone(),
        })
    }

    /// Wrap the units of `value` in an annotation wrapper.
    ///
    /// `value` normally holds exactly one value; anything else produces a
    /// malformed wrapper, which is occasionally what a test wants.
    pub fn annotated(&mut self, annotations: &[u64], value: &IonEncoder) -> &mut Self {
        self.push(Pending::Annotated {
            annotations: annotations.to_vec(),
            value: value.units.clone(),
        })
    }

    /// Append a local symbol table declaring `symbols`:
    /// `$ion_symbol_table::{ symbols: [...] }`.
    pub fn symbol_table(&mut self, symbols: &[&str]) -> &mut Self {
        self.push(Pending::Annotated {
            annotations: vec![ION_SYMBOL_TABLE_SID],
            value: vec![Pending::Container {
                code: TypeCode::Struct,
                children: symbol_table_fields(symbols),
            }],
        })
    }

    /// Append bytes verbatim. Useful for malformed or truncated streams.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.push(Pending::Raw(bytes.to_vec()))
    }

    /// The struct contents [`symbol_table`](Self::symbol_table) writes for
    /// `symbols`, without the struct header.
    ///
    /// # Errors
    ///
    /// Never fails in practice; errors from the header writer propagate.
    pub fn symbol_table_fields(symbols: &[&str]) -> Result<Vec<u8>, EncodeError> {
        write_all(&symbol_table_fields(symbols))
    }

    /// Serialize every appended unit into one stream.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::EmptyNopPad`] for `nop_pad(0)`.
    /// - [`EncodeError::EmptyAnnotations`] for an annotation wrapper with
    ///   no annotations.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        write_all(&self.units)
    }

    fn scalar(&mut self, code: TypeCode, body: Vec<u8>) -> &mut Self {
        self.push(Pending::Scalar { code, body })
    }

    fn push(&mut self, unit: Pending) -> &mut Self {
        self.units.push(unit);
        self
    }
}

fn symbol_table_fields(symbols: &[&str]) -> Vec<Pending> {
    let strings = symbols
        .iter()
        .map(|s| Pending::Scalar {
            code: TypeCode::String,
            body: s.as_bytes().to_vec(),
        })
        .collect();
    vec![
        Pending::FieldName(SYMBOLS_SID),
        Pending::Container {
            code: TypeCode::List,
            children: strings,
        },
    ]
}

/// Big-endian bytes of `value` without leading zeros. Zero is empty.
fn magnitude(value: u64) -> Vec<u8> {
    let skip = (value.leading_zeros() / 8) as usize;
    value.to_be_bytes()[skip..].to_vec()
}

fn write_varuint(value: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; MAX_ENCODED_VARUINT_BYTES];
    let n = encode_varuint(value, &mut buf);
    out.extend_from_slice(&buf[..n]);
}

fn write_all(units: &[Pending]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for unit in units {
        write(unit, &mut out)?;
    }
    Ok(out)
}

fn write(unit: &Pending, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match unit {
        Pending::VersionMarker => out.extend_from_slice(&IVM_1_0),
        Pending::NopPad(len) => write_nop_pad(*len, out)?,
        Pending::Null(code) => out.push(code.nibble() << 4 | NULL_NIBBLE),
        Pending::Bool(value) => out.push(TypeCode::Bool.nibble() << 4 | u8::from(*value)),
        Pending::Scalar { code, body } => {
            ValueHeader::write_to(*code, body.len(), out)?;
            out.extend_from_slice(body);
        }
        Pending::FieldName(sid) => write_varuint(*sid, out),
        Pending::Container { code, children } => {
            let body = write_all(children)?;
            ValueHeader::write_to(*code, body.len(), out)?;
            out.extend_from_slice(&body);
        }
        Pending::Annotated { annotations, value } => {
            if annotations.is_empty() {
                return Err(EncodeError::EmptyAnnotations);
            }
            let mut sids = Vec::new();
            for &sid in annotations {
                write_varuint(sid, &mut sids);
            }
            let wrapped = write_all(value)?;
            let length = varuint_len(sids.len() as u64) + sids.len() + wrapped.len();
            ValueHeader::write_to(TypeCode::AnnotationWrapper, length, out)?;
            write_varuint(sids.len() as u64, out);
            out.extend_from_slice(&sids);
            out.extend_from_slice(&wrapped);
        }
        Pending::Raw(bytes) => out.extend_from_slice(bytes),
    }
    Ok(())
}

/// Padding of exactly `len` bytes.
///
/// Up to 14 bytes the length fits in the low nibble. Beyond that the
/// length VarUInt is zero-extended where needed so the header and body add
/// up to `len`.
fn write_nop_pad(len: usize, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match len {
        0 => return Err(EncodeError::EmptyNopPad),
        1..=14 => {
            #[allow(clippy::cast_possible_truncation)]
            let low_nibble = (len - 1) as u8;
            out.push(low_nibble);
            out.resize(out.len() + len - 1, 0);
        }
        _ => {
            let mut width = 1;
            while varuint_len((len - 1 - width) as u64) > width {
                width += 1;
            }
            let body = len - 1 - width;
            let mut buf = [0u8; MAX_ENCODED_VARUINT_BYTES];
            let n = encode_varuint(body as u64, &mut buf);
            out.push(VARIABLE_LENGTH_NIBBLE);
            out.resize(out.len() + width - n, 0);
            out.extend_from_slice(&buf[..n]);
            out.resize(out.len() + body, 0);
        }
    }
    Ok(())
}
