use crate::error::WireError;
use crate::type_id::{HeaderKind, TypeCode, TypeId, VARIABLE_LENGTH_NIBBLE, classify_checked};
use crate::varuint::{MAX_ENCODED_VARUINT_BYTES, decode_varuint, encode_varuint};

/// Largest length that fits in the low nibble of a type ID.
pub const MAX_EMBEDDED_LENGTH: usize = 13;

/// A fully decoded value header: type ID plus its optional length field.
///
/// ```text
/// ┌─────────────────────────────────────────┐
/// │ type ID      (1 byte: T << 4 | L)       │
/// │ length       (VarUInt, only if L = 0xE) │
/// │ representation [length bytes]           │
/// └─────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueHeader {
    pub type_id: TypeId,
    /// Bytes occupied by the type ID and the length field.
    pub header_len: usize,
    /// Bytes of representation that follow the header.
    pub length: u64,
}

impl ValueHeader {
    /// Total encoded size: header plus representation.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.header_len as u64 + self.length
    }

    /// Parse a header from the start of `buf` without any context.
    ///
    /// Version markers are reported with `length = 3` so the caller can skip
    /// them like any other unit.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if the slice ends inside the header.
    /// - [`WireError::InvalidTypeId`] for illegal type ID bytes.
    /// - [`WireError::VarUIntTooLarge`] for an over-long length field.
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        let byte = *buf.first().ok_or(WireError::UnexpectedEof { offset: 0 })?;
        let type_id = classify_checked(byte)?;

        if type_id.header_kind() == HeaderKind::VersionMarker {
            return Ok(Self {
                type_id,
                header_len: 1,
                length: crate::version_marker::IVM_REMAINING_LENGTH as u64,
            });
        }

        if !type_id.is_variable_length {
            return Ok(Self {
                type_id,
                header_len: 1,
                length: u64::from(type_id.length),
            });
        }

        let (length, n) = decode_varuint(&buf[1..]).map_err(|e| match e {
            WireError::UnexpectedEof { offset } => WireError::UnexpectedEof { offset: offset + 1 },
            other => other,
        })?;
        Ok(Self {
            type_id,
            header_len: 1 + n,
            length,
        })
    }

    /// Write a type ID and length field for a value of `code`.
    ///
    /// Lengths up to 13 are embedded in the low nibble; longer values use
    /// the 0xE nibble plus a VarUInt. A struct of length 1 cannot use the
    /// embedded form (0xD1 means "ordered struct"), so it is written with
    /// an explicit length.
    ///
    /// # Returns
    ///
    /// Total number of bytes written.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `w`.
    pub fn write_to(code: TypeCode, length: usize, w: &mut impl std::io::Write) -> Result<usize, WireError> {
        let embed = length <= MAX_EMBEDDED_LENGTH && !(code == TypeCode::Struct && length == 1);
        if embed {
            #[allow(clippy::cast_possible_truncation)]
            let low_nibble = length as u8;
            w.write_all(&[code.nibble() << 4 | low_nibble])?;
            return Ok(1);
        }
        let mut varuint_buf = [0u8; MAX_ENCODED_VARUINT_BYTES];
        let n = encode_varuint(length as u64, &mut varuint_buf);
        w.write_all(&[code.nibble() << 4 | VARIABLE_LENGTH_NIBBLE])?;
        w.write_all(&varuint_buf[..n])?;
        Ok(1 + n)
    }
}
