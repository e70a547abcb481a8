use crate::error::WireError;

/// Maximum number of bytes a VarUInt may occupy in a header field.
///
/// Header VarUInts are accumulated into a 63-bit value, so at most
/// floor(63 / 7) = 9 bytes are allowed.
pub const MAX_VARUINT_BYTES: usize = (u64::BITS as usize - 1) / 7;

/// Number of bytes [`encode_varuint`] may write for any `u64`.
pub const MAX_ENCODED_VARUINT_BYTES: usize = 10;

const STOP_BIT: u8 = 0x80;
const DATA_BITS: u8 = 0x7F;

/// Number of bytes needed to encode `value` as a VarUInt.
#[must_use]
pub fn varuint_len(value: u64) -> usize {
    let bits = (u64::BITS - value.leading_zeros()).max(1) as usize;
    bits.div_ceil(7)
}

/// Encode `value` as an Ion VarUInt into `buf`.
///
/// VarUInts are big-endian: the most significant 7-bit group comes first
/// and the **last** byte carries the high "stop" bit. This is the opposite
/// of LEB128, where the high bit means "more bytes follow".
///
/// | Value | Encoded bytes        |
/// |-------|----------------------|
/// | 0     | `[0x80]`             |
/// | 1     | `[0x81]`             |
/// | 127   | `[0xFF]`             |
/// | 128   | `[0x01, 0x80]`       |
/// | 300   | `[0x02, 0xAC]`       |
/// | 16384 | `[0x01, 0x00, 0x80]` |
///
/// # Returns
///
/// The number of bytes written (1–10).
///
/// # Panics
///
/// Panics if `buf` is shorter than [`varuint_len`]`(value)`.
pub fn encode_varuint(value: u64, buf: &mut [u8]) -> usize {
    let len = varuint_len(value);
    for (i, slot) in buf[..len].iter_mut().enumerate() {
        let shift = 7 * (len - 1 - i);
        #[allow(clippy::cast_possible_truncation)]
        let group = ((value >> shift) as u8) & DATA_BITS;
        *slot = group;
    }
    buf[len - 1] |= STOP_BIT;
    len
}

/// Decode a complete VarUInt from the start of `buf`.
///
/// # Returns
///
/// `(value, bytes_consumed)` on success.
///
/// # Errors
///
/// - [`WireError::VarUIntTooLarge`] if [`MAX_VARUINT_BYTES`] bytes are
///   consumed without finding the stop bit.
/// - [`WireError::UnexpectedEof`] if the slice ends mid-VarUInt.
pub fn decode_varuint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let mut decoder = VarUIntDecoder::new(VarUIntLocation::ValueLength);
    for (i, &byte) in buf.iter().enumerate() {
        if let VarUIntStep::Complete(value) = decoder.accept(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(WireError::UnexpectedEof { offset: buf.len() })
}

/// Which header field a VarUInt is decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarUIntLocation {
    /// The length that follows a value type ID whose low nibble is 0xE
    /// (or an ordered struct).
    ValueLength,
    /// The length that follows an annotation wrapper type ID whose low
    /// nibble is 0xE.
    AnnotationWrapperLength,
    /// `annot_length`: the total number of bytes of SIDs that follow.
    AnnotationSidsLength,
    /// One annotation symbol ID.
    AnnotationSid,
}

/// Outcome of feeding input to a [`VarUIntDecoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarUIntStep {
    /// The stop bit was seen; the value is final.
    Complete(u64),
    /// More bytes are required. The decoder keeps its progress.
    NeedsMoreInput,
}

/// A VarUInt that may be decoded across any number of calls.
///
/// The decoder owns nothing but its progress, so it is `Copy` and can be
/// taken out of a larger state machine while bytes are pulled into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarUIntDecoder {
    location: VarUIntLocation,
    value: u64,
    bytes_read: usize,
    complete: bool,
}

impl VarUIntDecoder {
    #[must_use]
    pub const fn new(location: VarUIntLocation) -> Self {
        Self {
            location,
            value: 0,
            bytes_read: 0,
            complete: false,
        }
    }

    /// Start decoding a new field.
    pub fn reset(&mut self, location: VarUIntLocation) {
        *self = Self::new(location);
    }

    #[must_use]
    pub const fn location(&self) -> VarUIntLocation {
        self.location
    }

    /// Accumulated value. Only final once [`is_complete`](Self::is_complete).
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    #[must_use]
    pub const fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Shift one more byte into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarUIntTooLarge`] when the
    /// [`MAX_VARUINT_BYTES`]-th byte arrives without the stop bit.
    pub fn accept(&mut self, byte: u8) -> Result<VarUIntStep, WireError> {
        debug_assert!(!self.complete, "VarUInt already complete");
        self.bytes_read += 1;
        self.value = (self.value << 7) | u64::from(byte & DATA_BITS);
        if byte & STOP_BIT != 0 {
            self.complete = true;
            return Ok(VarUIntStep::Complete(self.value));
        }
        if self.bytes_read >= MAX_VARUINT_BYTES {
            return Err(WireError::VarUIntTooLarge);
        }
        Ok(VarUIntStep::NeedsMoreInput)
    }

    /// Pull bytes from `next_byte` until the VarUInt completes or no byte
    /// is available (`Ok(None)`).
    ///
    /// Progress is retained across calls, so a `NeedsMoreInput` result can
    /// be resumed by calling `step` again once more input exists.
    ///
    /// # Errors
    ///
    /// Propagates errors from `next_byte` and [`accept`](Self::accept).
    pub fn step<E, F>(&mut self, mut next_byte: F) -> Result<VarUIntStep, E>
    where
        E: From<WireError>,
        F: FnMut() -> Result<Option<u8>, E>,
    {
        if self.complete {
            return Ok(VarUIntStep::Complete(self.value));
        }
        while let Some(byte) = next_byte()? {
            if let VarUIntStep::Complete(value) = self.accept(byte)? {
                return Ok(VarUIntStep::Complete(value));
            }
        }
        Ok(VarUIntStep::NeedsMoreInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_ENCODED_VARUINT_BYTES];
        let len = encode_varuint(value, &mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn encode_zero() {
        assert_eq!(encode(0), vec![0x80]);
    }

    #[test]
    fn encode_127() {
        assert_eq!(encode(127), vec![0xFF]);
    }

    #[test]
    fn encode_128() {
        // First value requiring 2 bytes; stop bit on the last byte.
        assert_eq!(encode(128), vec![0x01, 0x80]);
    }

    #[test]
    fn encode_300() {
        assert_eq!(encode(300), vec![0x02, 0xAC]);
    }

    #[test]
    fn encode_16384() {
        assert_eq!(encode(16384), vec![0x01, 0x00, 0x80]);
    }

    #[test]
    fn lengths() {
        assert_eq!(varuint_len(0), 1);
        assert_eq!(varuint_len(127), 1);
        assert_eq!(varuint_len(128), 2);
        assert_eq!(varuint_len(u64::MAX), MAX_ENCODED_VARUINT_BYTES);
    }

    #[test]
    fn decode_boundary_values() {
        for value in [0, 1, 127, 128, 300, 16383, 16384, u64::from(u32::MAX), (1 << 63) - 1] {
            let encoded = encode(value);
            let (decoded, consumed) = decode_varuint(&encoded).unwrap();
            assert_eq!(decoded, value, "failed for {value}");
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn decode_with_trailing_bytes() {
        let (value, consumed) = decode_varuint(&[0x02, 0xAC, 0x00, 0x00]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn decode_truncated() {
        assert!(matches!(
            decode_varuint(&[0x01]),
            Err(WireError::UnexpectedEof { offset: 1 })
        ));
        assert!(matches!(
            decode_varuint(&[]),
            Err(WireError::UnexpectedEof { offset: 0 })
        ));
    }

    #[test]
    fn nine_bytes_without_stop_bit_is_too_large() {
        assert!(matches!(
            decode_varuint(&[0x00; 9]),
            Err(WireError::VarUIntTooLarge)
        ));
        // Eight continuation bytes followed by a terminator still fits.
        let mut ok = vec![0x00; 8];
        ok.push(0x81);
        assert_eq!(decode_varuint(&ok).unwrap(), (1, 9));
    }

    #[test]
    fn u64_max_does_not_fit_a_header_field() {
        assert!(matches!(
            decode_varuint(&encode(u64::MAX)),
            Err(WireError::VarUIntTooLarge)
        ));
    }

    #[test]
    fn step_resumes_after_running_dry() {
        let bytes = encode(300);
        let mut decoder = VarUIntDecoder::new(VarUIntLocation::AnnotationSid);

        let mut first = bytes[..1].iter().copied();
        let step = decoder
            .step(|| Ok::<_, WireError>(first.next()))
            .unwrap();
        assert_eq!(step, VarUIntStep::NeedsMoreInput);
        assert_eq!(decoder.bytes_read(), 1);
        assert!(!decoder.is_complete());

        let mut rest = bytes[1..].iter().copied();
        let step = decoder.step(|| Ok::<_, WireError>(rest.next())).unwrap();
        assert_eq!(step, VarUIntStep::Complete(300));
        assert_eq!(decoder.bytes_read(), 2);
        assert_eq!(decoder.location(), VarUIntLocation::AnnotationSid);
    }

    #[test]
    fn reset_clears_progress() {
        let mut decoder = VarUIntDecoder::new(VarUIntLocation::ValueLength);
        decoder.accept(0x81).unwrap();
        decoder.reset(VarUIntLocation::AnnotationWrapperLength);
        assert_eq!(decoder.value(), 0);
        assert_eq!(decoder.bytes_read(), 0);
        assert!(!decoder.is_complete());
    }

    #[test]
    fn byte_at_a_time_matches_slice_decode() {
        fn prop(value: u64) -> bool {
            let value = value >> 1;
            let encoded = encode(value);
            let mut decoder = VarUIntDecoder::new(VarUIntLocation::ValueLength);
            let mut last = VarUIntStep::NeedsMoreInput;
            for &byte in &encoded {
                last = decoder.accept(byte).unwrap();
            }
            last == VarUIntStep::Complete(value) && decoder.bytes_read() == encoded.len()
        }
        quickcheck::quickcheck(prop as fn(u64) -> bool);
    }
}
