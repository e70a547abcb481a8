use crate::error::WireError;
use crate::type_id::IVM_START_BYTE;

/// Last byte of every version marker.
pub const IVM_END_BYTE: u8 = 0xEA;

/// Total version marker size in bytes (fixed).
pub const IVM_SIZE: usize = 4;

/// Bytes that follow the `0xE0` start byte.
pub const IVM_REMAINING_LENGTH: usize = IVM_SIZE - 1;

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// The Ion 1.0 version marker, as it appears on the wire.
pub const IVM_1_0: [u8; IVM_SIZE] = [IVM_START_BYTE, VERSION_MAJOR, VERSION_MINOR, IVM_END_BYTE];

/// Version marker. Starts a stream and resets its symbol context.
///
/// ```text
/// ┌────────┬─────────┬──────────────────────────┐
/// │ Offset │ Size    │ Description              │
/// ├────────┼─────────┼──────────────────────────┤
/// │ 0x00   │ 1 byte  │ 0xE0                     │
/// │ 0x01   │ 1 byte  │ Version major            │
/// │ 0x02   │ 1 byte  │ Version minor            │
/// │ 0x03   │ 1 byte  │ 0xEA                     │
/// └────────┴─────────┴──────────────────────────┘
/// ```
///
/// A marker may appear again anywhere at the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionMarker {
    pub major: u8,
    pub minor: u8,
}

impl Default for VersionMarker {
    fn default() -> Self {
        Self {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
        }
    }
}

impl VersionMarker {
    /// Write the 4-byte marker into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] if `buf` is shorter than
    /// [`IVM_SIZE`].
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), WireError> {
        if buf.len() < IVM_SIZE {
            return Err(WireError::UnexpectedEof { offset: buf.len() });
        }
        buf[..IVM_SIZE].copy_from_slice(&[IVM_START_BYTE, self.major, self.minor, IVM_END_BYTE]);
        Ok(())
    }

    /// Parse a full marker from the first 4 bytes of `buf`.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if the buffer is too short.
    /// - [`WireError::InvalidVersionMarker`] if the framing bytes are wrong.
    /// - [`WireError::UnsupportedVersion`] for anything but 1.0.
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < IVM_SIZE {
            return Err(WireError::UnexpectedEof { offset: buf.len() });
        }
        if buf[0] != IVM_START_BYTE {
            return Err(WireError::InvalidVersionMarker {
                found: [buf[0], buf[1], buf[2], buf[3]],
            });
        }
        Self::read_tail(&buf[1..])
    }

    /// Parse the three bytes that follow the `0xE0` start byte.
    ///
    /// The framing engine records the index of the byte after `0xE0`,
    /// so callers validating a buffered marker start from there.
    ///
    /// # Errors
    ///
    /// Same as [`read_from`](Self::read_from).
    pub fn read_tail(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < IVM_REMAINING_LENGTH {
            return Err(WireError::UnexpectedEof { offset: buf.len() });
        }
        let (major, minor, end) = (buf[0], buf[1], buf[2]);
        if end != IVM_END_BYTE {
            return Err(WireError::InvalidVersionMarker {
                found: [IVM_START_BYTE, major, minor, end],
            });
        }
        if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(WireError::UnsupportedVersion { major, minor });
        }
        Ok(Self { major, minor })
    }
}
