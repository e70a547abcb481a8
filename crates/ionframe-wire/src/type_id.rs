use crate::error::WireError;

/// First byte of the 4-byte Ion version marker (`E0 01 00 EA`).
///
/// On its own this byte would be an annotation wrapper with length 0,
/// which is illegal, so the classifier can recognise it unambiguously.
pub const IVM_START_BYTE: u8 = 0xE0;

/// Low nibble meaning "a VarUInt length follows the type ID byte".
pub const VARIABLE_LENGTH_NIBBLE: u8 = 0x0E;

/// Low nibble meaning "this is a typed null".
pub const NULL_NIBBLE: u8 = 0x0F;

/// The high nibble of a type ID byte.
///
/// ```text
/// ┌──────┬──────────────────────┬──────┬──────────────────────┐
/// │ T    │ Code                 │ T    │ Code                 │
/// ├──────┼──────────────────────┼──────┼──────────────────────┤
/// │ 0x0  │ null / no-op pad     │ 0x8  │ string               │
/// │ 0x1  │ bool                 │ 0x9  │ clob                 │
/// │ 0x2  │ positive int         │ 0xA  │ blob                 │
/// │ 0x3  │ negative int         │ 0xB  │ list                 │
/// │ 0x4  │ float                │ 0xC  │ sexp                 │
/// │ 0x5  │ decimal              │ 0xD  │ struct               │
/// │ 0x6  │ timestamp            │ 0xE  │ annotation wrapper   │
/// │ 0x7  │ symbol               │ 0xF  │ reserved             │
/// └──────┴──────────────────────┴──────┴──────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    NullOrNop = 0x0,
    Bool = 0x1,
    PosInt = 0x2,
    NegInt = 0x3,
    Float = 0x4,
    Decimal = 0x5,
    Timestamp = 0x6,
    Symbol = 0x7,
    String = 0x8,
    Clob = 0x9,
    Blob = 0xA,
    List = 0xB,
    Sexp = 0xC,
    Struct = 0xD,
    AnnotationWrapper = 0xE,
    Reserved = 0xF,
}

impl TypeCode {
    /// Decode the high nibble of a type ID byte.
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => Self::NullOrNop,
            0x1 => Self::Bool,
            0x2 => Self::PosInt,
            0x3 => Self::NegInt,
            0x4 => Self::Float,
            0x5 => Self::Decimal,
            0x6 => Self::Timestamp,
            0x7 => Self::Symbol,
            0x8 => Self::String,
            0x9 => Self::Clob,
            0xA => Self::Blob,
            0xB => Self::List,
            0xC => Self::Sexp,
            0xD => Self::Struct,
            0xE => Self::AnnotationWrapper,
            _ => Self::Reserved,
        }
    }

    /// The high nibble this code occupies in a type ID byte.
    #[must_use]
    pub const fn nibble(self) -> u8 {
        self as u8
    }
}

/// The data-model type of a value, as seen by the consuming reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Struct,
}

/// How the framing engine has to treat a header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// `0xE0`: the first byte of a version marker.
    VersionMarker,
    /// Illegal encoding. Must fail as soon as it is read.
    Invalid,
    /// Typed null or boolean: the header byte is the whole value.
    SingleByte,
    /// No-op padding, possibly followed by a VarUInt length.
    NopPad,
    /// Annotation wrapper around exactly one value.
    AnnotationWrapper,
    /// Any other value with an embedded or VarUInt length.
    Value,
}

/// Everything that can be derived from a single type ID byte.
///
/// Instances are immutable and live in the static [`TYPE_IDS`] table;
/// [`classify`] is a plain index into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeId {
    /// The raw header byte.
    pub byte: u8,
    /// The high nibble.
    pub code: TypeCode,
    /// The low nibble.
    pub low_nibble: u8,
    /// The length embedded in the low nibble. Zero for nulls, booleans and
    /// variable-length encodings.
    pub length: u8,
    /// True when a VarUInt length follows the type ID byte.
    pub is_variable_length: bool,
    /// True for typed nulls (`null.int`, `null.struct`, ...).
    pub is_null: bool,
    /// True for no-op padding (`0x00` through `0x0E`).
    pub is_nop_pad: bool,
    /// False when this byte can never start a well-formed value.
    pub is_valid: bool,
}

impl TypeId {
    const fn from_byte(byte: u8) -> Self {
        let code = TypeCode::from_nibble(byte >> 4);
        let low_nibble = byte & 0x0F;
        let is_null = low_nibble == NULL_NIBBLE && !matches!(code, TypeCode::AnnotationWrapper | TypeCode::Reserved);
        let is_nop_pad = matches!(code, TypeCode::NullOrNop) && !is_null;

        // Ordered structs (0xD1) always carry a VarUInt length.
        let is_variable_length = !is_null
            && !matches!(code, TypeCode::Bool)
            && (low_nibble == VARIABLE_LENGTH_NIBBLE
                || (matches!(code, TypeCode::Struct) && low_nibble == 1));

        let length = if is_null || is_variable_length || matches!(code, TypeCode::Bool) {
            0
        } else {
            low_nibble
        };

        let is_valid = match code {
            TypeCode::Bool => low_nibble <= 1 || is_null,
            // Negative zero is not a legal integer.
            TypeCode::NegInt => low_nibble != 0,
            TypeCode::Float => matches!(low_nibble, 0 | 4 | 8) || is_null,
            TypeCode::Timestamp => low_nibble != 1,
            TypeCode::AnnotationWrapper => low_nibble >= 3 && low_nibble != NULL_NIBBLE,
            TypeCode::Reserved => false,
            _ => true,
        };

        Self {
            byte,
            code,
            low_nibble,
            length,
            is_variable_length,
            is_null,
            is_nop_pad,
            is_valid,
        }
    }

    /// Classify this byte for the framing engine.
    #[must_use]
    pub const fn header_kind(&self) -> HeaderKind {
        if self.byte == IVM_START_BYTE {
            HeaderKind::VersionMarker
        } else if !self.is_valid {
            HeaderKind::Invalid
        } else if self.is_nop_pad {
            HeaderKind::NopPad
        } else if self.is_null || matches!(self.code, TypeCode::Bool) {
            HeaderKind::SingleByte
        } else if matches!(self.code, TypeCode::AnnotationWrapper) {
            HeaderKind::AnnotationWrapper
        } else {
            HeaderKind::Value
        }
    }

    /// True when the header byte is the entire encoded value.
    #[must_use]
    pub const fn is_single_byte(&self) -> bool {
        matches!(self.header_kind(), HeaderKind::SingleByte)
    }

    #[must_use]
    pub const fn is_struct(&self) -> bool {
        matches!(self.code, TypeCode::Struct)
    }

    #[must_use]
    pub const fn is_annotation_wrapper(&self) -> bool {
        matches!(self.code, TypeCode::AnnotationWrapper)
    }

    /// The data-model type, or `None` for padding, wrappers and reserved bytes.
    #[must_use]
    pub const fn ion_type(&self) -> Option<IonType> {
        match self.code {
            TypeCode::NullOrNop if self.is_null => Some(IonType::Null),
            TypeCode::NullOrNop | TypeCode::AnnotationWrapper | TypeCode::Reserved => None,
            TypeCode::Bool => Some(IonType::Bool),
            TypeCode::PosInt | TypeCode::NegInt => Some(IonType::Int),
            TypeCode::Float => Some(IonType::Float),
            TypeCode::Decimal => Some(IonType::Decimal),
            TypeCode::Timestamp => Some(IonType::Timestamp),
            TypeCode::Symbol => Some(IonType::Symbol),
            TypeCode::String => Some(IonType::String),
            TypeCode::Clob => Some(IonType::Clob),
            TypeCode::Blob => Some(IonType::Blob),
            TypeCode::List => Some(IonType::List),
            TypeCode::Sexp => Some(IonType::Sexp),
            TypeCode::Struct => Some(IonType::Struct),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn build_table() -> [TypeId; 256] {
    let mut table = [TypeId::from_byte(0); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = TypeId::from_byte(i as u8);
        i += 1;
    }
    table
}

/// Precomputed classification of every possible header byte.
pub static TYPE_IDS: [TypeId; 256] = build_table();

/// Look up the [`TypeId`] for a header byte.
#[must_use]
pub fn classify(byte: u8) -> TypeId {
    TYPE_IDS[usize::from(byte)]
}

/// Like [`classify`], but rejects bytes that can never start a value.
///
/// The version-marker start byte is accepted; callers that see it in a
/// position where an IVM is illegal must reject it themselves.
///
/// # Errors
///
/// Returns [`WireError::InvalidTypeId`] for reserved or malformed headers.
pub fn classify_checked(byte: u8) -> Result<TypeId, WireError> {
    let tid = classify(byte);
    match tid.header_kind() {
        HeaderKind::Invalid => Err(WireError::InvalidTypeId { byte }),
        _ => Ok(tid),
    }
}
