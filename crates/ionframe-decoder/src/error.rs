use ionframe_wire::WireError;

/// Boxed error returned by a [`BufferEventHandler`](crate::BufferEventHandler).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while framing top-level values.
///
/// Malformed headers fail as soon as the offending byte is read. Oversized
/// values are not errors; they are reported through the handler.
///
/// ```text
///   DecodeError
///   ├── Wire(WireError)                   ← VarUInt overflow, bad IVM, ...
///   ├── InvalidTypeId                     ← illegal header byte in the stream
///   ├── VersionMarkerInAnnotationWrapper  ← 0xE0 wrapped by annotations
///   ├── NestedAnnotationWrapper           ← wrapper inside a wrapper
///   ├── NopPadInAnnotationWrapper         ← padding wrapped by annotations
///   ├── AnnotationWrapperLengthMismatch   ← wrapper and contents disagree
///   ├── EmptyAnnotations                  ← annot_length of zero
///   ├── NopPadTooShort                    ← stream ended inside padding
///   ├── UnexpectedEof                     ← stream ended inside a value
///   ├── NoValueBuffered                   ← rewind with nothing to rewind to
///   ├── RewindWouldDiscardSystemValues    ← rewind before consuming the value
///   ├── Handler                           ← returned by the event handler
///   └── Io(std::io::Error)                ← from the byte source
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A header byte that can never start a value.
    ///
    /// `offset` counts every byte consumed from the source before this
    /// one, whether it was buffered or skipped.
    #[error("invalid type ID {byte:#04X} at stream offset {offset}")]
    InvalidTypeId { byte: u8, offset: u64 },

    #[error("version marker inside an annotation wrapper")]
    VersionMarkerInAnnotationWrapper,

    #[error("annotation wrapper nested inside an annotation wrapper")]
    NestedAnnotationWrapper,

    #[error("no-op padding inside an annotation wrapper")]
    NopPadInAnnotationWrapper,

    /// The wrapper's declared length does not match what it contains.
    #[error("annotation wrapper has {declared} bytes left but its contents need {actual}")]
    AnnotationWrapperLengthMismatch { declared: u64, actual: u64 },

    #[error("annotation wrapper declares no annotations")]
    EmptyAnnotations,

    /// The stream ended before the final no-op pad was complete.
    #[error("no-op pad is {missing} bytes short at end of stream")]
    NopPadTooShort { missing: u64 },

    /// The stream ended part way through a top-level value.
    #[error("unexpected end of stream: {missing} more bytes required")]
    UnexpectedEof { missing: u64 },

    #[error("no value is buffered")]
    NoValueBuffered,

    /// Rewinding now would drop buffered system values that have not been
    /// handed to the consumer yet.
    #[error("the current value must be consumed before rewinding to its start")]
    RewindWouldDiscardSystemValues,

    #[error("event handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rejected buffer configuration. Raised before any bytes are read.
///
/// ```text
///   ConfigError
///   ├── ZeroInitialSize         ← initial buffer must hold at least a byte
///   ├── MaximumBelowMinimum     ← maximum smaller than the fixed floor
///   ├── InitialExceedsMaximum   ← initial larger than maximum
///   └── MaximumWithoutHandler   ← nobody to tell about oversized values
/// ```
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("initial buffer size must be at least 1")]
    ZeroInitialSize,

    #[error("maximum buffer size {maximum} is below the minimum of {minimum}")]
    MaximumBelowMinimum { maximum: usize, minimum: usize },

    #[error("initial buffer size {initial} exceeds the maximum of {maximum}")]
    InitialExceedsMaximum { initial: usize, maximum: usize },

    #[error("a maximum buffer size requires an event handler")]
    MaximumWithoutHandler,
}
