use ionframe_wire::WireError;

/// Errors that can occur while writing a test stream.
///
/// Builder methods never fail; problems are reported by
/// [`IonEncoder::encode`](crate::IonEncoder::encode).
///
/// ```text
///   EncodeError
///   ├── EmptyNopPad         ← nop_pad(0): padding is at least one byte
///   ├── EmptyAnnotations    ← annotated(&[], ..)
///   ├── Wire(WireError)     ← from ionframe-wire header writing
///   └── Io(std::io::Error)  ← from underlying writes
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no-op padding must be at least one byte long")]
    EmptyNopPad,

    #[error("an annotation wrapper needs at least one annotation")]
    EmptyAnnotations,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
