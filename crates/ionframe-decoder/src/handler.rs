use crate::error::HandlerError;

/// Receives buffer events from a [`LookaheadEngine`](crate::LookaheadEngine).
///
/// Every method has a default that does nothing, so a handler only
/// overrides what it cares about. Returning an error from any method aborts
/// the current `fill_input` call with [`DecodeError::Handler`].
///
/// ```text
///   on_data(n)                 every byte taken from the source,
///                              buffered or skipped
///   on_oversized_value()       a user value did not fit; it is skipped
///                              and the stream continues
///   on_oversized_symbol_table() a symbol table did not fit; the engine
///                              stops framing
/// ```
///
/// Each oversized unit is reported at most once, and only after the
/// engine knows whether it is a symbol table or a user value.
///
/// [`DecodeError::Handler`]: crate::DecodeError::Handler
pub trait BufferEventHandler {
    /// A user value exceeded the maximum buffer size and is being skipped.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the caller of `fill_input`.
    fn on_oversized_value(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// A symbol table exceeded the maximum buffer size.
    ///
    /// Values after it may reference symbols it declared, so the engine
    /// enters its terminal state once the table has been skipped.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the caller of `fill_input`.
    fn on_oversized_symbol_table(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// `bytes` more bytes were consumed from the source.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the caller of `fill_input`.
    fn on_data(&mut self, bytes: usize) -> Result<(), HandlerError> {
        let _ = bytes;
        Ok(())
    }
}

/// Ignores every event. Installed when no handler is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHandler;

impl BufferEventHandler for NoOpHandler {}
