use std::fmt;

use crate::error::ConfigError;
use crate::handler::{BufferEventHandler, NoOpHandler};

/// Initial buffer size when none is configured: 32 KiB.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 32 * 1024;

/// Smallest maximum buffer size that may be configured.
///
/// A 4-byte version marker plus a 1-byte value must always fit.
pub const MINIMUM_MAXIMUM_BUFFER_SIZE: usize = 5;

/// Sizing and event delivery for a [`LookaheadEngine`](crate::LookaheadEngine).
///
/// Built with [`BufferConfig::builder`], which validates the combination
/// before any bytes are read.
///
/// ```text
/// ┌──────────────────────┬────────────────────────────────────────────┐
/// │ Setting              │ Default                                    │
/// ├──────────────────────┼────────────────────────────────────────────┤
/// │ initial_buffer_size  │ 32 KiB, or the maximum if that is smaller  │
/// │ maximum_buffer_size  │ unbounded                                  │
/// │ handler              │ NoOpHandler                                │
/// └──────────────────────┴────────────────────────────────────────────┘
/// ```
///
/// The initial size doubles as the page size: the number of bytes the
/// engine asks the source for each time the buffer has to grow.
///
/// # Example
///
/// ```rust
/// use ionframe_decoder::{BufferConfig, NoOpHandler};
///
/// let config = BufferConfig::builder()
///     .initial_buffer_size(64)
///     .maximum_buffer_size(1024)
///     .handler(NoOpHandler)
///     .build()
///     .unwrap();
/// assert_eq!(config.maximum_buffer_size(), Some(1024));
/// ```
pub struct BufferConfig {
    initial_buffer_size: usize,
    maximum_buffer_size: Option<usize>,
    handler: Box<dyn BufferEventHandler>,
}

impl BufferConfig {
    #[must_use]
    pub fn builder() -> BufferConfigBuilder {
        BufferConfigBuilder::default()
    }

    #[must_use]
    pub fn initial_buffer_size(&self) -> usize {
        self.initial_buffer_size
    }

    /// `None` means the buffer may grow without limit.
    #[must_use]
    pub fn maximum_buffer_size(&self) -> Option<usize> {
        self.maximum_buffer_size
    }

    /// Bytes requested from the source per fill.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.initial_buffer_size
    }

    pub(crate) fn into_parts(self) -> (usize, usize, Box<dyn BufferEventHandler>) {
        (
            self.initial_buffer_size,
            self.maximum_buffer_size.unwrap_or(usize::MAX),
            self.handler,
        )
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            maximum_buffer_size: None,
            handler: Box::new(NoOpHandler),
        }
    }
}

impl fmt::Debug for BufferConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferConfig")
            .field("initial_buffer_size", &self.initial_buffer_size)
            .field("maximum_buffer_size", &self.maximum_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BufferConfig`].
#[derive(Default)]
pub struct BufferConfigBuilder {
    initial_buffer_size: Option<usize>,
    maximum_buffer_size: Option<usize>,
    handler: Option<Box<dyn BufferEventHandler>>,
}

impl BufferConfigBuilder {
    #[must_use]
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = Some(size);
        self
    }

    #[must_use]
    pub fn maximum_buffer_size(mut self, size: usize) -> Self {
        self.maximum_buffer_size = Some(size);
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: impl BufferEventHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroInitialSize`] for an initial size of 0.
    /// - [`ConfigError::MaximumBelowMinimum`] if the maximum is below
    ///   [`MINIMUM_MAXIMUM_BUFFER_SIZE`].
    /// - [`ConfigError::MaximumWithoutHandler`] if a maximum is set but no
    ///   handler is, since oversized values would go unreported.
    /// - [`ConfigError::InitialExceedsMaximum`] if an explicit initial size
    ///   is larger than the maximum.
    pub fn build(self) -> Result<BufferConfig, ConfigError> {
        if self.initial_buffer_size == Some(0) {
            return Err(ConfigError::ZeroInitialSize);
        }

        let initial_buffer_size = match self.maximum_buffer_size {
            None => self.initial_buffer_size.unwrap_or(DEFAULT_INITIAL_BUFFER_SIZE),
            Some(maximum) => {
                if maximum < MINIMUM_MAXIMUM_BUFFER_SIZE {
                    return Err(ConfigError::MaximumBelowMinimum {
                        maximum,
                        minimum: MINIMUM_MAXIMUM_BUFFER_SIZE,
                    });
                }
                if self.handler.is_none() {
                    return Err(ConfigError::MaximumWithoutHandler);
                }
                match self.initial_buffer_size {
                    Some(initial) if initial > maximum => {
                        return Err(ConfigError::InitialExceedsMaximum { initial, maximum });
                    }
                    Some(initial) => initial,
                    None => DEFAULT_INITIAL_BUFFER_SIZE.min(maximum),
                }
            }
        };

        Ok(BufferConfig {
            initial_buffer_size,
            maximum_buffer_size: self.maximum_buffer_size,
            handler: self.handler.unwrap_or_else(|| Box::new(NoOpHandler)),
        })
    }
}
