#![warn(clippy::pedantic)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod handler;
pub mod lookahead;
pub mod marker;
pub mod reader;
pub mod source;
pub mod streaming;

pub use buffer::BoundedBuffer;
pub use config::{BufferConfig, BufferConfigBuilder, DEFAULT_INITIAL_BUFFER_SIZE, MINIMUM_MAXIMUM_BUFFER_SIZE};
pub use error::{ConfigError, DecodeError, HandlerError};
pub use handler::{BufferEventHandler, NoOpHandler};
pub use lookahead::{ION_SYMBOL_TABLE_SID, LookaheadEngine, State};
pub use marker::{SymbolTableMarker, ValueMarker};
pub use reader::{TopLevelReader, TopLevelValue};
pub use source::PushSource;
pub use streaming::StreamingReader;
