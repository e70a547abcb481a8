#![warn(clippy::pedantic)]

pub mod encoder;
pub mod error;

pub use encoder::IonEncoder;
pub use error::EncodeError;
