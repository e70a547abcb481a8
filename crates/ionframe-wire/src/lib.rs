#![warn(clippy::pedantic)]

pub mod error;
pub mod header;
pub mod type_id;
pub mod varuint;
pub mod version_marker;

pub use error::WireError;
pub use type_id::{HeaderKind, IonType, TypeCode, TypeId};
pub use varuint::{VarUIntDecoder, VarUIntLocation, VarUIntStep};
pub use version_marker::VersionMarker;
