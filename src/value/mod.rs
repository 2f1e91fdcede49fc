//! Value model: cell values, column kinds, member types and the conversion
//! table between them.

pub mod conversion;
pub mod field;
pub mod types;

pub use conversion::{convert, Conversion};
pub use field::FieldValue;
pub use types::{Value, ValueKind};
