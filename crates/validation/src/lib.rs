//! Media file validation.
//!
//! Checks a selected file against size, type, duration and dimension
//! constraints before any network activity. The first failing rule
//! short-circuits; every rejection carries a human-readable message.

mod source;
mod validator;

pub use source::InMemorySource;
pub use validator::{Constraints, ValidFile, format_bytes, validate};
