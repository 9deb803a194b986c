//! Shared types for the Weavecast upload pipeline.
//!
//! Everything that crosses a crate boundary lives here: the error
//! taxonomy, currency units, the signing-key schema, the media source
//! contract, and progress snapshots.

pub mod error;
pub mod jwk;
pub mod progress;
pub mod source;
pub mod units;

pub use error::{ErrorKind, UploadError};
pub use jwk::Jwk;
pub use progress::TransferProgress;
pub use source::{MediaMetadata, MediaSource};
pub use units::Winston;

/// Application name attached to every storage transaction.
pub const APP_NAME: &str = "Weavecast";

/// Application version attached to every storage transaction.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
