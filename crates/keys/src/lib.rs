//! Key service: signing-key validation, address derivation, and
//! account balance snapshots.
//!
//! Structural key validation is local; address derivation goes through
//! the gateway and is the authoritative check. Balances are always
//! fresh network reads, never derived from local state.

mod account;
mod service;

pub use account::{AccountInfo, AccountWatcher};
pub use service::{KeyService, parse_key};
