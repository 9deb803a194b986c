//! Chunked transaction upload with progress tracking.
//!
//! The engine turns a fully-read payload into a tagged, signed storage
//! transaction and drives its chunks onto the network sequentially,
//! reporting progress across three bands: 0–30 for preparation, 30–90
//! for chunk transfer, 90–100 for confirmation polling.

mod engine;
mod speed;
mod tags;

pub use engine::{TransferConfig, TransferEngine, TransferOutcome, TransferRequest};
pub use speed::SpeedCalculator;
pub use tags::content_tags;
