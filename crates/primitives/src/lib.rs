//! Small shared primitives for the tessera workspace.

mod buf;

pub use buf::{Buf20, Buf32};

/// Milliseconds since the Unix epoch, as carried in block headers.
pub type TimestampMs = u64;
