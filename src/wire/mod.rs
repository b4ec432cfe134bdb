//! Stdio stream handling for the agent process.
//!
//! Submodules:
//! - `codec`: NDJSON encoding and the buffering [`WireDecoder`](codec::WireDecoder).
//! - `reader`: stdout task that publishes decoded events on the bus.
//! - `diagnostics`: stderr task that classifies diagnostic lines.

pub mod codec;
pub mod diagnostics;
pub mod reader;
