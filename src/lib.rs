//! Polymarket market-data normalization core.
//!
//! Raw market-channel frames are parsed into typed venue events, resolved to
//! instruments, reduced against per-instrument shadow books into effective
//! deltas and turned into deduplicated top-of-book quotes.

pub mod config;
pub mod engine;
pub mod market_data;
pub mod telemetry;
