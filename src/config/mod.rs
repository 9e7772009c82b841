//! Configuration module for letter-reel
//!
//! Holds the sanitized configuration record shared between the state
//! machine, the scheduler and the storage layer, plus the rules that turn
//! raw user or storage input into valid values.

pub mod reel;

pub use reel::{
    ConfigField, RawNumber, ReelConfig, UnknownField, sanitize_duration_ms,
    sanitize_history_size, sanitize_jitter_ms,
};
