//! Letter reel: a single-session randomized symbol selector.
//!
//! A run cycles through the 26 letters and settles on one after a jittered
//! delay, avoiding recently drawn letters. See [`app::ReelController`] for
//! the entry point.

pub mod app;
pub mod config;
pub mod domain;
pub mod logging;
pub mod storage;
