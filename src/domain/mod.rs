//! Domain logic and core data structures
//!
//! This module contains pure reel logic that is independent
//! of timers, storage backends and rendering.

pub mod core;
pub mod selection;
pub mod timing;

pub use self::core::{ALPHABET, ALPHABET_LEN, INITIAL_SYMBOL, Symbol, initial_display_symbol};
pub use self::selection::{record_final, select_final, trim_history};
pub use self::timing::compute_run_delay_ms;
