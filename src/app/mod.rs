//! Session orchestration layer
//!
//! This module coordinates the mode state machine, the run scheduler and
//! the config/history store. It owns every mutation of the session state.

pub mod controller;
pub mod scheduler;
pub mod state;

pub use controller::{AppError, ReelController};
pub use scheduler::{Completion, FRAME_INTERVAL, RunScheduler};
pub use state::{
    Effect, Mode, PendingInputs, ReelEvent, RunTicket, SessionContext, SessionState, StateMachine,
    Transition,
};
