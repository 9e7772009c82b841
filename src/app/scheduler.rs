//! Run scheduler
//!
//! Drives the visible lifecycle of a single run: a frame-aligned tick that
//! publishes a random symbol while the reel spins, and one delayed
//! completion that asks the state machine to finalize. Every callback
//! compares the token it captured at activation with the live run token
//! before doing anything else, so work belonging to a superseded run
//! becomes inert even if cancellation has not reached it yet.

use crate::app::state::RunTicket;
use crate::domain::core::{ALPHABET, ALPHABET_LEN, Symbol};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default spacing of reel frames (about 60 per second)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// A run's completion timer fired while its token was still live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub token: u64,
}

/// Handles of the run currently being driven
struct ActiveRun {
    token: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Schedules ticks and the completion for at most one run at a time
pub struct RunScheduler {
    runtime: Handle,
    frame_interval: Duration,
    live_token: watch::Receiver<u64>,
    display: watch::Sender<Symbol>,
    completions: mpsc::UnboundedSender<Completion>,
    active: Option<ActiveRun>,
}

impl RunScheduler {
    /// Creates an idle scheduler
    ///
    /// # Arguments
    /// * `runtime` - Runtime the run tasks are spawned on
    /// * `live_token` - Current run token, published by the controller
    /// * `display` - Receives the transient reel symbol on every frame
    /// * `completions` - Receives one [`Completion`] per finished run
    pub fn new(
        runtime: Handle,
        live_token: watch::Receiver<u64>,
        display: watch::Sender<Symbol>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            runtime,
            frame_interval: FRAME_INTERVAL,
            live_token,
            display,
            completions,
            active: None,
        }
    }

    /// Sets the frame spacing used by runs activated from now on
    pub fn set_frame_interval(&mut self, frame_interval: Duration) {
        self.frame_interval = frame_interval.max(Duration::from_millis(1));
    }

    /// Token of the run being driven, if any
    pub fn active_token(&self) -> Option<u64> {
        self.active.as_ref().map(|run| run.token)
    }

    /// Starts driving `ticket`, cancelling whatever run was active
    pub fn activate(&mut self, ticket: RunTicket) {
        self.deactivate();

        let cancel = CancellationToken::new();
        let handle = self.runtime.spawn(drive_run(
            ticket,
            self.frame_interval,
            self.live_token.clone(),
            self.display.clone(),
            self.completions.clone(),
            cancel.clone(),
        ));

        tracing::debug!(token = ticket.token, delay_ms = ticket.delay.as_millis() as u64, "Run activated");
        self.active = Some(ActiveRun {
            token: ticket.token,
            cancel,
            handle,
        });
    }

    /// Cancels the outstanding tick chain and completion, if any
    pub fn deactivate(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
            run.handle.abort();
            tracing::debug!(token = run.token, "Run deactivated");
        }
    }

    /// Replaces the displayed symbol outside of a run
    pub fn show(&self, symbol: Symbol) {
        self.display.send_replace(symbol);
    }

    /// Subscribes to the displayed symbol
    pub fn subscribe_display(&self) -> watch::Receiver<Symbol> {
        self.display.subscribe()
    }
}

impl Drop for RunScheduler {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Body of one run's task
///
/// Ends after the first of: cancellation, a token mismatch on any
/// callback, or the completion being reported.
async fn drive_run(
    ticket: RunTicket,
    frame_interval: Duration,
    live_token: watch::Receiver<u64>,
    display: watch::Sender<Symbol>,
    completions: mpsc::UnboundedSender<Completion>,
    cancel: CancellationToken,
) {
    let my_token = ticket.token;
    let is_live = || *live_token.borrow() == my_token;

    let mut rng = StdRng::from_entropy();
    let mut frames = tokio::time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = tokio::time::sleep(ticket.delay);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return,

            _ = &mut deadline => {
                if !is_live() {
                    tracing::debug!(token = my_token, "Suppressed stale completion");
                    return;
                }
                if completions.send(Completion { token: my_token }).is_err() {
                    tracing::debug!(token = my_token, "Completion receiver dropped");
                }
                return;
            }

            _ = frames.tick() => {
                if !is_live() {
                    return;
                }
                display.send_replace(ALPHABET[rng.gen_range(0..ALPHABET_LEN)]);
            }
        }
    }
}
