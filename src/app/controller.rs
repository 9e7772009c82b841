//! Session controller and coordination layer
//!
//! The controller is the single entry point for events. It runs them through
//! the state machine, applies the storage effects each transition asks for,
//! publishes the live run token, and keeps the run scheduler in step with the
//! resulting mode. A background pump feeds run completions back in as
//! `RunFinished`, so a run settles whether or not anyone is waiting on it.

use crate::app::scheduler::{Completion, RunScheduler};
use crate::app::state::{Effect, Mode, ReelEvent, SessionState, StateMachine, Transition};
use crate::config::ConfigField;
use crate::domain::core::{ALPHABET, Symbol, initial_display_symbol};
use crate::domain::selection::trim_history;
use crate::storage::ReelStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Errors that can occur while setting up a session
#[derive(Debug, Error)]
pub enum AppError {
    /// The controller was created outside of a tokio runtime
    #[error("No tokio runtime available for the run scheduler: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parts of a session shared between the controller and its completion pump
struct Session<S> {
    /// Current session state; held for the whole of each transition
    state: Mutex<SessionState>,
    /// Read-only copies of the state, published after each transition
    snapshots: watch::Sender<SessionState>,
    store: S,
    rng: Mutex<StdRng>,
    scheduler: Mutex<RunScheduler>,
    live_token: watch::Sender<u64>,
}

/// Main session controller
///
/// Events are applied one at a time: the state lock is held for the whole
/// transition, including its storage effects and the scheduler update.
/// Dropping the controller stops the completion pump and cancels any
/// in-flight run.
pub struct ReelController<S: ReelStore> {
    session: Arc<Session<S>>,
    pump: JoinHandle<()>,
}

impl<S: ReelStore + 'static> ReelController<S> {
    /// Loads config and history from `store` and starts an idle session
    ///
    /// History longer than the configured bound is trimmed, and both values
    /// are written back so storage always holds sanitized data.
    ///
    /// # Returns
    /// ReelController instance or AppError if no tokio runtime is running
    pub fn bootstrap(store: S) -> Result<Self, AppError> {
        let config = store.load_config();
        let history = trim_history(&store.load_history(), config.history_size);

        store.persist_config(&config);
        store.persist_history(&history);

        tracing::debug!(?config, history_len = history.len(), "Session loaded");
        Self::with_state(store, SessionState::initial(config, history), StdRng::from_entropy())
    }

    /// Creates a controller around an explicit state and random source
    ///
    /// Storage is not read; useful for tests and embedding.
    pub fn with_state(store: S, state: SessionState, rng: StdRng) -> Result<Self, AppError> {
        let runtime = Handle::try_current()?;
        let (live_token, token_rx) = watch::channel(state.context.run_token);
        let (display_tx, _) = watch::channel(initial_display_symbol(&state.context.history));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let mut scheduler = RunScheduler::new(runtime.clone(), token_rx, display_tx, completion_tx);
        if let Some(ticket) = state.run_ticket() {
            scheduler.activate(ticket);
        }

        let (snapshots, _) = watch::channel(state.clone());
        let session = Arc::new(Session {
            state: Mutex::new(state),
            snapshots,
            store,
            rng: Mutex::new(rng),
            scheduler: Mutex::new(scheduler),
            live_token,
        });
        let pump = runtime.spawn(pump_completions(Arc::downgrade(&session), completion_rx));

        Ok(Self { session, pump })
    }
}

impl<S: ReelStore> ReelController<S> {
    /// Changes how often the reel publishes a new symbol while running
    ///
    /// Takes effect from the next run.
    pub fn set_frame_interval(&self, frame_interval: Duration) {
        lock(&self.session.scheduler).set_frame_interval(frame_interval);
    }

    /// Gets a copy of the current session state
    pub fn get_state(&self) -> SessionState {
        lock(&self.session.state).clone()
    }

    /// Subscribes to state snapshots, one per processed event
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.session.snapshots.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.session.store
    }

    /// Subscribes to the symbol currently on display
    pub fn subscribe_display(&self) -> watch::Receiver<Symbol> {
        lock(&self.session.scheduler).subscribe_display()
    }

    /// Symbol currently on display
    pub fn display_symbol(&self) -> Symbol {
        *self.subscribe_display().borrow()
    }

    /// Processes an event through the state machine
    ///
    /// # Returns
    /// The new state after processing
    pub fn dispatch(&self, event: ReelEvent) -> SessionState {
        self.session.dispatch(event)
    }

    /// Waits until the current run settles
    ///
    /// # Returns
    /// The final symbol if the run finished, or None if no run was active
    /// or it was stopped, reset or interrupted by opening settings
    pub async fn wait_for_run(&self) -> Option<Symbol> {
        let mut snapshots = self.subscribe_state();
        let token = {
            let current = snapshots.borrow_and_update();
            if current.mode != Mode::Running {
                return None;
            }
            current.context.run_token
        };

        loop {
            snapshots.changed().await.ok()?;
            let state = snapshots.borrow_and_update().clone();
            if state.context.run_token != token {
                return None;
            }
            if state.mode != Mode::Running {
                return state.context.last_final_symbol;
            }
        }
    }

    pub fn start(&self) -> SessionState {
        self.dispatch(ReelEvent::Start)
    }

    pub fn stop(&self) -> SessionState {
        self.dispatch(ReelEvent::Stop)
    }

    pub fn open_settings(&self) -> SessionState {
        self.dispatch(ReelEvent::OpenSettings)
    }

    pub fn close_settings(&self) -> SessionState {
        self.dispatch(ReelEvent::CloseSettings)
    }

    pub fn reset(&self) -> SessionState {
        self.dispatch(ReelEvent::Reset)
    }

    pub fn change_input(&self, field: ConfigField, value: impl Into<String>) -> SessionState {
        self.dispatch(ReelEvent::ChangeInput {
            field,
            value: value.into(),
        })
    }

    pub fn commit_input(&self, field: ConfigField) -> SessionState {
        self.dispatch(ReelEvent::CommitInput { field })
    }
}

impl<S: ReelStore> Drop for ReelController<S> {
    fn drop(&mut self) {
        self.pump.abort();
        lock(&self.session.scheduler).deactivate();
    }
}

/// Applies completions until the session is dropped
async fn pump_completions<S: ReelStore>(
    session: Weak<Session<S>>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
) {
    while let Some(completion) = completions.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        session.handle_completion(completion);
    }
}

impl<S: ReelStore> Session<S> {
    fn dispatch(&self, event: ReelEvent) -> SessionState {
        let mut guard = lock(&self.state);
        self.apply(&mut guard, event)
    }

    /// Applies a completion reported by the scheduler
    ///
    /// The completion's token is compared with the live token before the
    /// state is touched in any other way; a mismatch means the run was
    /// superseded and the completion is dropped.
    fn handle_completion(&self, completion: Completion) -> Option<SessionState> {
        let mut guard = lock(&self.state);
        if guard.context.run_token != completion.token || guard.mode != Mode::Running {
            tracing::debug!(
                token = completion.token,
                live = guard.context.run_token,
                "Dropped stale completion"
            );
            return None;
        }
        Some(self.apply(&mut guard, ReelEvent::RunFinished))
    }

    fn apply(&self, current: &mut SessionState, event: ReelEvent) -> SessionState {
        let previous_mode = current.mode;
        let previous_token = current.context.run_token;
        let is_reset = event == ReelEvent::Reset;
        tracing::debug!(mode = ?previous_mode, ?event, "Processing event");

        let (Transition { state, effects }, fresh_symbol) = {
            let mut rng = lock(&self.rng);
            let fresh_symbol = if is_reset {
                ALPHABET.choose(&mut *rng).copied()
            } else {
                None
            };
            (StateMachine::process_event(current.clone(), event, &mut *rng), fresh_symbol)
        };

        // Publish the token before anything else so in-flight callbacks of a
        // superseded run see the mismatch on their next check.
        if state.context.run_token != previous_token {
            self.live_token.send_replace(state.context.run_token);
        }

        for effect in &effects {
            self.apply_effect(effect);
        }

        *current = state.clone();
        self.sync_scheduler(&state, previous_mode, previous_token, fresh_symbol);
        self.snapshots.send_replace(state.clone());
        state
    }

    fn apply_effect(&self, effect: &Effect) {
        match effect {
            Effect::PersistConfig(config) => self.store.persist_config(config),
            Effect::PersistHistory(history) => self.store.persist_history(history),
            Effect::ClearStorage => self.store.reset_all(),
        }
    }

    fn sync_scheduler(
        &self,
        state: &SessionState,
        previous_mode: Mode,
        previous_token: u64,
        fresh_symbol: Option<Symbol>,
    ) {
        let mut scheduler = lock(&self.scheduler);

        match state.run_ticket() {
            Some(ticket) if scheduler.active_token() != Some(ticket.token) => {
                tracing::info!(
                    token = ticket.token,
                    delay_ms = state.context.run_delay_ms,
                    "Run started"
                );
                scheduler.activate(ticket);
            }
            Some(_) => {}
            None => scheduler.deactivate(),
        }

        let finished = previous_mode == Mode::Running
            && state.mode == Mode::Idle
            && state.context.run_token == previous_token;
        if finished {
            if let Some(symbol) = state.context.last_final_symbol {
                tracing::info!(token = previous_token, %symbol, "Run finished");
                scheduler.show(symbol);
            }
        } else if previous_mode == Mode::Running && state.mode != Mode::Running {
            tracing::info!(token = previous_token, "Run cancelled");
        }

        if let Some(symbol) = fresh_symbol {
            scheduler.show(symbol);
        }
    }
}
