//! Session state management
//!
//! Defines the mode state machine that owns every mutation of the session:
//! starting and cancelling runs, finalizing a run's symbol, and editing the
//! configuration. Transitions are pure; the storage writes they require are
//! returned as [`Effect`] values for the controller to apply.

use crate::config::{ConfigField, ReelConfig};
use crate::domain::core::{ALPHABET, Symbol};
use crate::domain::selection::{record_final, select_final, trim_history};
use crate::domain::timing::compute_run_delay_ms;
use rand::Rng;
use std::time::Duration;

/// Operating mode of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Waiting for the user to start a run
    #[default]
    Idle,
    /// The reel is cycling and a completion is pending
    Running,
    /// The configuration panel is open
    Settings,
}

#[cfg(test)]
impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Idle, Mode::Running, Mode::Settings];
}

/// Raw text of in-progress config edits
///
/// Buffers are independent of the committed config until a commit
/// sanitizes them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingInputs {
    pub duration: String,
    pub jitter: String,
    pub history_size: String,
}

impl PendingInputs {
    /// Seeds every buffer from the committed config
    pub fn from_config(config: &ReelConfig) -> Self {
        Self {
            duration: config.field_text(ConfigField::Duration),
            jitter: config.field_text(ConfigField::Jitter),
            history_size: config.field_text(ConfigField::HistorySize),
        }
    }

    pub fn get(&self, field: ConfigField) -> &str {
        match field {
            ConfigField::Duration => &self.duration,
            ConfigField::Jitter => &self.jitter,
            ConfigField::HistorySize => &self.history_size,
        }
    }

    pub fn set(&mut self, field: ConfigField, value: String) {
        match field {
            ConfigField::Duration => self.duration = value,
            ConfigField::Jitter => self.jitter = value,
            ConfigField::HistorySize => self.history_size = value,
        }
    }
}

/// Everything the session remembers besides its mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub config: ReelConfig,
    /// Recently finalized symbols, oldest first
    pub history: Vec<Symbol>,
    pub last_final_symbol: Option<Symbol>,
    /// Jittered delay of the current or most recent run
    pub run_delay_ms: u64,
    /// Bumped whenever a run starts, stops or is superseded
    pub run_token: u64,
    pub inputs: PendingInputs,
}

/// The session aggregate: current mode plus context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub mode: Mode,
    pub context: SessionContext,
}

impl SessionState {
    /// Creates the idle state a session starts in
    ///
    /// # Arguments
    /// * `config` - Sanitized config loaded from storage
    /// * `history` - History loaded from storage, already trimmed
    pub fn initial(config: ReelConfig, history: Vec<Symbol>) -> Self {
        Self {
            mode: Mode::Idle,
            context: SessionContext {
                inputs: PendingInputs::from_config(&config),
                config,
                history,
                last_final_symbol: None,
                run_delay_ms: 0,
                run_token: 0,
            },
        }
    }

    /// The run the scheduler should be driving, if any
    pub fn run_ticket(&self) -> Option<RunTicket> {
        match self.mode {
            Mode::Running => Some(RunTicket {
                token: self.context.run_token,
                delay: Duration::from_millis(self.context.run_delay_ms),
            }),
            Mode::Idle | Mode::Settings => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial(ReelConfig::default(), Vec::new())
    }
}

/// What the scheduler captures when a run is activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    pub token: u64,
    pub delay: Duration,
}

/// Events accepted by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReelEvent {
    /// Start a run
    Start,
    /// Cancel the current run
    Stop,
    OpenSettings,
    CloseSettings,
    /// Restore defaults and clear storage
    Reset,
    /// The current run's completion timer fired
    RunFinished,
    /// Store raw text in an input buffer
    ChangeInput { field: ConfigField, value: String },
    /// Sanitize an input buffer into the config
    CommitInput { field: ConfigField },
}

/// Storage writes requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistConfig(ReelConfig),
    PersistHistory(Vec<Symbol>),
    ClearStorage,
}

/// Result of processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// State machine for session transitions
pub struct StateMachine;

impl StateMachine {
    /// Processes an event and returns the new state with its side effects
    ///
    /// Total over every `(mode, event)` pair: combinations without a
    /// defined transition return the state unchanged and no effects.
    ///
    /// # Arguments
    /// * `state` - Current session state
    /// * `event` - Event to process
    /// * `rng` - Random source for run timing and final selection
    pub fn process_event<R: Rng + ?Sized>(
        state: SessionState,
        event: ReelEvent,
        rng: &mut R,
    ) -> Transition {
        let SessionState { mode, mut context } = state;

        match (mode, event) {
            (_, ReelEvent::Reset) => {
                let mut next = SessionState::default();
                next.context.run_token = context.run_token + 1;
                Transition {
                    state: next,
                    effects: vec![Effect::ClearStorage],
                }
            }

            (Mode::Idle | Mode::Settings, ReelEvent::Start) => {
                context.run_delay_ms = compute_run_delay_ms(&context.config, rng);
                context.run_token += 1;
                Transition::unchanged(SessionState {
                    mode: Mode::Running,
                    context,
                })
            }

            (Mode::Idle, ReelEvent::OpenSettings) => {
                context.inputs = PendingInputs::from_config(&context.config);
                Transition::unchanged(SessionState {
                    mode: Mode::Settings,
                    context,
                })
            }

            (Mode::Running, ReelEvent::Stop) => {
                context.run_token += 1;
                Transition::unchanged(SessionState {
                    mode: Mode::Idle,
                    context,
                })
            }

            (Mode::Running, ReelEvent::OpenSettings) => {
                context.run_token += 1;
                context.inputs = PendingInputs::from_config(&context.config);
                Transition::unchanged(SessionState {
                    mode: Mode::Settings,
                    context,
                })
            }

            (Mode::Running, ReelEvent::RunFinished) => {
                let history_size = context.config.history_size;
                let recent = trim_history(&context.history, history_size);
                let Some(chosen) = select_final(&ALPHABET, &recent, rng) else {
                    return Transition::unchanged(SessionState { mode, context });
                };

                context.history = record_final(&context.history, chosen, history_size);
                context.last_final_symbol = Some(chosen);
                let effects = vec![Effect::PersistHistory(context.history.clone())];
                Transition {
                    state: SessionState {
                        mode: Mode::Idle,
                        context,
                    },
                    effects,
                }
            }

            (Mode::Settings, ReelEvent::CloseSettings) => Transition::unchanged(SessionState {
                mode: Mode::Idle,
                context,
            }),

            (Mode::Settings, ReelEvent::ChangeInput { field, value }) => {
                context.inputs.set(field, value);
                Transition::unchanged(SessionState { mode, context })
            }

            (Mode::Settings, ReelEvent::CommitInput { field }) => {
                let raw = context.inputs.get(field).to_string();
                context.config.apply_field(field, &raw);
                context
                    .inputs
                    .set(field, context.config.field_text(field));

                let mut effects = vec![Effect::PersistConfig(context.config)];
                if field == ConfigField::HistorySize {
                    context.history = trim_history(&context.history, context.config.history_size);
                    effects.push(Effect::PersistHistory(context.history.clone()));
                }

                Transition {
                    state: SessionState { mode, context },
                    effects,
                }
            }

            // Invalid transitions - ignore event
            (mode, _) => Transition::unchanged(SessionState { mode, context }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    fn sym(letter: char) -> Symbol {
        Symbol::new(letter).unwrap()
    }

    fn state_in(mode: Mode) -> SessionState {
        let mut state = SessionState::initial(
            ReelConfig {
                duration_ms: 5000,
                jitter_ms: 0,
                history_size: 2,
            },
            vec![sym('A')],
        );
        state.mode = mode;
        state.context.run_token = 7;
        state
    }

    fn all_events() -> Vec<ReelEvent> {
        vec![
            ReelEvent::Start,
            ReelEvent::Stop,
            ReelEvent::OpenSettings,
            ReelEvent::CloseSettings,
            ReelEvent::Reset,
            ReelEvent::RunFinished,
            ReelEvent::ChangeInput {
                field: ConfigField::Jitter,
                value: "25".into(),
            },
            ReelEvent::CommitInput {
                field: ConfigField::HistorySize,
            },
        ]
    }

    /// Expected `(mode, token delta, effect count)` for each pair
    fn expected(mode: Mode, event: &ReelEvent) -> (Mode, u64, usize) {
        use ReelEvent::*;
        match (mode, event) {
            (_, Reset) => (Mode::Idle, 1, 1),
            (Mode::Idle, Start) => (Mode::Running, 1, 0),
            (Mode::Idle, OpenSettings) => (Mode::Settings, 0, 0),
            (Mode::Running, Stop) => (Mode::Idle, 1, 0),
            (Mode::Running, OpenSettings) => (Mode::Settings, 1, 0),
            (Mode::Running, RunFinished) => (Mode::Idle, 0, 1),
            (Mode::Settings, CloseSettings) => (Mode::Idle, 0, 0),
            (Mode::Settings, Start) => (Mode::Running, 1, 0),
            (Mode::Settings, ChangeInput { .. }) => (Mode::Settings, 0, 0),
            (Mode::Settings, CommitInput { .. }) => (Mode::Settings, 0, 2),
            (mode, _) => (mode, 0, 0),
        }
    }

    #[test]
    fn transition_table_is_total() {
        for mode in Mode::ALL {
            for event in all_events() {
                let before = state_in(mode);
                let (want_mode, token_delta, effect_count) = expected(mode, &event);

                let Transition { state, effects } =
                    StateMachine::process_event(before.clone(), event.clone(), &mut rng());

                assert_eq!(state.mode, want_mode, "{mode:?} + {event:?}");
                assert_eq!(
                    state.context.run_token,
                    before.context.run_token + token_delta,
                    "{mode:?} + {event:?}"
                );
                assert_eq!(effects.len(), effect_count, "{mode:?} + {event:?}");
                if (want_mode, token_delta, effect_count) == (mode, 0, 0)
                    && !matches!(event, ReelEvent::ChangeInput { .. })
                {
                    assert_eq!(state, before, "{mode:?} + {event:?} should be a no-op");
                }
            }
        }
    }

    #[test]
    fn start_computes_delay_and_bumps_token() {
        let state = SessionState::initial(
            ReelConfig {
                duration_ms: 5000,
                jitter_ms: 0,
                history_size: 2,
            },
            Vec::new(),
        );

        let next = StateMachine::process_event(state, ReelEvent::Start, &mut rng()).state;

        assert_eq!(next.mode, Mode::Running);
        assert_eq!(next.context.run_delay_ms, 5000);
        assert_eq!(next.context.run_token, 1);
        assert_eq!(
            next.run_ticket(),
            Some(RunTicket {
                token: 1,
                delay: Duration::from_millis(5000)
            })
        );
    }

    #[test]
    fn run_finished_records_symbol_and_persists_history() {
        let running = state_in(Mode::Running);

        let Transition { state, effects } =
            StateMachine::process_event(running, ReelEvent::RunFinished, &mut rng());

        let chosen = state.context.last_final_symbol.unwrap();
        assert_ne!(chosen, sym('A'));
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.context.history, vec![sym('A'), chosen]);
        assert_eq!(effects, vec![Effect::PersistHistory(vec![sym('A'), chosen])]);
        assert_eq!(state.run_ticket(), None);
    }

    #[test]
    fn run_finished_with_zero_history_size_keeps_nothing() {
        let mut running = state_in(Mode::Running);
        running.context.config.history_size = 0;
        running.context.history.clear();

        let state = StateMachine::process_event(running, ReelEvent::RunFinished, &mut rng()).state;

        assert!(state.context.history.is_empty());
        assert!(state.context.last_final_symbol.is_some());
    }

    #[test]
    fn stale_run_finished_is_ignored() {
        for mode in [Mode::Idle, Mode::Settings] {
            let before = state_in(mode);
            let after =
                StateMachine::process_event(before.clone(), ReelEvent::RunFinished, &mut rng());
            assert_eq!(after.state, before);
            assert!(after.effects.is_empty());
        }
    }

    #[test]
    fn reset_restores_defaults_and_invalidates_run() {
        let mut running = state_in(Mode::Running);
        running.context.last_final_symbol = Some(sym('Q'));

        let Transition { state, effects } =
            StateMachine::process_event(running, ReelEvent::Reset, &mut rng());

        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.context.config, ReelConfig::default());
        assert!(state.context.history.is_empty());
        assert_eq!(state.context.last_final_symbol, None);
        assert_eq!(state.context.inputs, PendingInputs::from_config(&ReelConfig::default()));
        assert_eq!(state.context.run_token, 8);
        assert_eq!(effects, vec![Effect::ClearStorage]);
    }

    #[test]
    fn change_input_stores_raw_text() {
        let settings = state_in(Mode::Settings);

        let state = StateMachine::process_event(
            settings,
            ReelEvent::ChangeInput {
                field: ConfigField::Duration,
                value: "not a number".into(),
            },
            &mut rng(),
        )
        .state;

        assert_eq!(state.context.inputs.duration, "not a number");
        assert_eq!(state.context.config.duration_ms, 5000);
    }

    #[test]
    fn commit_of_garbage_duration_uses_default() {
        let mut settings = state_in(Mode::Settings);
        settings.context.config.duration_ms = 9000;
        settings.context.inputs.duration = "abc".into();

        let Transition { state, effects } = StateMachine::process_event(
            settings,
            ReelEvent::CommitInput {
                field: ConfigField::Duration,
            },
            &mut rng(),
        );

        assert_eq!(state.context.config.duration_ms, 5000);
        assert_eq!(state.context.inputs.duration, "5000");
        assert_eq!(effects, vec![Effect::PersistConfig(state.context.config)]);
    }

    #[test]
    fn commit_history_size_trims_history() {
        let mut settings = state_in(Mode::Settings);
        settings.context.config.history_size = 5;
        settings.context.history = vec![sym('A'), sym('B'), sym('C')];
        settings.context.inputs.history_size = "1.8".into();

        let Transition { state, effects } = StateMachine::process_event(
            settings,
            ReelEvent::CommitInput {
                field: ConfigField::HistorySize,
            },
            &mut rng(),
        );

        assert_eq!(state.context.config.history_size, 1);
        assert_eq!(state.context.history, vec![sym('C')]);
        assert_eq!(state.context.inputs.history_size, "1");
        assert_eq!(
            effects,
            vec![
                Effect::PersistConfig(state.context.config),
                Effect::PersistHistory(vec![sym('C')]),
            ]
        );
    }

    #[test]
    fn committing_same_value_twice_is_idempotent() {
        let mut settings = state_in(Mode::Settings);
        settings.context.inputs.jitter = "120.5".into();
        let commit = ReelEvent::CommitInput {
            field: ConfigField::Jitter,
        };

        let once = StateMachine::process_event(settings, commit.clone(), &mut rng()).state;
        let twice = StateMachine::process_event(once.clone(), commit, &mut rng()).state;

        assert_eq!(once.context.config.jitter_ms, 120);
        assert_eq!(once.context.config, twice.context.config);
        assert_eq!(once.context.inputs, twice.context.inputs);
    }

    #[test]
    fn opening_settings_discards_uncommitted_edits() {
        let mut idle = state_in(Mode::Idle);
        idle.context.inputs.duration = "stale".into();

        let state = StateMachine::process_event(idle, ReelEvent::OpenSettings, &mut rng()).state;

        assert_eq!(state.context.inputs.duration, "5000");
    }

    fn any_event() -> impl Strategy<Value = ReelEvent> {
        let field = prop_oneof![
            Just(ConfigField::Duration),
            Just(ConfigField::Jitter),
            Just(ConfigField::HistorySize),
        ];
        prop_oneof![
            Just(ReelEvent::Start),
            Just(ReelEvent::Stop),
            Just(ReelEvent::OpenSettings),
            Just(ReelEvent::CloseSettings),
            Just(ReelEvent::Reset),
            Just(ReelEvent::RunFinished),
            (field.clone(), "[0-9a-z.\\-]{0,5}")
                .prop_map(|(field, value)| ReelEvent::ChangeInput { field, value }),
            field.prop_map(|field| ReelEvent::CommitInput { field }),
        ]
    }

    proptest! {
        #[test]
        fn history_never_exceeds_bound(events in prop::collection::vec(any_event(), 0..80), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = SessionState::default();

            for event in events {
                let before_token = state.context.run_token;
                let starting = event == ReelEvent::Start && state.mode != Mode::Running;
                state = StateMachine::process_event(state, event, &mut rng).state;

                prop_assert!(state.context.history.len() <= state.context.config.history_size);
                prop_assert!(state.context.run_token >= before_token);
                prop_assert!(state.context.config.duration_ms >= ReelConfig::MIN_DURATION_MS);
                if starting {
                    prop_assert!(state.context.run_token > before_token);
                }
            }
        }
    }
}
