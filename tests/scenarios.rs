use letter_reel::app::{Mode, ReelController, SessionState};
use letter_reel::config::{ConfigField, ReelConfig};
use letter_reel::domain::{ALPHABET, Symbol, select_final};
use letter_reel::storage::{MemoryStore, ReelStore};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

fn sym(letter: char) -> Symbol {
    Symbol::new(letter).unwrap()
}

fn session(config: ReelConfig, history: Vec<Symbol>) -> ReelController<Arc<MemoryStore>> {
    ReelController::with_state(
        Arc::new(MemoryStore::new()),
        SessionState::initial(config, history),
        StdRng::seed_from_u64(2024),
    )
    .unwrap()
}

async fn elapse(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fixed_duration_run_finalizes_into_history() {
    let controller = session(
        ReelConfig {
            duration_ms: 5000,
            jitter_ms: 0,
            history_size: 2,
        },
        Vec::new(),
    );

    let running = controller.start();
    assert_eq!(running.mode, Mode::Running);
    assert_eq!(running.context.run_delay_ms, 5000);

    let chosen = controller.wait_for_run().await;

    let state = controller.get_state();
    assert_eq!(state.mode, Mode::Idle);
    assert_eq!(state.context.history.len(), 1);
    assert!(chosen.is_some());
    assert_eq!(state.context.last_final_symbol, chosen);
}

#[tokio::test(start_paused = true)]
async fn run_returns_to_idle_once_its_delay_elapses() {
    let controller = session(
        ReelConfig {
            duration_ms: 5000,
            jitter_ms: 0,
            history_size: 2,
        },
        Vec::new(),
    );

    controller.start();
    elapse(5010).await;

    let state = controller.get_state();
    assert_eq!(state.mode, Mode::Idle);
    assert_eq!(state.context.history.len(), 1);
    assert_eq!(controller.store().load_history(), state.context.history);
}

#[test]
fn recent_symbols_are_never_selected() {
    let recent = [sym('A'), sym('B')];
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..1000 {
        let chosen = select_final(&ALPHABET, &recent, &mut rng).unwrap();
        assert!(!recent.contains(&chosen));
    }
}

#[tokio::test(start_paused = true)]
async fn zero_history_size_never_retains_results() {
    let controller = session(
        ReelConfig {
            duration_ms: 1500,
            jitter_ms: 300,
            history_size: 0,
        },
        Vec::new(),
    );

    for _ in 0..5 {
        controller.start();
        controller.wait_for_run().await;
        assert!(controller.get_state().context.history.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn stop_before_completion_suppresses_finalize() {
    let controller = session(
        ReelConfig {
            duration_ms: 5000,
            jitter_ms: 0,
            history_size: 4,
        },
        vec![sym('K')],
    );

    controller.start();
    let stopped = controller.stop();
    assert_eq!(stopped.mode, Mode::Idle);

    elapse(6000).await;

    let state = controller.get_state();
    assert_eq!(state.mode, Mode::Idle);
    assert_eq!(state.context.history, vec![sym('K')]);
    assert_eq!(state.context.last_final_symbol, None);
}

#[tokio::test]
async fn garbage_duration_commit_falls_back_to_default() {
    let controller = session(
        ReelConfig {
            duration_ms: 8000,
            jitter_ms: 0,
            history_size: 4,
        },
        Vec::new(),
    );

    controller.open_settings();
    controller.change_input(ConfigField::Duration, "abc");
    let state = controller.commit_input(ConfigField::Duration);

    assert_eq!(state.context.config.duration_ms, 5000);
    assert_eq!(controller.store().load_config().duration_ms, 5000);
}

#[tokio::test]
async fn persisted_session_survives_restart() {
    let store = Arc::new(MemoryStore::new());

    {
        let controller = ReelController::bootstrap(Arc::clone(&store)).unwrap();
        controller.open_settings();
        controller.change_input(ConfigField::HistorySize, "3");
        controller.commit_input(ConfigField::HistorySize);
        controller.change_input(ConfigField::Jitter, "0");
        controller.commit_input(ConfigField::Jitter);
        controller.close_settings();
    }

    let controller = ReelController::bootstrap(store).unwrap();
    let config = controller.get_state().context.config;
    assert_eq!(config.history_size, 3);
    assert_eq!(config.jitter_ms, 0);
    assert_eq!(config.duration_ms, ReelConfig::DEFAULT_DURATION_MS);
}
