use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use letter_reel::app::{Mode, ReelController};
use letter_reel::config::ConfigField;
use letter_reel::logging::init_tracing;
use letter_reel::storage::{FileStore, MemoryStore, ReelStore, StorageBackend};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "letter-reel")]
#[command(about = "Spin a letter reel that avoids recent repeats", long_about = None)]
struct Cli {
    /// Directory holding the persisted config and history
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Keep everything in memory for this invocation
    #[arg(long, global = true, conflicts_with = "store_dir")]
    memory: bool,

    /// Log directives, overriding LETTER_REEL_LOG
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run and print the letter it settles on
    Spin {
        /// Print the cycling reel while the run is in progress
        #[arg(long)]
        show_reel: bool,

        /// Milliseconds between reel frames
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..))]
        frame_ms: u64,
    },
    /// Inspect or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the recent history, oldest first
    History,
    /// Restore defaults and clear stored history
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Set one field (duration, jitter, history-size)
    Set {
        field: ConfigField,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

fn open_store(cli: &Cli) -> Result<Arc<dyn StorageBackend>> {
    if cli.memory {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = match &cli.store_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default_location().context("No store directory available")?,
    };
    tracing::debug!(dir = %store.dir().display(), "Using file store");
    Ok(Arc::new(store))
}

async fn spin<S: ReelStore>(
    controller: &ReelController<S>,
    show_reel: bool,
    frame_ms: u64,
) -> Result<()> {
    controller.set_frame_interval(Duration::from_millis(frame_ms));
    let state = controller.start();
    if state.mode != Mode::Running {
        anyhow::bail!("Could not start a run from {:?} mode", state.mode);
    }

    let reel = show_reel.then(|| {
        let mut display = controller.subscribe_display();
        tokio::spawn(async move {
            while display.changed().await.is_ok() {
                let symbol = *display.borrow_and_update();
                print!("\r{symbol}");
                let _ = std::io::stdout().flush();
            }
        })
    });

    let outcome = tokio::select! {
        chosen = controller.wait_for_run() => chosen,
        _ = tokio::signal::ctrl_c() => {
            controller.stop();
            None
        }
    };

    if let Some(handle) = reel {
        handle.abort();
        print!("\r");
    }

    match outcome {
        Some(symbol) => println!("{symbol}"),
        None => eprintln!("Run cancelled"),
    }
    Ok(())
}

fn print_config<S: ReelStore>(controller: &ReelController<S>) {
    let config = controller.get_state().context.config;
    for field in ConfigField::ALL {
        let unit = if field == ConfigField::HistorySize { "" } else { " ms" };
        println!("{:<12} {}{}", field.name(), config.field_text(field), unit);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let store = open_store(&cli)?;
    let controller = ReelController::bootstrap(store)?;

    match cli.command {
        Commands::Spin { show_reel, frame_ms } => spin(&controller, show_reel, frame_ms).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => print_config(&controller),
            ConfigAction::Set { field, value } => {
                controller.open_settings();
                controller.change_input(field, value);
                controller.commit_input(field);
                controller.close_settings();
                print_config(&controller);
            }
        },
        Commands::History => {
            let history = controller.get_state().context.history;
            let line: Vec<String> = history.iter().map(ToString::to_string).collect();
            println!("{}", line.join(" "));
        }
        Commands::Reset => {
            controller.reset();
            println!("Configuration and history reset");
        }
    }

    Ok(())
}
