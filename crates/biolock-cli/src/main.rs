//! biolock - demo host shell for the biometric app-lock guard
//!
//! Stands in for the mobile app shell: it wires the guard to a simulated
//! sensor and a file-backed store, then drives it from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biolock_core::{
    capability, FileStore, GuardConfig, GuardStatus, LifecycleEvent, LockGuard, LockScreen,
    Modality, Settings, SimulatedProbe, UnlockPrompt,
};

#[derive(Parser)]
#[command(name = "biolock")]
#[command(about = "Biometric app-lock demo shell with a simulated sensor", long_about = None)]
#[command(version)]
struct Cli {
    /// Guard configuration file (JSON), defaults to $BIOLOCK_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Settings store file (JSON)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Simulate a device without biometric hardware
    #[arg(long, global = true)]
    no_hardware: bool,

    /// Simulate hardware with nothing enrolled
    #[arg(long, global = true)]
    not_enrolled: bool,

    /// Modalities the simulated sensor supports
    #[arg(long, global = true, value_enum, value_delimiter = ',', default_value = "fingerprint")]
    modality: Vec<ModalityArg>,

    /// Make the simulated sensor decline every challenge
    #[arg(long, global = true)]
    decline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the guard state after startup
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe the simulated sensor
    Probe,

    /// Turn on lock-on-launch (requires a successful challenge)
    Enable,

    /// Turn off lock-on-launch
    Disable,

    /// Start the app and try to get past the lock screen
    Unlock,

    /// Run a test challenge from the settings screen
    Test,

    /// Start, unlock, go to background, come back and unlock again
    Session,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModalityArg {
    Fingerprint,
    Face,
    Iris,
    Generic,
}

impl From<ModalityArg> for Modality {
    fn from(arg: ModalityArg) -> Self {
        match arg {
            ModalityArg::Fingerprint => Modality::Fingerprint,
            ModalityArg::Face => Modality::Face,
            ModalityArg::Iris => Modality::Iris,
            ModalityArg::Generic => Modality::Generic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biolock=info,biolock_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("BIOLOCK_CONFIG").map(PathBuf::from));
    let config = load_config(config_path)?;
    let probe = Arc::new(simulated_probe(&cli));

    if let Commands::Probe = cli.command {
        let snapshot = capability::probe(&*probe).await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let store_path = cli.store.clone().unwrap_or_else(FileStore::default_path);
    let store = Arc::new(
        FileStore::open(&store_path)
            .with_context(|| format!("Failed to open settings store {:?}", store_path))?,
    );

    let guard = Arc::new(LockGuard::initialize(probe, store, config).await);

    match cli.command {
        Commands::Status { json } => {
            let status = guard.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::Probe => {}
        Commands::Enable => {
            let message = Settings::new(guard.clone()).set_lock_enabled(true).await?;
            println!("{}", message);
        }
        Commands::Disable => {
            let message = Settings::new(guard.clone()).set_lock_enabled(false).await?;
            println!("{}", message);
        }
        Commands::Unlock => {
            let screen = LockScreen::new(guard.clone());
            unlock(&screen).await;
        }
        Commands::Test => {
            let message = Settings::new(guard.clone()).test_authentication().await?;
            println!("{}", message);
        }
        Commands::Session => {
            let screen = LockScreen::new(guard.clone());
            print_status(&guard.status());
            unlock(&screen).await;

            info!("Simulating app backgrounding");
            guard.handle_lifecycle(LifecycleEvent::Background);
            print_status(&guard.status());

            guard.handle_lifecycle(LifecycleEvent::Foreground);
            unlock(&screen).await;
            print_status(&guard.status());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<GuardConfig> {
    let explicit = path.is_some();
    let path = path.unwrap_or_else(GuardConfig::default_path);

    if path.exists() {
        return GuardConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path));
    }
    if explicit {
        anyhow::bail!("Config file not found: {:?}", path);
    }

    let config = GuardConfig::default();
    config
        .save(&path)
        .with_context(|| format!("Failed to write default config {:?}", path))?;
    info!("Created default config at {:?}", path);
    Ok(config)
}

fn simulated_probe(cli: &Cli) -> SimulatedProbe {
    let modalities = cli.modality.iter().copied().map(Modality::from).collect();
    let hardware = !cli.no_hardware;
    let probe = SimulatedProbe::new(hardware, hardware && !cli.not_enrolled, modalities);
    probe.set_accept(!cli.decline);
    probe
}

async fn unlock(screen: &LockScreen) {
    if !screen.should_show() {
        println!("App content visible");
        return;
    }

    println!("{}", screen.sensor_label());
    println!("{}", screen.instruction());

    let prompt = screen.attempt_unlock().await;
    match prompt {
        UnlockPrompt::Unlocked => println!("App content visible"),
        _ if prompt.can_retry() => {
            println!("Authentication Failed: {} (Try Again)", prompt.message())
        }
        _ => println!("{}", prompt.message()),
    }
}

fn print_status(status: &GuardStatus) {
    println!("State:               {}", status.state);
    println!("Lock enabled:        {}", if status.enabled { "Yes" } else { "No" });
    println!(
        "Biometric available: {}",
        if status.capability.available { "Yes" } else { "No" }
    );
    if let Some(modality) = status.capability.modality {
        println!("Biometric type:      {}", modality);
    }
}
