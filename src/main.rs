mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{AppContext, DepCommand, MountCommand, StateCommand, VarCommand};
use orchbox::infra::config::{DEFAULT_LOG_LEVEL, default_config_dir, load_app_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "orchbox",
    version,
    about = "Keeps the record of containers: state, variables, dependencies and mounts"
)]
struct Cli {
    /// Configuration directory (default: ~/.config/orchbox)
    #[arg(long, env = "ORCHBOX_CONFIG_DIR", default_value_os_t = default_config_dir())]
    config_dir: PathBuf,

    /// Who is recorded as making the change
    #[arg(long, env = "ORCHBOX_ACTOR", default_value_t = default_actor())]
    actor: String,

    /// Application the change is made on behalf of
    #[arg(long = "app", env = "ORCHBOX_APP", default_value = "default")]
    application: String,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Writes the default orchbox.toml into the config directory
    Init,
    /// Creates a container from a configured image
    Create {
        name: String,
        /// Image name from the [images] catalog
        #[arg(short, long)]
        image: String,
    },
    /// Removes a container nothing depends on
    Rm { name: String },
    /// Lists containers
    Ls {
        #[arg(long)]
        json: bool,
    },
    /// Shows one container
    Show {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Drives container state
    State(StateCommand),
    /// Prints the startup order (every container if none given)
    Order { names: Vec<String> },
    /// Lists the image catalog
    Images,
    /// Container variables
    Var(VarCommand),
    /// Container dependencies
    Dep(DepCommand),
    /// Volume mounts
    Mount(MountCommand),
}

fn default_actor() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

fn init_tracing(verbose: bool, configured: &str) {
    let fallback = if verbose { "debug" } else { configured };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_tracing(cli.verbose, DEFAULT_LOG_LEVEL);
        return cli::setup::install(&cli.config_dir);
    }

    // Configuration problems are reported after logging is up
    let config = load_app_config(&cli.config_dir);
    let level = config
        .as_ref()
        .map(|c| c.log_level().to_string())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    init_tracing(cli.verbose, &level);

    let config = config
        .with_context(|| format!("loading configuration from {:?}", cli.config_dir))?;
    let app = AppContext::from_config(config, &cli.actor, &cli.application);

    match cli.command {
        Commands::Init => cli::setup::install(&cli.config_dir),
        Commands::Create { name, image } => cli::container::create(&app, &name, &image),
        Commands::Rm { name } => cli::container::remove(&app, &name),
        Commands::Ls { json } => cli::container::list(&app, json),
        Commands::Show { name, json } => cli::container::show(&app, &name, json),
        Commands::State(cmd) => cli::container::state(&app, cmd),
        Commands::Order { names } => cli::container::order(&app, &names),
        Commands::Images => cli::container::images(&app),
        Commands::Var(cmd) => cli::wiring::var(&app, cmd),
        Commands::Dep(cmd) => cli::wiring::dep(&app, cmd),
        Commands::Mount(cmd) => cli::wiring::mount(&app, cmd),
    }
}
