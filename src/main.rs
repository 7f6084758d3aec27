//! trakbot: drive Pivotal Tracker from IRC.

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use trakbot::config::{BotConfig, ConfigOverrides, DEFAULT_CONFIG_PATH};
use trakbot::daemon;
use trakbot::session::store::SessionStore;

/// IRC bot for Pivotal Tracker.
#[derive(Parser)]
#[command(name = "trakbot", version, about)]
struct Cli {
    /// Config file (defaults to ./trakbot.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and serve commands until interrupted.
    Run(RunArgs),

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// List nicks with a saved session.
    Sessions,
}

#[derive(Args)]
struct RunArgs {
    /// IRC nick.
    #[arg(short, long)]
    nick: Option<String>,

    /// IRC server hostname.
    #[arg(short, long)]
    server: Option<String>,

    /// IRC server port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Channel to join (repeatable).
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Directory for per-nick session snapshots.
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Tracker API token for nicks that haven't set their own.
    #[arg(long, env = "TRAKBOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,
}

impl From<RunArgs> for ConfigOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            nick: args.nick,
            server: args.server,
            port: args.port,
            channels: args.channels,
            storage_dir: args.storage_dir,
            default_token: args.token,
            log_level: args.log_level,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_deref(), args).await,
        Command::Init { force } => cmd_init(cli.config.as_deref(), force),
        Command::Sessions => cmd_sessions(cli.config.as_deref()),
    }
}

async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let mut config = BotConfig::load(config_path)?;
    config.apply(args.into());
    init_tracing(&config.log_level)?;

    tracing::info!(
        nick = %config.nick,
        server = %config.server,
        port = config.port,
        channels = ?config.channels,
        "starting"
    );
    daemon::run(config).await
}

/// Write the default config.
fn cmd_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
    if path.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    let toml = BotConfig::default().to_toml()?;
    std::fs::write(path, toml).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    println!("Edit it, then run `trakbot run`.");
    Ok(())
}

/// Print the nicks that have a session snapshot.
fn cmd_sessions(config_path: Option<&Path>) -> Result<()> {
    let config = BotConfig::load(config_path)?;
    let store = SessionStore::new(config.storage_dir);
    let nicks = store.persisted_nicks()?;
    if nicks.is_empty() {
        println!("No saved sessions in {}", store.dir().display());
    } else {
        for nick in nicks {
            println!("{nick}");
        }
    }
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) -> Result<()> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| eyre!("invalid log level {level:?}"))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}
