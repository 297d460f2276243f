mod input;
mod rendering;

use clap::{ArgGroup, Parser};
use client::{Client, SessionEnd};
use log::{error, info};
use server::Server;
use shared::config::{DEFAULT_LOG_FILE, DEFAULT_PORT, DEFAULT_TICK_DELAY_MS};
use shared::{Config, LocalCommand, Role};
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::input::spawn_keyboard_reader;
use crate::rendering::TerminalSurface;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multiplayer snake in the terminal", long_about = None)]
#[command(group(ArgGroup::new("role").required(true).args(["listen", "connect"])))]
struct Args {
    /// Host a game
    #[arg(short, long)]
    listen: bool,

    /// Join a game
    #[arg(short, long)]
    connect: bool,

    /// Port to listen on or connect to
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address when hosting, server address when joining
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Tick delay in milliseconds (hosting only)
    #[arg(short, long, default_value_t = DEFAULT_TICK_DELAY_MS,
          value_parser = clap::value_parser!(u16).range(1..))]
    delay: u16,

    /// Where log output goes while the terminal is in use
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

impl Args {
    fn into_config(self) -> Config {
        let role = if self.listen { Role::Server } else { Role::Client };
        let mut config = Config::new(role);
        config.host = self.host;
        config.port = self.port;
        config.tick_delay_ms = self.delay;
        config.log_file = self.log_file;
        config
    }
}

/// Logs go to a file because the game owns the terminal
fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Forwards keys and Ctrl+C to the role loop
fn local_commands() -> mpsc::UnboundedReceiver<LocalCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    spawn_keyboard_reader(tx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(LocalCommand::Quit);
        }
    });
    rx
}

async fn host(config: &Config) -> Result<(), Box<dyn Error>> {
    let server = Server::bind(config).await?;
    let surface = TerminalSurface::open()?;

    server
        .with_surface(Box::new(surface))
        .run(local_commands())
        .await?;
    Ok(())
}

async fn join(config: &Config) -> Result<(), Box<dyn Error>> {
    let client = Client::connect(&config.connect_address()).await?;
    let surface = TerminalSurface::open()?;

    let end = client
        .with_surface(Box::new(surface))
        .run(local_commands())
        .await?;
    match end {
        SessionEnd::Quit => info!("Left the game"),
        SessionEnd::ServerClosed => info!("Server closed the game"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Args::parse().into_config();
    init_logging(&config.log_file)?;

    info!("Starting snake-arena as {:?}", config.role);

    let result = match config.role {
        Role::Server => host(&config).await,
        Role::Client => join(&config).await,
    };

    if let Err(e) = result {
        error!("Fatal: {}", e);
        eprintln!("snake-arena: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
