//! streamwatch - keep an eye on live channels
//!
//! # Usage
//!
//! ```bash
//! # Interactive monitor (auto-refresh, stdin commands)
//! streamwatch
//!
//! # One-shot commands
//! streamwatch add https://twitch.tv/somechannel
//! streamwatch list --refresh --json
//! streamwatch watch somechannel -Q 720p
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use streamwatch::cli::{Cli, Command, ExitCode, Output};
use streamwatch::commands;
use streamwatch::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    init_logging(&config);

    run(cli, &config).await.into()
}

/// Log to stderr; RUST_LOG wins over the config file's filter
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, config: &Config) -> ExitCode {
    let output = Output::new(&cli);

    match cli.command {
        Some(Command::Add(cmd)) => commands::add_cmd(cmd, config, &output).await,

        Some(Command::Remove(cmd)) => commands::remove_cmd(cmd, config, &output).await,

        Some(Command::Clear) => commands::clear_cmd(config, &output).await,

        Some(Command::List(cmd)) => commands::list_cmd(cmd, config, &output).await,

        Some(Command::Refresh) => commands::refresh_cmd(config, &output).await,

        Some(Command::Watch(cmd)) => commands::watch_cmd(cmd, config, &output).await,

        Some(Command::Quality(cmd)) => commands::quality_cmd(cmd, config, &output).await,

        Some(Command::Settings(cmd)) => commands::settings_cmd(cmd, config, &output).await,

        None => commands::monitor(config, &output).await,
    }
}
