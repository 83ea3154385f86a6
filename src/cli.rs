//! CLI - Command Line Interface for streamwatch
//!
//! Every action is available as a one-shot subcommand. Without a
//! subcommand, streamwatch runs an interactive monitor reading commands
//! from stdin. Output is JSON with `--json` or when stdout is not a TTY.
//!
//! # Examples
//!
//! ```bash
//! streamwatch add https://twitch.tv/somechannel
//! streamwatch list --refresh
//! streamwatch watch somechannel -Q 720p
//! streamwatch settings --player /usr/bin/streamlink --auto-update on
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::registry::{SortKey, SortOrder};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments (bad URL, unsupported host, duplicate)
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// No such stream
    NotFound = 4,
    /// Player could not be started
    LaunchFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// streamwatch - keep an eye on live channels
///
/// Run without arguments to start the interactive monitor.
#[derive(Parser, Debug)]
#[command(
    name = "streamwatch",
    version,
    about = "Track live channels and launch a player for them",
    long_about = "Keeps a list of channel URLs, shows which are live and how many \
                  people are watching, and starts livestreamer/streamlink for the \
                  one you pick.\n\n\
                  Run without arguments for the interactive monitor.",
    after_help = "EXAMPLES:\n\
                  streamwatch                                   Interactive monitor\n\
                  streamwatch add https://twitch.tv/somechannel Track a channel\n\
                  streamwatch list --refresh                    Show live status\n\
                  streamwatch watch somechannel                 Start the player"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run (omit for the interactive monitor)
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Check if running in one-shot mode (has subcommand)
    pub fn is_cli_mode(&self) -> bool {
        self.command.is_some()
    }

    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track a channel URL
    #[command(visible_alias = "a")]
    Add(AddCmd),

    /// Stop tracking a channel
    #[command(visible_alias = "rm")]
    Remove(RemoveCmd),

    /// Stop tracking every channel
    Clear,

    /// Show tracked channels
    #[command(visible_alias = "ls")]
    List(ListCmd),

    /// Query every channel's status
    #[command(visible_alias = "r")]
    Refresh,

    /// Launch the player for a channel and wait for it to exit
    #[command(visible_alias = "w")]
    Watch(WatchCmd),

    /// Set a channel's preferred quality
    Quality(QualityCmd),

    /// Show or change settings
    Settings(SettingsCmd),
}

/// Track a channel URL
#[derive(Args, Debug)]
pub struct AddCmd {
    /// Channel URL (e.g., https://twitch.tv/somechannel)
    #[arg(required = true)]
    pub url: String,

    /// Preferred quality (defaults to the configured default)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,
}

/// Stop tracking a channel
#[derive(Args, Debug)]
pub struct RemoveCmd {
    /// Channel URL or name
    #[arg(required = true)]
    pub stream: String,
}

/// Show tracked channels
#[derive(Args, Debug)]
pub struct ListCmd {
    /// Query status before listing
    #[arg(long, short = 'r')]
    pub refresh: bool,

    /// Sort column
    #[arg(long, short = 's', value_enum, default_value = "viewers")]
    pub sort: SortColumn,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,
}

impl ListCmd {
    pub fn order(&self) -> (SortKey, SortOrder) {
        let key = match self.sort {
            SortColumn::Name => SortKey::Name,
            SortColumn::Viewers => SortKey::Viewers,
        };
        let order = if self.asc {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        };
        (key, order)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Name,
    #[default]
    Viewers,
}

/// Launch the player for a channel
#[derive(Args, Debug)]
pub struct WatchCmd {
    /// Channel URL or name
    #[arg(required = true)]
    pub stream: String,

    /// Quality for this run (also becomes the preferred quality)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// Launch even if the channel looks offline
    #[arg(long, short = 'f')]
    pub force: bool,
}

/// Set a channel's preferred quality
#[derive(Args, Debug)]
pub struct QualityCmd {
    /// Channel URL or name
    #[arg(required = true)]
    pub stream: String,

    /// Quality token (best, worst, 720p, ...)
    #[arg(required = true)]
    pub quality: String,
}

/// Show or change settings
#[derive(Args, Debug)]
pub struct SettingsCmd {
    /// Player executable
    #[arg(long, short = 'p')]
    pub player: Option<String>,

    /// Default quality index (0 = best, 1 = worst)
    #[arg(long)]
    pub quality_index: Option<usize>,

    /// Refresh periodically in the monitor
    #[arg(long, value_enum)]
    pub auto_update: Option<Toggle>,

    /// Refresh interval in seconds (3 - 18000)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

impl SettingsCmd {
    pub fn is_empty(&self) -> bool {
        self.player.is_none()
            && self.quality_index.is_none()
            && self.auto_update.is_none()
            && self.interval.is_none()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

// =============================================================================
// Monitor Commands
// =============================================================================

/// A line typed into the interactive monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    Add { url: String, quality: Option<String> },
    Remove(String),
    Clear,
    List,
    Refresh,
    Watch(String),
    Quality { stream: String, quality: String },
    Help,
    Quit,
}

impl MonitorCommand {
    pub const HELP: &'static str = "commands: add <url> [quality] | remove <stream> | clear | \
                                    list | refresh | watch <stream> | quality <stream> <q> | quit";

    /// Parse one input line. Empty lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("add" | "a", [url]) => MonitorCommand::Add {
                url: url.to_string(),
                quality: None,
            },
            ("add" | "a", [url, quality]) => MonitorCommand::Add {
                url: url.to_string(),
                quality: Some(quality.to_string()),
            },
            ("remove" | "rm", [stream]) => MonitorCommand::Remove(stream.to_string()),
            ("clear", []) => MonitorCommand::Clear,
            ("list" | "ls", []) => MonitorCommand::List,
            ("refresh" | "r", []) => MonitorCommand::Refresh,
            ("watch" | "w", [stream]) => MonitorCommand::Watch(stream.to_string()),
            ("quality", [stream, quality]) => MonitorCommand::Quality {
                stream: stream.to_string(),
                quality: quality.to_string(),
            },
            ("help" | "?", []) => MonitorCommand::Help,
            ("quit" | "exit" | "q", []) => MonitorCommand::Quit,
            (verb, _) => return Err(format!("Unknown command '{}'. {}", verb, Self::HELP)),
        };
        Ok(Some(command))
    }
}

// =============================================================================
// Output
// =============================================================================

/// JSON envelope for scripted use
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

#[derive(Debug, Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl JsonOutput<()> {
    pub fn error_msg(message: &str, code: ExitCode) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(JsonError {
                message: message.to_string(),
                code: code.into(),
            }),
        }
    }
}

/// Output formatter honoring --json and --quiet
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
    /// One JSON document per line, for streams mixing results and notices
    pub compact: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
            compact: false,
        }
    }

    /// Same settings, but every JSON document on a single line
    pub fn compact(self) -> Self {
        Self {
            compact: true,
            ..self
        }
    }

    pub fn to_json<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        if self.compact {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        }
    }

    /// Print result data: JSON envelope, or each item's Display form
    pub fn print<T: Serialize + std::fmt::Display>(&self, data: &[T]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", self.to_json(&JsonOutput::success(data))?);
        } else {
            for item in data {
                println!("{}", item);
            }
        }
        Ok(())
    }

    /// Print a single serializable value
    pub fn print_value<T: Serialize>(&self, data: &T) -> anyhow::Result<()> {
        if self.json {
            println!("{}", self.to_json(&JsonOutput::success(data))?);
        } else {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = self.to_json(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_args_is_monitor_mode() {
        let cli = Cli::parse_from::<_, &str>(["streamwatch"]);
        assert!(!cli.is_cli_mode());
    }

    #[test]
    fn test_parse_add_with_quality() {
        let cli = Cli::parse_from(["streamwatch", "add", "https://twitch.tv/x", "-Q", "720p"]);
        match cli.command {
            Some(Command::Add(cmd)) => {
                assert_eq!(cmd.url, "https://twitch.tv/x");
                assert_eq!(cmd.quality.as_deref(), Some("720p"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_list_order() {
        let cli = Cli::parse_from(["streamwatch", "ls", "--sort", "name", "--asc"]);
        match cli.command {
            Some(Command::List(cmd)) => {
                assert_eq!(cmd.order(), (SortKey::Name, SortOrder::Ascending));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_monitor_command_parse() {
        assert_eq!(MonitorCommand::parse("   "), Ok(None));
        assert_eq!(
            MonitorCommand::parse("add https://twitch.tv/x 720p"),
            Ok(Some(MonitorCommand::Add {
                url: "https://twitch.tv/x".into(),
                quality: Some("720p".into())
            }))
        );
        assert_eq!(
            MonitorCommand::parse("W somechannel"),
            Ok(Some(MonitorCommand::Watch("somechannel".into())))
        );
        assert_eq!(MonitorCommand::parse("quit"), Ok(Some(MonitorCommand::Quit)));
        assert!(MonitorCommand::parse("watch").is_err());
        assert!(MonitorCommand::parse("dance now").is_err());
    }
}
