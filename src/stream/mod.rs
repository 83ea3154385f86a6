//! Background work for tracked streams
//!
//! - Refresh: one status query per entry, results delivered as events
//! - Launcher: player child processes, their output and exit
//!
//! Both hand completions back as [`Event`]s on the session's channel; the
//! session applies them one at a time.

pub mod launcher;
pub mod refresh;

pub use launcher::{LaunchError, Launcher, WatchState};
pub use refresh::{RefreshEngine, RefreshOutcome};

use crate::api::RefreshError;
use crate::models::{ChannelStatus, EntryKey};

/// Completion delivered to the session loop
#[derive(Debug)]
pub enum Event {
    /// A status query finished
    Status {
        key: EntryKey,
        result: Result<ChannelStatus, RefreshError>,
    },
    /// One line of player output (stdout and stderr merged)
    Output { key: EntryKey, line: String },
    /// A player process is gone
    Exited { key: EntryKey, kind: ExitKind },
}

/// How a player process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Exited on its own with status 0
    Clean,
    /// Exited on its own with a failure status or a signal
    Crashed { code: Option<i32> },
    /// Stopped by us (entry removed or shutdown)
    Terminated,
}
