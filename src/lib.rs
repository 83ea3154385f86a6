//! streamwatch - keep an eye on live channels
//!
//! Maintains a short list of channel URLs, polls each provider for
//! online status and viewer count, and launches an external player
//! (livestreamer, streamlink, ...) for the channel you pick.
//!
//! # Modules
//!
//! - `provider` - URL classification and the provider table
//! - `models` - Stream entries and channel status
//! - `registry` - The ordered, duplicate-free entry list
//! - `api` - Status API clients
//! - `stream` - Refresh engine and player launcher
//! - `session` - Event loop state tying it all together
//! - `config` / `store` - Configuration, settings and persistence
//! - `cli` / `commands` - Command line surface and its handlers

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod provider;
pub mod registry;
pub mod session;
pub mod store;
pub mod stream;

// Re-export commonly used types
pub use api::{RefreshError, StatusClient};
pub use config::{Config, Settings};
pub use models::{ChannelStatus, EntryKey, StreamEntry};
pub use provider::{classify, Provider, ResolveError, Resolved};
pub use registry::{Registry, RegistryError, SortKey, SortOrder};
pub use session::{LoadReport, Notice, Session, SessionError};
pub use store::Store;
pub use stream::{Event, ExitKind, LaunchError, Launcher, RefreshEngine, RefreshOutcome, WatchState};
