//! CLI Command Handlers
//!
//! Each handler opens a session from the saved state, runs one command
//! against it, saves what changed and returns an ExitCode. `monitor` is the
//! long-running interactive loop.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::api::StatusClient;
use crate::cli::{
    AddCmd, ExitCode, ListCmd, MonitorCommand, Output, QualityCmd, RemoveCmd, SettingsCmd, Toggle,
    WatchCmd,
};
use crate::config::Config;
use crate::registry::{SortKey, SortOrder};
use crate::session::{Notice, Session, SessionError};
use crate::store::Store;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Build a session from the data directory named by `config`
fn open_session(config: &Config, output: &Output) -> Result<Session, ExitCode> {
    let Some(dir) = config.data_dir() else {
        return Err(output.error("Could not determine data directory", ExitCode::Error));
    };
    let store = Store::new(dir);

    let settings = store.load_settings();
    let lines = match store.load_streams() {
        Ok(lines) => lines,
        Err(e) => return Err(output.error(format!("{:#}", e), ExitCode::Error)),
    };

    let mut session =
        Session::new(StatusClient::from_config(config), settings).with_store(store);
    let report = session.load(&lines);
    for error in &report.errors {
        output.info(error);
    }
    debug!(loaded = report.loaded, skipped = report.errors.len(), "streams loaded");
    Ok(session)
}

fn save(session: &Session, output: &Output) -> ExitCode {
    match session.save() {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to save: {:#}", e), ExitCode::Error),
    }
}

fn error_code(error: &SessionError) -> ExitCode {
    match error {
        SessionError::Resolve(_) | SessionError::Registry(_) => ExitCode::InvalidArgs,
        SessionError::NotFound(_) => ExitCode::NotFound,
        SessionError::Offline(_) => ExitCode::Error,
        SessionError::Launch(_) => ExitCode::LaunchFailed,
    }
}

fn fail(error: SessionError, output: &Output) -> ExitCode {
    output.error(error.to_string(), error_code(&error))
}

/// Print notices as they happen: info lines, or JSON lines in --json mode
fn emit_notices(session: &mut Session, output: &Output) {
    for notice in session.drain_notices() {
        if output.json {
            if let Ok(line) = output.compact().to_json(&notice) {
                println!("{}", line);
            }
        } else if !output.quiet {
            println!("{}", notice);
        }
    }
}

fn print_entries(session: &Session, key: SortKey, order: SortOrder, output: &Output) -> ExitCode {
    let entries = session.registry().sorted(key, order);
    if let Err(e) = output.print(&entries) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Membership Commands
// =============================================================================

pub async fn add_cmd(cmd: AddCmd, config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let key = match session.add(&cmd.url, cmd.quality.as_deref()) {
        Ok(key) => key,
        Err(e) => return fail(e, output),
    };

    session.settle_refresh().await;
    let code = save(&session, output);
    if code != ExitCode::Success {
        return code;
    }

    match session.registry().get(key) {
        Some(entry) => {
            if let Err(e) = output.print(&[entry]) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        None => ExitCode::Success,
    }
}

pub async fn remove_cmd(cmd: RemoveCmd, config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    match session.remove(&cmd.stream) {
        Some(entry) => output.info(format!("Removed {}", entry.display_name)),
        None => output.info(format!("No stream matches '{}'", cmd.stream)),
    }
    save(&session, output)
}

pub async fn clear_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let removed = session.clear();
    output.info(format!("Removed {} stream(s)", removed));
    save(&session, output)
}

// =============================================================================
// Status Commands
// =============================================================================

pub async fn list_cmd(cmd: ListCmd, config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    if cmd.refresh {
        session.refresh_all();
        session.settle_refresh().await;
        session.drain_notices();
    }

    let (key, order) = cmd.order();
    print_entries(&session, key, order, output)
}

pub async fn refresh_cmd(config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let issued = session.refresh_all();
    output.info(format!("Refreshing {} stream(s)...", issued));
    session.settle_refresh().await;

    let mut failed = 0;
    for notice in session.drain_notices() {
        if matches!(notice, Notice::RefreshFailed { .. }) {
            failed += 1;
        }
        output.info(notice);
    }

    let code = print_entries(&session, SortKey::default(), SortOrder::default(), output);
    if failed > 0 && code == ExitCode::Success {
        return output.error(
            format!("{} of {} status queries failed", failed, issued),
            ExitCode::NetworkError,
        );
    }
    code
}

// =============================================================================
// Watch Command
// =============================================================================

pub async fn watch_cmd(cmd: WatchCmd, config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    if let Some(quality) = &cmd.quality {
        if let Err(e) = session.set_quality(&cmd.stream, quality) {
            return fail(e, output);
        }
    }

    if !cmd.force {
        if let Err(e) = session.refresh(&cmd.stream) {
            return fail(e, output);
        }
        session.settle_refresh().await;
        session.drain_notices();
    }

    let key = match session.watch(&cmd.stream, cmd.force) {
        Ok(key) => key,
        Err(e) => return fail(e, output),
    };
    emit_notices(&mut session, output);

    let interrupted = tokio::select! {
        _ = session.wait_for_exit(key) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        output.info("Interrupted, stopping player...");
        session.shutdown().await;
    }

    let mut crashed = false;
    for notice in session.drain_notices() {
        crashed |= matches!(notice, Notice::ProcessCrashed { .. });
        output.info(notice);
    }

    let code = save(&session, output);
    if crashed {
        ExitCode::Error
    } else {
        code
    }
}

pub async fn quality_cmd(cmd: QualityCmd, config: &Config, output: &Output) -> ExitCode {
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    if let Err(e) = session.set_quality(&cmd.stream, &cmd.quality) {
        return fail(e, output);
    }
    save(&session, output)
}

// =============================================================================
// Settings Command
// =============================================================================

pub async fn settings_cmd(cmd: SettingsCmd, config: &Config, output: &Output) -> ExitCode {
    let Some(dir) = config.data_dir() else {
        return output.error("Could not determine data directory", ExitCode::Error);
    };
    let store = Store::new(dir);
    let mut settings = store.load_settings();

    if !cmd.is_empty() {
        if let Some(player) = &cmd.player {
            if !settings.set_player_path(player.as_str()) {
                return output.error("Player path is too short", ExitCode::InvalidArgs);
            }
        }
        if let Some(index) = cmd.quality_index {
            if !settings.set_quality_index(index) {
                return output.error(
                    format!("Quality index {} out of range", index),
                    ExitCode::InvalidArgs,
                );
            }
        }
        if let Some(toggle) = cmd.auto_update {
            settings.auto_update = toggle == Toggle::On;
        }
        if let Some(interval) = cmd.interval {
            if !settings.set_update_interval(interval) {
                return output.error(
                    format!("Interval {}s out of range (3 - 18000)", interval),
                    ExitCode::InvalidArgs,
                );
            }
        }
        if let Err(e) = store.save_settings(&settings) {
            return output.error(format!("Failed to save: {:#}", e), ExitCode::Error);
        }
    }

    if let Err(e) = output.print_value(&settings) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Interactive Monitor
// =============================================================================

enum Step {
    Event(crate::stream::Event),
    Input(Option<String>),
    Tick,
    Quit,
}

/// Run the interactive monitor until `quit`, Ctrl-C, or a fatal error
pub async fn monitor(config: &Config, output: &Output) -> ExitCode {
    // Notices and command results share stdout, one JSON document per line
    let output = &output.compact();
    let mut session = match open_session(config, output) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let issued = session.refresh_all();
    output.info(format!(
        "Tracking {} stream(s). {}",
        issued,
        MonitorCommand::HELP
    ));

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = new_ticker(session.settings().update_interval());

    loop {
        let auto_update = session.settings().auto_update;
        let step = tokio::select! {
            Some(event) = session.next_event() => Step::Event(event),
            line = input.next_line(), if stdin_open => Step::Input(line.ok().flatten()),
            _ = ticker.tick(), if auto_update => Step::Tick,
            _ = tokio::signal::ctrl_c() => Step::Quit,
        };

        match step {
            Step::Event(event) => session.handle_event(event),
            Step::Tick => {
                session.refresh_all();
            }
            Step::Input(None) => {
                debug!("stdin closed");
                stdin_open = false;
            }
            Step::Input(Some(line)) => match MonitorCommand::parse(&line) {
                Ok(Some(MonitorCommand::Quit)) => break,
                Ok(Some(command)) => run_monitor_command(&mut session, command, output),
                Ok(None) => {}
                Err(message) => {
                    output.error(message, ExitCode::InvalidArgs);
                }
            },
            Step::Quit => break,
        }
        emit_notices(&mut session, output);
    }

    output.info("Shutting down...");
    session.shutdown().await;
    emit_notices(&mut session, output);
    save(&session, output)
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn run_monitor_command(session: &mut Session, command: MonitorCommand, output: &Output) {
    let result = match command {
        MonitorCommand::Add { url, quality } => {
            session.add(&url, quality.as_deref()).map(|_| ())
        }
        MonitorCommand::Remove(stream) => {
            if session.remove(&stream).is_none() {
                output.info(format!("No stream matches '{}'", stream));
            }
            Ok(())
        }
        MonitorCommand::Clear => {
            session.clear();
            Ok(())
        }
        MonitorCommand::List => {
            print_entries(session, SortKey::default(), SortOrder::default(), output);
            Ok(())
        }
        MonitorCommand::Refresh => {
            session.refresh_all();
            Ok(())
        }
        MonitorCommand::Watch(stream) => session.watch(&stream, false).map(|_| ()),
        MonitorCommand::Quality { stream, quality } => session.set_quality(&stream, &quality),
        MonitorCommand::Help => {
            output.info(MonitorCommand::HELP);
            Ok(())
        }
        MonitorCommand::Quit => Ok(()),
    };

    if let Err(e) = result {
        output.error(e.to_string(), error_code(&e));
    }
}
