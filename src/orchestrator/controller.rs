//! Watch-mode event loop.
//!
//! Owns the launcher for the lifetime of `jvs watch`. Save events and typed
//! commands are handled one at a time, so launcher operations never overlap.

use crate::config::SettingsStore;
use crate::error::LaunchError;
use crate::host::Host;
use crate::launcher::Launcher;
use crate::model::InfoEvent;
use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub(crate) const HELP: &str = "\
Commands:
  compile <file>   Compile a program in the foreground
  run <jar>        Run a jar in a fresh terminal
  close            Close the active compile or terminal
  status           Show the tool path and active sessions
  help             Show this help
  quit             Close everything and exit";

/// Commands typed while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    Compile(PathBuf),
    Run(PathBuf),
    Close,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub(crate) fn parse_command(line: &str) -> Result<Option<ControlCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let path_arg = |name: &str| -> Result<PathBuf, String> {
        let p = rest.trim_matches('"');
        if p.is_empty() {
            Err(format!("usage: {name} <path>"))
        } else {
            Ok(PathBuf::from(p))
        }
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "compile" | "c" => ControlCommand::Compile(path_arg("compile")?),
        "run" | "r" => ControlCommand::Run(path_arg("run")?),
        "close" => ControlCommand::Close,
        "status" | "s" => ControlCommand::Status,
        "help" | "?" => ControlCommand::Help,
        "quit" | "exit" | "q" => ControlCommand::Quit,
        other => return Err(format!("unknown command: {other} (type `help`)")),
    };
    Ok(Some(cmd))
}

/// Read commands from stdin until EOF. Parse errors are reported as info.
pub(crate) fn spawn_command_reader(
    cmd_tx: UnboundedSender<ControlCommand>,
    info_tx: UnboundedSender<InfoEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Ok(Some(cmd)) => {
                    if cmd_tx.send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(msg) => {
                    let _ = info_tx.send(InfoEvent::Message(msg));
                }
            }
        }
    })
}

fn info(tx: &UnboundedSender<InfoEvent>, event: InfoEvent) {
    let _ = tx.send(event);
}

/// Handle save events and commands until `quit`, shutdown, or both inputs close.
pub(crate) async fn run_controller<H: Host>(
    launcher: &mut Launcher<H>,
    settings: &SettingsStore,
    info_tx: UnboundedSender<InfoEvent>,
    mut save_rx: UnboundedReceiver<PathBuf>,
    mut cmd_rx: UnboundedReceiver<ControlCommand>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut saves_open = true;
    let mut commands_open = true;

    while saves_open || commands_open {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            saved = save_rx.recv(), if saves_open => {
                match saved {
                    Some(path) => on_save(launcher, settings, &info_tx, path),
                    None => saves_open = false,
                }
            }
            cmd = cmd_rx.recv(), if commands_open => {
                match cmd {
                    Some(ControlCommand::Quit) => break,
                    Some(cmd) => on_command(launcher, settings, &info_tx, cmd).await,
                    // stdin closed; keep compiling on save
                    None => commands_open = false,
                }
            }
        }
    }

    let count = launcher.close_all_active();
    if count > 0 {
        info(&info_tx, InfoEvent::Closed { count });
    }
    Ok(())
}

fn on_save<H: Host>(
    launcher: &mut Launcher<H>,
    settings: &SettingsStore,
    info_tx: &UnboundedSender<InfoEvent>,
    path: PathBuf,
) {
    let tool_path = settings.tool_path();
    match launcher.compile_on_save(&path, tool_path.as_deref()) {
        Ok(Some(_)) => info(info_tx, InfoEvent::Saved { path }),
        Ok(None) => info(info_tx, InfoEvent::SkippedUnconfigured { path }),
        Err(e) => info(info_tx, InfoEvent::Message(format!("Compile failed: {e}"))),
    }
}

async fn on_command<H: Host>(
    launcher: &mut Launcher<H>,
    settings: &SettingsStore,
    info_tx: &UnboundedSender<InfoEvent>,
    cmd: ControlCommand,
) {
    match cmd {
        ControlCommand::Compile(path) => {
            let tool_path = settings.tool_path();
            match launcher.compile(&path, tool_path.as_deref()).await {
                Ok(_) => {}
                // The host already told the user.
                Err(LaunchError::MissingConfiguration) => {}
                Err(e) => info(info_tx, InfoEvent::Message(format!("Compile failed: {e}"))),
            }
        }
        ControlCommand::Run(path) => {
            if let Err(e) = launcher.run(&path) {
                info(info_tx, InfoEvent::Message(format!("Run failed: {e}")));
            }
        }
        ControlCommand::Close => {
            let count = launcher.close_all_active();
            info(info_tx, InfoEvent::Closed { count });
        }
        ControlCommand::Status => {
            let tool = settings
                .tool_path()
                .unwrap_or_else(|| "(not configured)".to_string());
            info(info_tx, InfoEvent::Message(format!("Tool: {tool}")));
            if let Some((op, stage)) = launcher.last_stage() {
                info(info_tx, InfoEvent::Message(format!("Last: {op} ({stage:?})")));
            }
            if launcher.sessions().is_empty() {
                info(info_tx, InfoEvent::Message("No active sessions".into()));
            }
            for (id, label) in launcher.sessions().labels() {
                info(info_tx, InfoEvent::Message(format!("Active: {label} {id}")));
            }
        }
        ControlCommand::Help => info(info_tx, InfoEvent::Message(HELP.to_string())),
        ControlCommand::Quit => {}
    }
}
