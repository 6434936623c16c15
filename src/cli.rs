use crate::config::{self, SettingsStore, TOOL_PATH_ENV};
use crate::error::LaunchError;
use crate::host::{ConsoleHost, Host};
use crate::launcher::{compile_task, Launcher, SessionId};
use crate::model::{InfoEvent, InvocationRequest};
use crate::orchestrator::{run_controller, spawn_command_reader, ControlCommand, SaveWatcher};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        // Lock per line: foreground tasks and terminals share this console.
        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{}", msg);
                    let _ = out.flush();
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(std::io::stderr().lock(), "{}", msg);
                }
            }
        }
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "jvs",
    version,
    about = "Compile and run Java's Cool programs with javascool-light.jar"
)]
pub struct Cli {
    /// Path to javascool-light.jar (overrides the settings file and JAVASCOOL_LIGHT_PATH)
    #[arg(long, global = true)]
    pub jar: Option<String>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile a program and wait for the compiler
    Compile {
        /// Source file to compile
        file: PathBuf,

        /// Compile the way a save does: output to the log, silent when unconfigured
        #[arg(long)]
        background: bool,

        /// Print the task as JSON instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run an executable jar in a fresh terminal
    Run {
        /// Jar to run
        jar_file: PathBuf,
    },

    /// Compile in the background every time a source file is saved
    Watch {
        /// Files or directories to watch
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Quiet period before a burst of writes counts as one save
        #[arg(long)]
        debounce: Option<humantime::Duration>,
    },

    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Store the path to javascool-light.jar
    SetPath { jar: PathBuf },
    /// Remove the stored path
    Unset,
    /// Open the settings file in an editor
    Edit,
}

/// Run the selected command and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    let store = SettingsStore::open(args.jar.clone())?;

    match args.command {
        Command::Compile {
            file,
            background,
            dry_run,
        } => {
            let file = absolute(&file)?;
            if dry_run {
                return print_task(&store, &file, background);
            }
            run_compile(&store, &file, background).await
        }
        Command::Run { jar_file } => {
            let jar_file = absolute(&jar_file)?;
            if !jar_file.is_file() {
                return Err(anyhow::anyhow!("no such file: {}", jar_file.display()));
            }
            let mut launcher = Launcher::new(console_host(&store)?);
            match launcher.dispatch(InvocationRequest::run(jar_file)).await? {
                Some(id) => wait_for(&mut launcher, id).await,
                None => Ok(0),
            }
        }
        Command::Watch { paths, debounce } => {
            run_watch(&store, &paths, debounce.map(Duration::from)).await?;
            Ok(0)
        }
        Command::Config { action } => run_config(&store, action).await,
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))
}

fn console_host(store: &SettingsStore) -> Result<ConsoleHost> {
    Ok(ConsoleHost::new(store.clone(), config::cache_dir()?))
}

/// Print the compile task as JSON. Like a save, a background dry run with
/// no tool path prints nothing.
fn print_task(store: &SettingsStore, file: &Path, background: bool) -> Result<i32> {
    let tool_path = match store.tool_path() {
        Some(tool_path) => tool_path,
        None if background => {
            log::debug!("no tool path configured, no task for {}", file.display());
            return Ok(0);
        }
        None => {
            return Err(LaunchError::MissingConfiguration).with_context(|| {
                format!("set it with `jvs config set-path` or {TOOL_PATH_ENV}")
            })
        }
    };
    let task = compile_task(&tool_path, file, background);
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(0)
}

async fn run_compile(store: &SettingsStore, file: &Path, background: bool) -> Result<i32> {
    let tool_path = store.tool_path();
    let request = if background {
        InvocationRequest::compile_on_save(file, tool_path)
    } else {
        InvocationRequest::compile(file, tool_path)
    };
    let mut launcher = Launcher::new(console_host(store)?);

    match launcher.dispatch(request).await {
        Ok(Some(id)) => wait_for(&mut launcher, id).await,
        Ok(None) => {
            log::info!("no tool path configured, not compiling");
            Ok(0)
        }
        // Already reported by the host.
        Err(LaunchError::MissingConfiguration) => Ok(1),
        Err(e) => Err(e.into()),
    }
}

/// Block until a dispatched session ends; its exit code becomes ours.
async fn wait_for<H: Host>(launcher: &mut Launcher<H>, id: SessionId) -> Result<i32> {
    let Some(mut handle) = launcher.take_session(id) else {
        return Ok(0);
    };
    let code = handle.wait().await?;
    log::debug!("{} finished with {code:?}", handle.label());
    Ok(code.unwrap_or(1))
}

async fn run_watch(store: &SettingsStore, paths: &[PathBuf], debounce: Option<Duration>) -> Result<()> {
    let settings = store.load()?;
    let debounce = debounce.unwrap_or(settings.watch.debounce);

    let (out_tx, out_handle) = spawn_output_writer();
    let (info_tx, mut info_rx) = mpsc::unbounded_channel::<InfoEvent>();
    let mut printer = tokio::spawn(async move {
        while let Some(ev) = info_rx.recv().await {
            // Replies to typed commands go to stdout, progress to stderr.
            let line = match ev {
                InfoEvent::Message(msg) => OutputLine::Stdout(msg),
                other => OutputLine::Stderr(other.to_message()),
            };
            let _ = out_tx.send(line);
        }
    });

    let (save_tx, save_rx) = mpsc::unbounded_channel::<PathBuf>();
    let watcher = SaveWatcher::start(paths, debounce, settings.watch.extensions.clone(), save_tx)?;
    let _ = info_tx.send(InfoEvent::Watching {
        paths: watcher.paths().to_vec(),
    });
    if store.tool_path().is_none() {
        let _ = info_tx.send(InfoEvent::Message(format!(
            "No javascool-light.jar configured; saves will not compile until one is set in {}",
            store.path().display()
        )));
    }
    let _ = info_tx.send(InfoEvent::Message("Type `help` for commands".into()));

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControlCommand>();
    let reader = spawn_command_reader(cmd_tx, info_tx.clone());

    // stdin carries commands, so the host must not prompt on it.
    let mut launcher = Launcher::new(console_host(store)?.non_interactive());
    let _ = info_tx.send(InfoEvent::Message(format!(
        "Background compile output: {}",
        launcher.host().background_log_path().display()
    )));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let res = run_controller(&mut launcher, store, info_tx, save_rx, cmd_rx, shutdown).await;

    drop(watcher);
    reader.abort();
    drop(launcher);
    // The stdin reader may still hold an info sender until its abort lands.
    if tokio::time::timeout(Duration::from_secs(1), &mut printer)
        .await
        .is_err()
    {
        printer.abort();
    }
    let _ = out_handle.await;
    res
}

async fn run_config(store: &SettingsStore, action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Show => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::Path => println!("{}", store.path().display()),
        ConfigAction::SetPath { jar } => {
            let jar = absolute(&jar)?;
            if !jar.is_file() {
                eprintln!("warning: {} does not exist yet", jar.display());
            }
            store.set_tool_path(Some(jar.to_string_lossy().into_owned()))?;
            eprintln!("Saved: {}", store.path().display());
        }
        ConfigAction::Unset => {
            store.set_tool_path(None)?;
            eprintln!("Saved: {}", store.path().display());
        }
        ConfigAction::Edit => {
            console_host(store)?.open_settings().await?;
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compile_flags() {
        let cli = Cli::parse_from(["jvs", "compile", "--background", "a.jvs", "--jar", "/x.jar"]);
        assert_eq!(cli.jar.as_deref(), Some("/x.jar"));
        match cli.command {
            Command::Compile {
                file,
                background,
                dry_run,
            } => {
                assert_eq!(file, PathBuf::from("a.jvs"));
                assert!(background);
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_defaults_to_current_dir() {
        let cli = Cli::parse_from(["jvs", "watch", "--debounce", "250ms"]);
        match cli.command {
            Command::Watch { paths, debounce } => {
                assert_eq!(paths, vec![PathBuf::from(".")]);
                assert_eq!(
                    debounce.map(Duration::from),
                    Some(Duration::from_millis(250))
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verbose_counts() {
        let cli = Cli::parse_from(["jvs", "-vv", "config", "path"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn dry_run_needs_a_tool_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("settings.json"));
        let err = print_task(&store, Path::new("/tmp/a.jvs"), false).unwrap_err();
        assert!(format!("{err:#}").contains("config set-path"));

        let store = store.with_cli_override(Some("/opt/jvs.jar".into()));
        assert_eq!(print_task(&store, Path::new("/tmp/a.jvs"), false).unwrap(), 0);
    }

    #[test]
    fn background_dry_run_without_tool_path_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("settings.json"));
        assert_eq!(print_task(&store, Path::new("/tmp/a.jvs"), true).unwrap(), 0);
    }
}
