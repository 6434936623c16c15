//! Host backed by the console the CLI runs in.
//!
//! Foreground tasks write straight to this console. Background tasks write
//! to a log file in the cache directory. Terminals are a system shell whose
//! stdin we feed and whose output shares this console.

use super::Host;
use crate::config::SettingsStore;
use crate::error::{LaunchError, LaunchResult};
use crate::launcher::{render_command_line, SessionHandle, ShellFlavor, TerminalHandle};
use crate::model::{RevealKind, TaskSpec};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// File background compiles write to, truncated per run.
const BACKGROUND_LOG: &str = "compile.log";

pub struct ConsoleHost {
    settings: SettingsStore,
    log_dir: PathBuf,
    /// Whether notifications may prompt on stdin.
    interactive: bool,
    flavor: ShellFlavor,
}

impl ConsoleHost {
    pub fn new(settings: SettingsStore, log_dir: PathBuf) -> Self {
        Self {
            settings,
            log_dir,
            interactive: std::io::stdin().is_terminal(),
            flavor: ShellFlavor::native(),
        }
    }

    /// Never prompt, e.g. when stdin carries commands.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn background_log_path(&self) -> PathBuf {
        self.log_dir.join(BACKGROUND_LOG)
    }

    fn background_output(&self, task: &TaskSpec, command_line: &str) -> Result<std::fs::File> {
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("create directory {}", self.log_dir.display()))?;
        let path = self.background_log_path();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(!task.presentation.clear)
            .truncate(task.presentation.clear)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        if task.presentation.echo {
            let stamp = time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into());
            writeln!(file, "[{stamp}] > {command_line}")?;
        }
        Ok(file)
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> LaunchError {
    LaunchError::ProcessSpawn {
        program: program.to_string(),
        source,
    }
}

fn clear_screen() {
    let mut out = std::io::stdout();
    let _ = crossterm::execute!(
        out,
        crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
        crossterm::cursor::MoveTo(0, 0)
    );
}

/// Watch a child until it exits or a kill is requested. Dropping the kill
/// sender counts as a kill request.
fn monitor(
    label: String,
    mut child: Child,
) -> (oneshot::Sender<()>, oneshot::Receiver<Option<i32>>) {
    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<Option<i32>>();
    tokio::spawn(async move {
        let code = tokio::select! {
            status = child.wait() => match status {
                Ok(s) => {
                    log::debug!("{label} exited with {s}");
                    s.code()
                }
                Err(e) => {
                    log::warn!("{label}: wait failed: {e}");
                    None
                }
            },
            _ = kill_rx => {
                log::debug!("{label}: kill requested");
                // Advisory: the child itself is killed, its descendants may live on.
                let _ = child.start_kill();
                let _ = child.wait().await;
                None
            }
        };
        let _ = done_tx.send(code);
    });
    (kill_tx, done_rx)
}

/// A running compile.
struct TaskSession {
    label: String,
    kill_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<Option<i32>>>,
}

async fn await_exit(done_rx: &mut Option<oneshot::Receiver<Option<i32>>>) -> Result<Option<i32>> {
    match done_rx.take() {
        Some(rx) => rx.await.context("process monitor stopped"),
        None => Ok(None),
    }
}

#[async_trait]
impl SessionHandle for TaskSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn dispose(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        await_exit(&mut self.done_rx).await
    }
}

/// An interactive shell fed through its stdin.
struct ShellTerminal {
    name: String,
    input_tx: Option<mpsc::UnboundedSender<String>>,
    kill_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<Option<i32>>>,
}

fn shell_command() -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd.exe");
        cmd.arg("/Q");
        cmd
    } else {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        Command::new(shell)
    }
}

/// Line terminator the shell expects for "execute".
fn enter_key() -> &'static str {
    if cfg!(windows) {
        "\r\n"
    } else {
        "\n"
    }
}

#[async_trait]
impl SessionHandle for ShellTerminal {
    fn label(&self) -> &str {
        &self.name
    }

    fn dispose(&mut self) {
        self.input_tx.take();
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Hand the user's stdin to the shell until it exits.
    async fn wait(&mut self) -> Result<Option<i32>> {
        let forwarder = self.input_tx.take().map(|tx| {
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(format!("{line}{}", enter_key())).is_err() {
                        break;
                    }
                }
            })
        });
        let code = await_exit(&mut self.done_rx).await;
        if let Some(handle) = forwarder {
            handle.abort();
        }
        code
    }
}

impl TerminalHandle for ShellTerminal {
    fn show(&mut self) {
        let mut out = std::io::stdout();
        let _ = crossterm::execute!(out, crossterm::terminal::SetTitle(&self.name));
    }

    fn send_text(&mut self, text: &str, add_new_line: bool) -> Result<()> {
        let tx = self
            .input_tx
            .as_ref()
            .context("terminal input is closed")?;
        let mut data = text.to_string();
        if add_new_line {
            data.push_str(enter_key());
        }
        tx.send(data).map_err(|_| anyhow::anyhow!("terminal has exited"))
    }

    fn into_session(self: Box<Self>) -> Box<dyn SessionHandle> {
        self
    }
}

#[async_trait]
impl Host for ConsoleHost {
    fn execute_task(&mut self, task: TaskSpec) -> LaunchResult<Box<dyn SessionHandle>> {
        let command_line = render_command_line(&task.command, &task.args, self.flavor);
        let mut cmd = Command::new(&task.command);
        cmd.args(task.argv()).stdin(Stdio::null());

        match task.presentation.reveal {
            RevealKind::Always => {
                if task.presentation.clear {
                    clear_screen();
                }
                if task.presentation.echo {
                    println!("> Executing task: {command_line} <");
                    println!();
                }
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            RevealKind::Never => {
                let file = self
                    .background_output(&task, &command_line)
                    .map_err(|e| {
                        spawn_error(&task.command, std::io::Error::other(format!("{e:#}")))
                    })?;
                let err_file = file
                    .try_clone()
                    .map_err(|e| spawn_error(&task.command, e))?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
            }
        }

        let child = cmd.spawn().map_err(|e| spawn_error(&task.command, e))?;
        let (kill_tx, done_rx) = monitor(task.label.clone(), child);
        Ok(Box::new(TaskSession {
            label: task.label,
            kill_tx: Some(kill_tx),
            done_rx: Some(done_rx),
        }))
    }

    fn create_terminal(&mut self, name: &str) -> LaunchResult<Box<dyn TerminalHandle>> {
        let mut cmd = shell_command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let mut child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error(&program, std::io::Error::other("no stdin pipe")))?;

        // Writer task: owns the shell's stdin, closes it when all senders are gone.
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = input_rx.recv().await {
                if stdin.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdin.flush().await;
            }
        });

        let (kill_tx, done_rx) = monitor(name.to_string(), child);
        Ok(Box::new(ShellTerminal {
            name: name.to_string(),
            input_tx: Some(input_tx),
            kill_tx: Some(kill_tx),
            done_rx: Some(done_rx),
        }))
    }

    async fn show_error(&mut self, message: &str, actions: &[&str]) -> Option<String> {
        eprintln!("error: {message}");
        if actions.is_empty() {
            return None;
        }
        if !self.interactive {
            eprintln!(
                "hint: run `jvs config set-path <javascool-light.jar>` or edit {}",
                self.settings.path().display()
            );
            return None;
        }

        for (i, action) in actions.iter().enumerate() {
            eprintln!("  [{}] {}", i + 1, action);
        }
        eprint!("Choose an action (Enter to dismiss): ");
        let _ = std::io::stderr().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .ok()?
        .ok()?;
        pick_action(answer.trim(), actions)
    }

    async fn open_settings(&mut self) -> Result<()> {
        self.settings.ensure_exists()?;
        let path = self.settings.path().to_path_buf();
        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .ok()
            .filter(|e| !e.trim().is_empty());

        match editor {
            Some(editor) => {
                let mut parts = editor.split_whitespace();
                let program = parts.next().context("empty editor command")?;
                let status = Command::new(program)
                    .args(parts)
                    .arg(&path)
                    .status()
                    .await
                    .with_context(|| format!("launch editor {program}"))?;
                if !status.success() {
                    log::warn!("editor {program} exited with {status}");
                }
                Ok(())
            }
            None => opener::open(&path).with_context(|| format!("open {}", path.display())),
        }
    }
}

/// Match a typed answer against actions, by 1-based number or by name.
fn pick_action(answer: &str, actions: &[&str]) -> Option<String> {
    if answer.is_empty() {
        return None;
    }
    if let Ok(n) = answer.parse::<usize>() {
        return actions.get(n.checked_sub(1)?).map(|a| a.to_string());
    }
    actions
        .iter()
        .find(|a| a.eq_ignore_ascii_case(answer))
        .map(|a| a.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::compile_task;
    use std::path::Path;

    #[test]
    fn pick_action_by_number_or_name() {
        let actions = ["Open User Settings", "Ignore"];
        assert_eq!(pick_action("1", &actions).as_deref(), Some("Open User Settings"));
        assert_eq!(pick_action("2", &actions).as_deref(), Some("Ignore"));
        assert_eq!(pick_action("ignore", &actions).as_deref(), Some("Ignore"));
        assert_eq!(pick_action("0", &actions), None);
        assert_eq!(pick_action("3", &actions), None);
        assert_eq!(pick_action("", &actions), None);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ConsoleHost::new(
            SettingsStore::at(dir.path().join("settings.json")),
            dir.path().to_path_buf(),
        )
        .non_interactive();
        let mut task = compile_task("/opt/jvs.jar", Path::new("/tmp/a.jvs"), true);
        task.command = "definitely-not-a-real-java-binary".into();

        let err = match host.execute_task(task) {
            Err(e) => e,
            Ok(_) => panic!("spawn should fail"),
        };
        assert!(matches!(err, LaunchError::ProcessSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn background_task_output_goes_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ConsoleHost::new(
            SettingsStore::at(dir.path().join("settings.json")),
            dir.path().join("cache"),
        )
        .non_interactive();
        let mut task = compile_task("/opt/jvs.jar", Path::new("/tmp/a b.jvs"), true);
        task.command = "echo".into();

        let mut handle = host.execute_task(task).unwrap();
        assert_eq!(handle.wait().await.unwrap(), Some(0));

        let log = std::fs::read_to_string(host.background_log_path()).unwrap();
        assert!(log.contains("> echo -jar '/opt/jvs.jar' compile '/tmp/a b.jvs'"));
        assert!(log.contains("-jar /opt/jvs.jar compile /tmp/a b.jvs"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dispose_stops_a_running_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ConsoleHost::new(
            SettingsStore::at(dir.path().join("settings.json")),
            dir.path().to_path_buf(),
        )
        .non_interactive();
        let mut task = compile_task("/opt/jvs.jar", Path::new("/tmp/a.jvs"), true);
        task.command = "sleep".into();
        task.args = vec!["30".into()];

        let mut handle = host.execute_task(task).unwrap();
        handle.dispose();
        let code = tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait())
            .await
            .expect("killed task exits promptly")
            .unwrap();
        assert_eq!(code, None);
    }
}
