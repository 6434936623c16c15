//! Process launcher.
//!
//! Turns compile and run triggers into tasks and terminals on a [`Host`].
//! Every operation first closes all sessions left over from the previous
//! one, so at most one output surface is live at a time.

mod quoting;
mod session;

pub use quoting::{render_command_line, run_command_text, strong, ShellFlavor};
pub use session::{SessionHandle, SessionId, SessionRegistry, TerminalHandle};

use crate::error::{LaunchError, LaunchResult, MISSING_TOOL_MESSAGE, OPEN_SETTINGS_ACTION};
use crate::host::Host;
use crate::model::{
    InvocationMode, InvocationRequest, PresentationOptions, RevealKind, TaskArg, TaskSpec,
    PROBLEM_MATCHER, TOOL_NAME,
};
use std::path::Path;

/// Progress of a single launcher operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ClosingPriorSessions,
    Dispatched,
    Completed,
    Failed,
}

/// Argument vector for a compile: `-jar <tool> compile <file>`.
pub fn compile_args(tool_path: &str, target_file: &Path) -> Vec<TaskArg> {
    vec![
        TaskArg::from("-jar"),
        strong(tool_path),
        TaskArg::from("compile"),
        strong(target_file.to_string_lossy()),
    ]
}

/// Build the task for compiling `target_file`.
pub fn compile_task(tool_path: &str, target_file: &Path, background: bool) -> TaskSpec {
    TaskSpec {
        definition_type: PROBLEM_MATCHER.to_string(),
        scope: "workspace".to_string(),
        label: "compile".to_string(),
        source: TOOL_NAME.to_string(),
        command: "java".to_string(),
        args: compile_args(tool_path, target_file),
        presentation: PresentationOptions {
            reveal: if background {
                RevealKind::Never
            } else {
                RevealKind::Always
            },
            echo: true,
            clear: true,
            show_reuse_message: false,
        },
        problem_matchers: vec![PROBLEM_MATCHER.to_string()],
        is_background: background,
    }
}

/// A configured tool path, or `None` when missing or blank. The value itself
/// is passed on untouched.
fn configured(tool_path: Option<&str>) -> Option<&str> {
    tool_path.filter(|p| !p.trim().is_empty())
}

pub struct Launcher<H: Host> {
    host: H,
    sessions: SessionRegistry,
    last: Option<(&'static str, Stage)>,
}

impl<H: Host> Launcher<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            sessions: SessionRegistry::new(),
            last: None,
        }
    }

    fn enter(&mut self, op: &'static str, stage: Stage) {
        log::debug!("{op}: {stage:?}");
        self.last = Some((op, stage));
    }

    /// The most recent operation and the stage it reached.
    pub fn last_stage(&self) -> Option<(&'static str, Stage)> {
        self.last
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Dispose every tracked session. Returns how many were closed.
    pub fn close_all_active(&mut self) -> usize {
        self.sessions.close_all()
    }

    /// Stop tracking a session so the caller can wait on it.
    pub fn take_session(&mut self, id: SessionId) -> Option<Box<dyn SessionHandle>> {
        self.sessions.take(id)
    }

    /// Explicit compile. With no tool path the user is told once, offered
    /// the settings, and nothing is spawned.
    pub async fn compile(
        &mut self,
        target_file: &Path,
        tool_path: Option<&str>,
    ) -> LaunchResult<SessionId> {
        self.enter("compile", Stage::ClosingPriorSessions);
        self.close_all_active();

        let Some(tool_path) = configured(tool_path) else {
            self.enter("compile", Stage::Failed);
            let choice = self
                .host
                .show_error(MISSING_TOOL_MESSAGE, &[OPEN_SETTINGS_ACTION])
                .await;
            if choice.as_deref() == Some(OPEN_SETTINGS_ACTION) {
                if let Err(e) = self.host.open_settings().await {
                    log::warn!("could not open settings: {e:#}");
                }
            }
            return Err(LaunchError::MissingConfiguration);
        };

        self.dispatch_task("compile", compile_task(tool_path, target_file, false))
    }

    /// Save-triggered compile. Does nothing when no tool path is configured.
    pub fn compile_on_save(
        &mut self,
        target_file: &Path,
        tool_path: Option<&str>,
    ) -> LaunchResult<Option<SessionId>> {
        self.enter("compile_on_save", Stage::ClosingPriorSessions);
        self.close_all_active();

        match configured(tool_path) {
            Some(tool_path) => self
                .dispatch_task("compile_on_save", compile_task(tool_path, target_file, true))
                .map(Some),
            None => {
                log::debug!(
                    "no tool path configured, not compiling {}",
                    target_file.display()
                );
                self.enter("compile_on_save", Stage::Completed);
                Ok(None)
            }
        }
    }

    /// Open a fresh terminal and type `java -jar "<executable>"` into it.
    pub fn run(&mut self, executable: &Path) -> LaunchResult<SessionId> {
        self.enter("run", Stage::ClosingPriorSessions);
        self.close_all_active();

        let mut terminal = match self.host.create_terminal(TOOL_NAME) {
            Ok(terminal) => terminal,
            Err(e) => {
                self.enter("run", Stage::Failed);
                return Err(e);
            }
        };
        terminal.show();
        let text = run_command_text(&executable.to_string_lossy());
        if let Err(e) = terminal.send_text(&text, true) {
            // The terminal is still tracked so the next operation can close it.
            log::warn!("could not send command to terminal: {e:#}");
        }
        let id = self.sessions.register(terminal.into_session());
        self.enter("run", Stage::Dispatched);
        self.enter("run", Stage::Completed);
        Ok(id)
    }

    /// Route a request to the matching operation.
    pub async fn dispatch(&mut self, request: InvocationRequest) -> LaunchResult<Option<SessionId>> {
        let tool_path = request.tool_path.as_deref();
        match request.mode {
            InvocationMode::RunExecutable => self.run(&request.target_file).map(Some),
            mode if mode.is_background() => self.compile_on_save(&request.target_file, tool_path),
            _ => self.compile(&request.target_file, tool_path).await.map(Some),
        }
    }

    fn dispatch_task(&mut self, op: &'static str, task: TaskSpec) -> LaunchResult<SessionId> {
        log::info!(
            "{op}: {}",
            render_command_line(&task.command, &task.args, ShellFlavor::native())
        );
        let handle = match self.host.execute_task(task) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("{op}: {e}");
                self.enter(op, Stage::Failed);
                return Err(e);
            }
        };
        let id = self.sessions.register(handle);
        self.enter(op, Stage::Dispatched);
        // Fire-and-forget: handing the task to the host ends the operation.
        self.enter(op, Stage::Completed);
        Ok(id)
    }
}
