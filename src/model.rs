use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Problem matcher and task definition type the host uses to parse compiler output.
pub const PROBLEM_MATCHER: &str = "jvscompile";

/// Name of the task source and of run terminals.
pub const TOOL_NAME: &str = "javascool";

/// What a trigger asks the launcher to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationMode {
    Compile,
    CompileBackground,
    RunExecutable,
}

impl InvocationMode {
    pub fn is_background(self) -> bool {
        matches!(self, InvocationMode::CompileBackground)
    }
}

/// One trigger's worth of work. Built per event and consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Path to `javascool-light.jar`. Unused for `RunExecutable`.
    pub tool_path: Option<String>,
    pub target_file: PathBuf,
    pub mode: InvocationMode,
}

impl InvocationRequest {
    pub fn compile(target_file: impl Into<PathBuf>, tool_path: Option<String>) -> Self {
        Self {
            tool_path,
            target_file: target_file.into(),
            mode: InvocationMode::Compile,
        }
    }

    pub fn compile_on_save(target_file: impl Into<PathBuf>, tool_path: Option<String>) -> Self {
        Self {
            tool_path,
            target_file: target_file.into(),
            mode: InvocationMode::CompileBackground,
        }
    }

    pub fn run(executable: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: None,
            target_file: executable.into(),
            mode: InvocationMode::RunExecutable,
        }
    }
}

/// How an argument is protected when it is rendered as shell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellQuoting {
    /// Escape individual special characters.
    Escape,
    /// Pass the value through literally, no interpretation at all.
    Strong,
    /// Quote, but still allow variable expansion.
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellQuotedString {
    pub value: String,
    pub quoting: ShellQuoting,
}

/// A task argument: either a bare word or a quoted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskArg {
    Plain(String),
    Quoted(ShellQuotedString),
}

impl TaskArg {
    /// The argv entry the process receives.
    pub fn value(&self) -> &str {
        match self {
            TaskArg::Plain(s) => s,
            TaskArg::Quoted(q) => &q.value,
        }
    }
}

impl From<&str> for TaskArg {
    fn from(s: &str) -> Self {
        TaskArg::Plain(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealKind {
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationOptions {
    pub reveal: RevealKind,
    pub echo: bool,
    pub clear: bool,
    pub show_reuse_message: bool,
}

/// Everything the host needs to execute one compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub definition_type: String,
    pub scope: String,
    pub label: String,
    pub source: String,
    pub command: String,
    pub args: Vec<TaskArg>,
    pub presentation: PresentationOptions,
    pub problem_matchers: Vec<String>,
    pub is_background: bool,
}

impl TaskSpec {
    /// Raw argument vector, exactly as the process sees it.
    pub fn argv(&self) -> Vec<&str> {
        self.args.iter().map(TaskArg::value).collect()
    }
}

/// Status messages from the controller, rendered by the CLI.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    Watching { paths: Vec<PathBuf> },
    Saved { path: PathBuf },
    SkippedUnconfigured { path: PathBuf },
    Closed { count: usize },
}

impl InfoEvent {
    /// Render a human-readable message for the console.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Watching { paths } => {
                let list: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                format!("Watching {}", list.join(", "))
            }
            InfoEvent::Saved { path } => format!("Compiling {} in background", path.display()),
            InfoEvent::SkippedUnconfigured { path } => format!(
                "Saved {} (no javascool-light.jar configured, skipping compile)",
                path.display()
            ),
            InfoEvent::Closed { count } => match count {
                0 => "No active sessions".to_string(),
                1 => "Closed 1 session".to_string(),
                n => format!("Closed {n} sessions"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_only_for_save_trigger() {
        assert!(InvocationMode::CompileBackground.is_background());
        assert!(!InvocationMode::Compile.is_background());
        assert!(!InvocationMode::RunExecutable.is_background());
    }

    #[test]
    fn run_request_ignores_tool_path() {
        let req = InvocationRequest::run("/tmp/app.jar");
        assert_eq!(req.tool_path, None);
        assert_eq!(req.mode, InvocationMode::RunExecutable);
    }

    #[test]
    fn closed_message_pluralizes() {
        assert_eq!(InfoEvent::Closed { count: 0 }.to_message(), "No active sessions");
        assert_eq!(InfoEvent::Closed { count: 1 }.to_message(), "Closed 1 session");
        assert_eq!(InfoEvent::Closed { count: 3 }.to_message(), "Closed 3 sessions");
    }

    #[test]
    fn task_spec_serializes_like_a_task_definition() {
        let spec = TaskSpec {
            definition_type: PROBLEM_MATCHER.into(),
            scope: "workspace".into(),
            label: "compile".into(),
            source: TOOL_NAME.into(),
            command: "java".into(),
            args: vec![
                "-jar".into(),
                TaskArg::Quoted(ShellQuotedString {
                    value: "/opt/jvs.jar".into(),
                    quoting: ShellQuoting::Strong,
                }),
            ],
            presentation: PresentationOptions {
                reveal: RevealKind::Never,
                echo: true,
                clear: true,
                show_reuse_message: false,
            },
            problem_matchers: vec![PROBLEM_MATCHER.into()],
            is_background: true,
        };
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["type"], "jvscompile");
        assert_eq!(v["args"][0], "-jar");
        assert_eq!(v["args"][1]["quoting"], "strong");
        assert_eq!(v["presentation"]["reveal"], "never");
        assert_eq!(v["presentation"]["showReuseMessage"], false);
        assert_eq!(v["isBackground"], true);
        assert_eq!(spec.argv(), vec!["-jar", "/opt/jvs.jar"]);
    }
}
