//! The environment the launcher drives.
//!
//! A host executes tasks, creates terminals and talks to the user. The
//! launcher never spawns anything itself; it only hands finished task specs
//! and terminal requests to a host.

mod console;
#[cfg(test)]
pub(crate) mod fake;

pub use console::ConsoleHost;

use crate::error::LaunchResult;
use crate::launcher::{SessionHandle, TerminalHandle};
use crate::model::TaskSpec;
use async_trait::async_trait;

#[async_trait]
pub trait Host: Send {
    /// Start a task. Returns as soon as the process is spawned.
    fn execute_task(&mut self, task: TaskSpec) -> LaunchResult<Box<dyn SessionHandle>>;

    /// Create a fresh interactive terminal called `name`.
    fn create_terminal(&mut self, name: &str) -> LaunchResult<Box<dyn TerminalHandle>>;

    /// Show an error with optional actions and return the one the user picked.
    async fn show_error(&mut self, message: &str, actions: &[&str]) -> Option<String>;

    /// Bring up the user settings for editing.
    async fn open_settings(&mut self) -> anyhow::Result<()>;
}
