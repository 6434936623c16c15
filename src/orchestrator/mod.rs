//! Watch-mode orchestration.
//!
//! This module owns the long-running `watch` loop: it turns file saves into
//! background compiles and typed commands into launcher operations. The CLI
//! layer wires stdin, the file watcher and Ctrl-C into it.

mod controller;
mod watcher;

pub(crate) use controller::{run_controller, spawn_command_reader, ControlCommand};
pub(crate) use watcher::SaveWatcher;
