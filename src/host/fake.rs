//! Recording host for launcher and controller tests.

use super::Host;
use crate::error::{LaunchError, LaunchResult};
use crate::launcher::{SessionHandle, TerminalHandle};
use crate::model::TaskSpec;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostEvent {
    TaskStarted(TaskSpec),
    TerminalCreated(String),
    Shown(String),
    TextSent { terminal: String, text: String, new_line: bool },
    Disposed(String),
    ErrorShown { message: String, actions: Vec<String> },
    SettingsOpened,
}

pub(crate) type EventLog = Arc<Mutex<Vec<HostEvent>>>;

#[derive(Default)]
pub(crate) struct FakeHost {
    pub log: EventLog,
    /// Action returned from `show_error`.
    pub choice: Option<String>,
    /// Make the next spawn fail.
    pub fail_spawn: bool,
    spawned: usize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choosing(action: &str) -> Self {
        Self {
            choice: Some(action.to_string()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<TaskSpec> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::TaskStarted(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HostEvent::ErrorShown { .. }))
            .count()
    }

    fn next_label(&mut self, base: &str) -> String {
        self.spawned += 1;
        format!("{base}-{}", self.spawned)
    }

    fn record(&self, event: HostEvent) {
        self.log.lock().unwrap().push(event);
    }
}

struct FakeSession {
    label: String,
    log: EventLog,
    disposed: bool,
}

#[async_trait]
impl SessionHandle for FakeSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.log
                .lock()
                .unwrap()
                .push(HostEvent::Disposed(self.label.clone()));
        }
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        Ok(if self.disposed { None } else { Some(0) })
    }
}

impl TerminalHandle for FakeSession {
    fn show(&mut self) {
        self.log
            .lock()
            .unwrap()
            .push(HostEvent::Shown(self.label.clone()));
    }

    fn send_text(&mut self, text: &str, add_new_line: bool) -> Result<()> {
        self.log.lock().unwrap().push(HostEvent::TextSent {
            terminal: self.label.clone(),
            text: text.to_string(),
            new_line: add_new_line,
        });
        Ok(())
    }

    fn into_session(self: Box<Self>) -> Box<dyn SessionHandle> {
        self
    }
}

#[async_trait]
impl Host for FakeHost {
    fn execute_task(&mut self, task: TaskSpec) -> LaunchResult<Box<dyn SessionHandle>> {
        if self.fail_spawn {
            return Err(LaunchError::ProcessSpawn {
                program: task.command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not on PATH"),
            });
        }
        let label = self.next_label(&task.label);
        self.record(HostEvent::TaskStarted(task));
        Ok(Box::new(FakeSession {
            label,
            log: self.log.clone(),
            disposed: false,
        }))
    }

    fn create_terminal(&mut self, name: &str) -> LaunchResult<Box<dyn TerminalHandle>> {
        let label = self.next_label(name);
        self.record(HostEvent::TerminalCreated(label.clone()));
        Ok(Box::new(FakeSession {
            label,
            log: self.log.clone(),
            disposed: false,
        }))
    }

    async fn show_error(&mut self, message: &str, actions: &[&str]) -> Option<String> {
        self.record(HostEvent::ErrorShown {
            message: message.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        });
        self.choice.clone()
    }

    async fn open_settings(&mut self) -> Result<()> {
        self.record(HostEvent::SettingsOpened);
        Ok(())
    }
}
