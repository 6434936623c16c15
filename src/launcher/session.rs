use anyhow::Result;
use async_trait::async_trait;

/// Identifier handed out by [`SessionRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live output surface: a running task or an interactive terminal.
#[async_trait]
pub trait SessionHandle: Send {
    /// Human-readable name, e.g. `compile` or `javascool`.
    fn label(&self) -> &str;

    /// Best-effort termination. Requests the process to stop and returns
    /// without waiting; descendants of the process may survive.
    fn dispose(&mut self);

    /// Wait for the underlying process to exit and return its exit code
    /// (`None` when killed by a signal or already disposed).
    async fn wait(&mut self) -> Result<Option<i32>>;
}

/// An interactive terminal that accepts typed text.
pub trait TerminalHandle: SessionHandle {
    /// Bring the terminal to the foreground.
    fn show(&mut self);

    /// Type `text` into the terminal, optionally followed by Enter.
    fn send_text(&mut self, text: &str, add_new_line: bool) -> Result<()>;

    fn into_session(self: Box<Self>) -> Box<dyn SessionHandle>;
}

/// Tracks every live session so all of them can be closed before the next
/// invocation. Owned by the launcher; there is no global list.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Vec<(SessionId, Box<dyn SessionHandle>)>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: Box<dyn SessionHandle>) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        log::debug!("registered session {id} ({})", handle.label());
        self.sessions.push((id, handle));
        id
    }

    /// Dispose every tracked session and return how many there were.
    pub fn close_all(&mut self) -> usize {
        let count = self.sessions.len();
        for (id, mut handle) in self.sessions.drain(..) {
            log::debug!("disposing session {id} ({})", handle.label());
            handle.dispose();
        }
        count
    }

    /// Stop tracking a session and hand it to the caller, e.g. to wait on it.
    pub fn take(&mut self, id: SessionId) -> Option<Box<dyn SessionHandle>> {
        let idx = self.sessions.iter().position(|(sid, _)| *sid == id)?;
        Some(self.sessions.remove(idx).1)
    }

    pub fn labels(&self) -> Vec<(SessionId, String)> {
        self.sessions
            .iter()
            .map(|(id, h)| (*id, h.label().to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
