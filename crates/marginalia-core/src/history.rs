//! Local command history: the non-replicated half of undo.
//!
//! Replicated mutations are undone by the document's own undo manager; this
//! stack covers UI-only state changes (lock toggle, theme, active tool) as
//! explicit command objects, plus log-only entries that show up in the
//! visible history without contributing an undo step.

use smol_str::SmolStr;

/// An undoable local action.
///
/// The state change has already been applied when the command is recorded;
/// `undo` and `redo` re-apply it in either direction. Closures capture
/// shared handles (`Rc<Cell<_>>` and friends) to the state they flip.
pub struct Command {
    description: SmolStr,
    undo: Box<dyn FnMut()>,
    redo: Box<dyn FnMut()>,
}

impl Command {
    pub fn new(
        description: impl Into<SmolStr>,
        undo: impl FnMut() + 'static,
        redo: impl FnMut() + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            undo: Box::new(undo),
            redo: Box::new(redo),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// How an entry participates in history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    /// Recorded on the undo stack.
    Undoable,
    /// Visible in the log only; some other mechanism owns undoing it.
    LogOnly,
}

/// One line of the visible action log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub description: SmolStr,
    pub kind: LogKind,
}

/// Two-stack command history with a bounded undo depth and an append-only
/// action log.
///
/// Recording a new command clears the redo stack; the oldest commands are
/// evicted once the stack exceeds `max_steps`.
pub struct CommandHistory {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    log: Vec<LogEntry>,
    max_steps: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CommandHistory {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            log: Vec::new(),
            max_steps,
        }
    }

    /// Record an already-applied command as undoable.
    pub fn record(&mut self, command: Command) {
        tracing::debug!("record local command: {}", command.description());
        self.log.push(LogEntry {
            description: command.description.clone(),
            kind: LogKind::Undoable,
        });
        self.redo_stack.clear();
        self.undo_stack.push(command);
        while self.undo_stack.len() > self.max_steps {
            self.undo_stack.remove(0);
        }
    }

    /// Append a log-only entry: visible in the history list, not undoable
    /// here.
    pub fn log_only(&mut self, description: impl Into<SmolStr>) {
        self.log.push(LogEntry {
            description: description.into(),
            kind: LogKind::LogOnly,
        });
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo the most recent command. Returns false when the stack is empty.
    pub fn undo(&mut self) -> bool {
        let Some(mut command) = self.undo_stack.pop() else {
            return false;
        };
        (command.undo)();
        self.redo_stack.push(command);
        true
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self) -> bool {
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        (command.redo)();
        self.undo_stack.push(command);
        true
    }

    /// The visible action log, oldest first, log-only entries included.
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Drop all undo/redo state. The log is kept: it is an audit trail.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
