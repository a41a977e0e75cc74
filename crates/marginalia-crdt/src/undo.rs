//! Unified undo: the document's causal undo manager and the local command
//! stack behind one surface.
//!
//! The document side tracks `annot:` transactions (surface-origin edits are
//! excluded) and re-merges undos with interleaved remote transactions; that
//! logic lives in loro and is not reimplemented here. The local side is a
//! plain command stack for UI-only state. `undo()` tries the document
//! first, then the local stack; `redo()` targets whichever source served
//! the most recent undo, tracked as explicit state rather than inferred.

use loro::{LoroDoc, UndoManager};
use marginalia_core::{Command, CommandHistory, LogEntry};
use smol_str::SmolStr;

use crate::surfaces::SURFACE_ORIGIN_PREFIX;

/// Which undo source served an undo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndoSource {
    /// The replicated document's own undo manager.
    Document,
    /// The local command stack.
    Local,
}

/// The two-tier undo coordinator.
pub struct UnifiedHistory {
    doc_undo: Option<UndoManager>,
    local: CommandHistory,
    last_undone: Option<UndoSource>,
}

impl Default for UnifiedHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedHistory {
    /// Create a detached coordinator: only the local stack is live until
    /// [`attach`](Self::attach).
    pub fn new() -> Self {
        Self {
            doc_undo: None,
            local: CommandHistory::default(),
            last_undone: None,
        }
    }

    /// Attach the replicated document. Must happen before the mutations it
    /// should track; transactions with the surface origin prefix never land
    /// on this stack, and each annotation transaction is its own undo step.
    pub fn attach(&mut self, doc: &LoroDoc) {
        let mut manager = UndoManager::new(doc);
        manager.set_merge_interval(0);
        manager.add_exclude_origin_prefix(SURFACE_ORIGIN_PREFIX);
        self.doc_undo = Some(manager);
    }

    /// Record an already-applied local command as undoable.
    pub fn record(&mut self, command: Command) {
        self.local.record(command);
    }

    /// Append a log-only entry: it shows up in the visible history but the
    /// document undo manager owns reverting it, so recording it here as
    /// undoable would double-undo.
    pub fn log_only(&mut self, description: impl Into<SmolStr>) {
        self.local.log_only(description);
    }

    pub fn can_undo(&self) -> bool {
        self.doc_undo.as_ref().is_some_and(|m| m.can_undo()) || self.local.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.doc_undo.as_ref().is_some_and(|m| m.can_redo()) || self.local.can_redo()
    }

    /// Undo one step: the document's stack first, then the local stack.
    pub fn undo(&mut self) -> bool {
        if let Some(manager) = &mut self.doc_undo {
            if manager.can_undo() && manager.undo().unwrap_or(false) {
                self.last_undone = Some(UndoSource::Document);
                return true;
            }
        }
        if self.local.undo() {
            self.last_undone = Some(UndoSource::Local);
            return true;
        }
        false
    }

    /// Redo one step from the source that served the most recent undo.
    pub fn redo(&mut self) -> bool {
        match self.last_undone {
            Some(UndoSource::Document) => self
                .doc_undo
                .as_mut()
                .map(|m| m.redo().unwrap_or(false))
                .unwrap_or(false),
            Some(UndoSource::Local) => self.local.redo(),
            None => false,
        }
    }

    /// The source that served the most recent undo, if any.
    pub fn last_undone(&self) -> Option<UndoSource> {
        self.last_undone
    }

    /// The visible action log (both tiers' entries, log-only included).
    pub fn log(&self) -> &[LogEntry] {
        self.local.log()
    }
}
