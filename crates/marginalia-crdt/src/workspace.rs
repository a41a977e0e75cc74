//! The consumer-facing annotation workspace.
//!
//! Composes the replicated store, the unified undo history, and the local
//! (non-replicated) preferences behind one surface: `layers()`,
//! `active_layer_id()`, the full mutation set, and
//! `{undo, redo, can_undo, can_redo, log}`.
//!
//! Replicated mutations go into the visible log as log-only entries; the
//! document's undo manager owns reverting them. Preference toggles are
//! recorded as real commands on the local stack.

use std::cell::Cell;
use std::rc::Rc;

use loro::LoroDoc;
use marginalia_core::{AnchorProvider, Command, Layer, LogEntry, Span};
use smol_str::{SmolStr, format_smolstr};

use crate::store::{
    AddLayerOptions, AnnotationStore, ArrowDraft, HighlightDraft, NewLayer, Toggled,
};
use crate::undo::UnifiedHistory;

/// The active annotation tool, a local UI concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Highlight,
    Underline,
    Arrow,
    Comment,
}

/// One collaborative annotation workspace seen from this replica.
pub struct Workspace<P: AnchorProvider> {
    store: AnnotationStore<P>,
    history: UnifiedHistory,
    locked: Rc<Cell<bool>>,
    dark_mode: Rc<Cell<bool>>,
    active_tool: Rc<Cell<Tool>>,
}

impl<P: AnchorProvider> Default for Workspace<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: AnchorProvider> Workspace<P> {
    /// Create a detached workspace. Mutations no-op until [`attach`]
    /// supplies the replicated document.
    ///
    /// [`attach`]: Self::attach
    pub fn new() -> Self {
        Self {
            store: AnnotationStore::new(),
            history: UnifiedHistory::new(),
            locked: Rc::new(Cell::new(false)),
            dark_mode: Rc::new(Cell::new(false)),
            active_tool: Rc::new(Cell::new(Tool::default())),
        }
    }

    /// Attach the replicated document and anchor provider. The undo manager
    /// attaches first so it sees every annotation transaction.
    pub fn attach(&mut self, doc: LoroDoc, provider: P) {
        self.history.attach(&doc);
        self.store.attach(doc, provider);
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_attached()
    }

    /// The store, for transport wiring (import/export/subscribe) and
    /// surface management.
    pub fn store(&self) -> &AnnotationStore<P> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore<P> {
        &mut self.store
    }

    // ── projection ───────────────────────────────────────────────────────

    /// Immutable snapshot of all layers.
    pub fn layers(&self) -> Vec<Layer> {
        self.store.layers()
    }

    pub fn active_layer_id(&self) -> Option<&str> {
        self.store.active_layer_id()
    }

    // ── replicated mutations (log-only in the history) ───────────────────

    pub fn add_layer(&mut self, opts: AddLayerOptions) -> Option<NewLayer> {
        let new = self.store.add_layer(opts)?;
        self.history
            .log_only(format_smolstr!("Add layer \"{}\"", new.name));
        Some(new)
    }

    pub fn remove_layer(&mut self, layer_id: &str) {
        if self.store.remove_layer(layer_id) {
            self.history.log_only("Remove layer");
        }
    }

    pub fn set_active_layer(&mut self, layer_id: &str) -> bool {
        self.store.set_active_layer(layer_id)
    }

    pub fn update_layer_name(&mut self, layer_id: &str, name: &str) {
        if self.store.update_layer_name(layer_id, name) {
            self.history
                .log_only(format_smolstr!("Rename layer to \"{name}\""));
        }
    }

    pub fn update_layer_color(&mut self, layer_id: &str, color: &str) {
        if self.store.update_layer_color(layer_id, color) {
            self.history.log_only("Recolor layer");
        }
    }

    pub fn toggle_layer_visibility(&mut self, layer_id: &str) {
        if self.store.toggle_layer_visibility(layer_id) {
            self.history.log_only("Toggle layer visibility");
        }
    }

    pub fn toggle_all_layer_visibility(&mut self) {
        if self.store.toggle_all_layer_visibility() {
            self.history.log_only("Toggle all layers");
        }
    }

    pub fn add_highlight(&mut self, layer_id: &str, draft: HighlightDraft) -> SmolStr {
        let kind = draft.kind;
        let id = self.store.add_highlight(layer_id, draft);
        if !id.is_empty() {
            self.history
                .log_only(format_smolstr!("Add {}", kind.as_str()));
        }
        id
    }

    pub fn toggle_highlight(&mut self, layer_id: &str, draft: HighlightDraft) -> Toggled {
        let kind = draft.kind;
        let toggled = self.store.toggle_highlight(layer_id, draft);
        match &toggled {
            Toggled::Added(_) => self
                .history
                .log_only(format_smolstr!("Add {}", kind.as_str())),
            Toggled::Removed(_) => self
                .history
                .log_only(format_smolstr!("Remove {}", kind.as_str())),
            Toggled::NoOp => {}
        }
        toggled
    }

    pub fn update_highlight_note(&mut self, layer_id: &str, highlight_id: &str, note: &str) {
        if self.store.update_highlight_note(layer_id, highlight_id, note) {
            self.history.log_only("Edit annotation");
        }
    }

    pub fn remove_highlight(&mut self, layer_id: &str, highlight_id: &str) {
        if self.store.remove_highlight(layer_id, highlight_id) {
            self.history.log_only("Remove highlight");
        }
    }

    pub fn toggle_highlight_visibility(&mut self, layer_id: &str, highlight_id: &str) {
        if self.store.toggle_highlight_visibility(layer_id, highlight_id) {
            self.history.log_only("Toggle highlight visibility");
        }
    }

    pub fn toggle_underline(&mut self, layer_id: &str, surface: u32, span: Span) -> Toggled {
        let toggled = self.store.toggle_underline(layer_id, surface, span);
        match &toggled {
            Toggled::Added(_) => self.history.log_only("Add underline"),
            Toggled::Removed(_) => self.history.log_only("Remove underline"),
            Toggled::NoOp => {}
        }
        toggled
    }

    pub fn remove_underline(&mut self, layer_id: &str, underline_id: &str) {
        if self.store.remove_underline(layer_id, underline_id) {
            self.history.log_only("Remove underline");
        }
    }

    pub fn toggle_underline_visibility(&mut self, layer_id: &str, underline_id: &str) {
        if self.store.toggle_underline_visibility(layer_id, underline_id) {
            self.history.log_only("Toggle underline visibility");
        }
    }

    pub fn add_arrow(&mut self, layer_id: &str, draft: ArrowDraft) -> Toggled {
        let toggled = self.store.add_arrow(layer_id, draft);
        match &toggled {
            Toggled::Added(_) => self.history.log_only("Add arrow"),
            Toggled::Removed(_) => self.history.log_only("Remove arrow"),
            Toggled::NoOp => {}
        }
        toggled
    }

    pub fn remove_arrow(&mut self, layer_id: &str, arrow_id: &str) {
        if self.store.remove_arrow(layer_id, arrow_id) {
            self.history.log_only("Remove arrow");
        }
    }

    pub fn toggle_arrow_visibility(&mut self, layer_id: &str, arrow_id: &str) {
        if self.store.toggle_arrow_visibility(layer_id, arrow_id) {
            self.history.log_only("Toggle arrow visibility");
        }
    }

    pub fn clear_layer_highlights(&mut self, layer_id: &str) {
        if self.store.clear_layer_highlights(layer_id) {
            self.history.log_only("Clear highlights");
        }
    }

    pub fn clear_layer_arrows(&mut self, layer_id: &str) {
        if self.store.clear_layer_arrows(layer_id) {
            self.history.log_only("Clear arrows");
        }
    }

    pub fn clear_layer_underlines(&mut self, layer_id: &str) {
        if self.store.clear_layer_underlines(layer_id) {
            self.history.log_only("Clear underlines");
        }
    }

    pub fn add_reply(&mut self, layer_id: &str, highlight_id: &str, user: &str, text: &str) -> SmolStr {
        let id = self.store.add_reply(layer_id, highlight_id, user, text);
        if !id.is_empty() {
            self.history.log_only("Add reply");
        }
        id
    }

    pub fn update_reply(&mut self, layer_id: &str, highlight_id: &str, reply_id: &str, text: &str) {
        if self.store.update_reply(layer_id, highlight_id, reply_id, text) {
            self.history.log_only("Edit reply");
        }
    }

    pub fn remove_reply(&mut self, layer_id: &str, highlight_id: &str, reply_id: &str) {
        if self.store.remove_reply(layer_id, highlight_id, reply_id) {
            self.history.log_only("Remove reply");
        }
    }

    pub fn toggle_reaction_on_highlight(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        emoji: &str,
        user: &str,
    ) {
        if self
            .store
            .toggle_reaction_on_highlight(layer_id, highlight_id, emoji, user)
        {
            self.history
                .log_only(format_smolstr!("Toggle {emoji} reaction"));
        }
    }

    pub fn toggle_reaction_on_reply(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        reply_id: &str,
        emoji: &str,
        user: &str,
    ) {
        if self
            .store
            .toggle_reaction_on_reply(layer_id, highlight_id, reply_id, emoji, user)
        {
            self.history
                .log_only(format_smolstr!("Toggle {emoji} reaction"));
        }
    }

    /// Read-only mode: every replicated mutation becomes a sentinel no-op.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.store.set_read_only(read_only);
    }

    // ── local preferences (recorded on the local undo stack) ─────────────

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Toggle the editing lock. Local-only state; undoable on the local
    /// stack.
    pub fn toggle_locked(&mut self) {
        Self::record_flag_toggle(&mut self.history, &self.locked, "Toggle lock");
    }

    pub fn is_dark_mode(&self) -> bool {
        self.dark_mode.get()
    }

    pub fn toggle_dark_mode(&mut self) {
        Self::record_flag_toggle(&mut self.history, &self.dark_mode, "Toggle dark mode");
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool.get()
    }

    /// Switch the active tool, recording the switch on the local stack.
    pub fn set_active_tool(&mut self, tool: Tool) {
        let previous = self.active_tool.get();
        if previous == tool {
            return;
        }
        self.active_tool.set(tool);
        let undo_cell = self.active_tool.clone();
        let redo_cell = self.active_tool.clone();
        self.history.record(Command::new(
            format_smolstr!("Switch tool to {tool:?}"),
            move || undo_cell.set(previous),
            move || redo_cell.set(tool),
        ));
    }

    fn record_flag_toggle(history: &mut UnifiedHistory, flag: &Rc<Cell<bool>>, description: &str) {
        let previous = flag.get();
        flag.set(!previous);
        let undo_cell = flag.clone();
        let redo_cell = flag.clone();
        history.record(Command::new(
            description,
            move || undo_cell.set(previous),
            move || redo_cell.set(!previous),
        ));
    }

    // ── unified undo surface ─────────────────────────────────────────────

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// The visible action log, oldest first.
    pub fn log(&self) -> &[LogEntry] {
        self.history.log()
    }
}
