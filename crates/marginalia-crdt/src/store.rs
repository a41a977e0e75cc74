//! The replicated annotation store: schema mutations over a loro document.
//!
//! Every public mutation is one replicated transaction committed with an
//! `annot:`-prefixed origin, so the undo coordinator can tell user edits
//! apart from surface edits and replays. Mutations apply locally and
//! immediately; propagation to other replicas is the transport's business.
//!
//! Failure contract: a missing document, read-only mode, or an unknown id
//! all degrade to silent no-ops with sentinel returns (`None`, empty id,
//! `false`). The one surfaced failure is palette exhaustion on
//! [`AnnotationStore::add_layer`]. Nothing here returns an error or panics
//! for a routine concurrent-editing race.

use loro::{CommitOptions, ExportMode, LoroDoc, LoroList, LoroMap, Subscription, VersionVector};
use marginalia_core::{
    AnchorProvider, AnchorState, AnchorToken, ArrowStyle, Layer, MarkKind, Span,
    default_layer_name, first_free_color, parse_default_layer_name,
};
use smol_str::SmolStr;

use crate::error::AnnotError;
use crate::project::{ChangeKind, project, subscribe_changes};
use crate::schema::{
    LAYERS, child_list, child_map, find_record, map_bool, map_i64, map_str, record_at,
};

/// Origin prefix shared by all annotation transactions.
pub const ANNOT_ORIGIN_PREFIX: &str = "annot:";

/// Options for [`AnnotationStore::add_layer`].
#[derive(Clone, Debug, Default)]
pub struct AddLayerOptions {
    /// Explicit display name. Explicit names do not consume the default-name
    /// counter.
    pub name: Option<SmolStr>,
    /// Explicit color, taken verbatim even if another layer uses it.
    pub color: Option<SmolStr>,
    /// Extra colors appended to the fixed palette for allocation.
    pub extra_colors: Vec<SmolStr>,
}

/// What [`AnnotationStore::add_layer`] created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLayer {
    pub id: SmolStr,
    pub name: SmolStr,
    pub color: SmolStr,
}

/// Payload for creating a highlight or comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightDraft {
    pub surface: u32,
    pub span: Span,
    pub note: SmolStr,
    pub kind: MarkKind,
}

impl HighlightDraft {
    /// A plain highlight over a range.
    pub fn highlight(surface: u32, span: Span) -> Self {
        Self {
            surface,
            span,
            note: SmolStr::default(),
            kind: MarkKind::Highlight,
        }
    }

    /// A comment over a range. An empty note makes it provisional.
    pub fn comment(surface: u32, span: Span, note: impl Into<SmolStr>) -> Self {
        Self {
            surface,
            span,
            note: note.into(),
            kind: MarkKind::Comment,
        }
    }
}

/// One end of an arrow being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointDraft {
    pub surface: u32,
    pub span: Span,
}

/// Payload for creating an arrow between two ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrowDraft {
    pub from: EndpointDraft,
    pub to: EndpointDraft,
    pub style: ArrowStyle,
}

/// Outcome of a toggle-by-range mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Toggled {
    /// No matching sibling existed; a new annotation was created.
    Added(SmolStr),
    /// A matching sibling existed and was removed instead.
    Removed(SmolStr),
    /// The mutation could not apply (no document, unknown layer, anchor
    /// unavailable, read-only).
    NoOp,
}

impl Toggled {
    pub fn added_id(&self) -> Option<&str> {
        match self {
            Self::Added(id) => Some(id),
            _ => None,
        }
    }
}

/// Version bookkeeping for the transport collaborator.
#[derive(Clone, Debug, Default)]
pub struct SyncState {
    /// Version vector at the time of last sync.
    pub last_synced_version: Option<VersionVector>,
}

/// The replicated annotation store.
///
/// Holds the (possibly not-yet-available) document handle, the anchor
/// provider, and the process-local session state: active layer, default-name
/// counter, and the read-only flag. The counter and palette usage are
/// recovered from document contents on [`attach`](Self::attach), never from
/// separately-persisted state.
pub struct AnnotationStore<P: AnchorProvider> {
    doc: Option<LoroDoc>,
    provider: Option<P>,
    active_layer: Option<SmolStr>,
    name_counter: u64,
    read_only: bool,
    sync: SyncState,
}

impl<P: AnchorProvider> Default for AnnotationStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id() -> SmolStr {
    SmolStr::new(uuid::Uuid::new_v4().to_string())
}

fn now_ms() -> i64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn commit(doc: &LoroDoc, op: &str) {
    doc.commit_with(CommitOptions::new().origin(&format!("{ANNOT_ORIGIN_PREFIX}{op}")));
}

fn reaction_key(emoji: &str, user: &str) -> String {
    format!("{emoji}:{user}")
}

/// Shared toggle-by-range lookup: find an annotation whose anchor resolves
/// to the same range, or whose captured text equals the draft's (the
/// fallback when remote edits have shifted offsets out from under exact
/// matching).
fn find_mark_at(
    list: &LoroList,
    provider: &impl AnchorProvider,
    surface: u32,
    span: Span,
    fallback: &str,
    matches_kind: impl Fn(&LoroMap) -> bool,
) -> Option<(usize, SmolStr)> {
    for index in 0..list.len() {
        let Some(record) = record_at(list, index) else {
            continue;
        };
        if !matches_kind(&record) {
            continue;
        }
        if map_i64(&record, "surface") != Some(surface as i64) {
            continue;
        }
        let exact = map_str(&record, "anchor").is_some_and(|token| {
            provider.resolve(surface, &AnchorToken::new(token)) == AnchorState::Resolved(span)
        });
        let by_text = !fallback.is_empty() && map_str(&record, "text").as_deref() == Some(fallback);
        if exact || by_text {
            return map_str(&record, "id").map(|id| (index, id));
        }
    }
    None
}

/// Comments whose note is still empty are provisional and silently cleaned
/// up when another comment lands in the same layer.
fn remove_provisional_comments(list: &LoroList) {
    for index in (0..list.len()).rev() {
        let Some(record) = record_at(list, index) else {
            continue;
        };
        let is_comment = map_str(&record, "kind").as_deref() == Some(MarkKind::Comment.as_str());
        let note_empty = map_str(&record, "note").map(|n| n.is_empty()).unwrap_or(true);
        if is_comment && note_empty {
            list.delete(index, 1).ok();
        }
    }
}

impl<P: AnchorProvider> AnnotationStore<P> {
    /// Create a detached store. Every mutation no-ops until
    /// [`attach`](Self::attach) supplies the document.
    pub fn new() -> Self {
        Self {
            doc: None,
            provider: None,
            active_layer: None,
            name_counter: 0,
            read_only: false,
            sync: SyncState::default(),
        }
    }

    /// Attach the replicated document and anchor provider.
    ///
    /// Recovers the default-name counter floor by scanning existing layer
    /// names, so a second process resuming the same document never reissues
    /// a default name.
    pub fn attach(&mut self, doc: LoroDoc, provider: P) {
        let layers = doc.get_list(LAYERS);
        let mut floor = 0u64;
        for index in 0..layers.len() {
            if let Some(record) = record_at(&layers, index) {
                if let Some(n) = map_str(&record, "name")
                    .as_deref()
                    .and_then(parse_default_layer_name)
                {
                    floor = floor.max(n);
                }
            }
        }
        self.name_counter = self.name_counter.max(floor);
        if self.active_layer.is_none() {
            self.active_layer = record_at(&layers, 0).and_then(|r| map_str(&r, "id"));
        }
        tracing::debug!(
            "annotation store attached: {} layers, name counter {}",
            layers.len(),
            self.name_counter
        );
        self.doc = Some(doc);
        self.provider = Some(provider);
    }

    /// Whether the document handle has arrived.
    pub fn is_attached(&self) -> bool {
        self.doc.is_some()
    }

    /// The attached document, if any.
    pub fn doc(&self) -> Option<&LoroDoc> {
        self.doc.as_ref()
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    pub fn provider_mut(&mut self) -> Option<&mut P> {
        self.provider.as_mut()
    }

    /// Put the store in (or out of) read-only mode. In read-only mode every
    /// mutation keeps its signature and sentinel returns but writes nothing.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Id of the active layer, if any.
    pub fn active_layer_id(&self) -> Option<&str> {
        self.active_layer.as_deref()
    }

    /// Select a layer. No-op (returns false) for unknown ids. Selection is
    /// local state, not a replicated mutation.
    pub fn set_active_layer(&mut self, layer_id: &str) -> bool {
        let Some(doc) = &self.doc else {
            return false;
        };
        if find_record(&doc.get_list(LAYERS), layer_id).is_none() {
            return false;
        }
        self.active_layer = Some(SmolStr::new(layer_id));
        true
    }

    /// Project the current document state. Empty when detached.
    pub fn layers(&self) -> Vec<Layer> {
        match (&self.doc, &self.provider) {
            (Some(doc), Some(provider)) => project(doc, provider),
            _ => Vec::new(),
        }
    }

    fn write_doc(&self) -> Option<&LoroDoc> {
        if self.read_only {
            return None;
        }
        self.doc.as_ref()
    }

    fn layer_record(doc: &LoroDoc, layer_id: &str) -> Option<LoroMap> {
        find_record(&doc.get_list(LAYERS), layer_id).map(|(_, record)| record)
    }

    // ── layers ───────────────────────────────────────────────────────────

    /// Add a layer and make it active.
    ///
    /// Returns `None` without mutating anything when no color is available
    /// (the caller surfaces the capacity warning) or when the store cannot
    /// write.
    pub fn add_layer(&mut self, opts: AddLayerOptions) -> Option<NewLayer> {
        let doc = self.write_doc()?.clone();
        let layers = doc.get_list(LAYERS);

        let color = match opts.color {
            Some(color) => color,
            None => {
                let used: Vec<SmolStr> = (0..layers.len())
                    .filter_map(|i| record_at(&layers, i))
                    .filter_map(|r| map_str(&r, "color"))
                    .collect();
                match first_free_color(&opts.extra_colors, &used) {
                    Some(color) => color,
                    None => {
                        tracing::warn!("layer palette exhausted ({} layers)", layers.len());
                        return None;
                    }
                }
            }
        };
        let name = match opts.name {
            Some(name) => name,
            None => {
                self.name_counter += 1;
                default_layer_name(self.name_counter)
            }
        };

        let id = new_id();
        let record = layers.insert_container(layers.len(), LoroMap::new()).ok()?;
        record.insert("id", id.as_str()).ok()?;
        record.insert("name", name.as_str()).ok()?;
        record.insert("color", color.as_str()).ok()?;
        record.insert("visible", true).ok()?;
        record.insert_container("highlights", LoroList::new()).ok()?;
        record.insert_container("arrows", LoroList::new()).ok()?;
        record.insert_container("underlines", LoroList::new()).ok()?;
        commit(&doc, "add-layer");

        self.active_layer = Some(id.clone());
        tracing::debug!("added layer {name} ({id})");
        Some(NewLayer { id, name, color })
    }

    /// Remove a layer. Its color becomes free for the next allocation. If it
    /// was active, the first remaining layer (if any) becomes active.
    pub fn remove_layer(&mut self, layer_id: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let layers = doc.get_list(LAYERS);
        let Some((index, _)) = find_record(&layers, layer_id) else {
            return false;
        };
        layers.delete(index, 1).ok();
        commit(&doc, "remove-layer");
        if self.active_layer.as_deref() == Some(layer_id) {
            self.active_layer = record_at(&layers, 0).and_then(|r| map_str(&r, "id"));
        }
        true
    }

    pub fn update_layer_name(&mut self, layer_id: &str, name: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::layer_record(&doc, layer_id) else {
            return false;
        };
        record.insert("name", name).ok();
        commit(&doc, "update-layer-name");
        true
    }

    pub fn update_layer_color(&mut self, layer_id: &str, color: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::layer_record(&doc, layer_id) else {
            return false;
        };
        record.insert("color", color).ok();
        commit(&doc, "update-layer-color");
        true
    }

    pub fn toggle_layer_visibility(&mut self, layer_id: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::layer_record(&doc, layer_id) else {
            return false;
        };
        let visible = map_bool(&record, "visible").unwrap_or(true);
        record.insert("visible", !visible).ok();
        commit(&doc, "toggle-layer-visibility");
        true
    }

    /// Hide every layer iff any is visible, else show every layer. One
    /// transaction.
    pub fn toggle_all_layer_visibility(&mut self) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let layers = doc.get_list(LAYERS);
        if layers.len() == 0 {
            return false;
        }
        let any_visible = (0..layers.len())
            .filter_map(|i| record_at(&layers, i))
            .any(|r| map_bool(&r, "visible").unwrap_or(true));
        for index in 0..layers.len() {
            if let Some(record) = record_at(&layers, index) {
                record.insert("visible", !any_visible).ok();
            }
        }
        commit(&doc, "toggle-all-visibility");
        true
    }

    // ── highlights & comments ────────────────────────────────────────────

    /// Add a highlight or comment. Returns the new id, or the empty-string
    /// sentinel when the store cannot write or the anchor is unavailable.
    ///
    /// Adding a comment also removes the layer's provisional (empty-note)
    /// comments in the same transaction, so an abandoned draft never
    /// outlives the comment that replaces it.
    pub fn add_highlight(&mut self, layer_id: &str, draft: HighlightDraft) -> SmolStr {
        let (Some(doc), Some(provider)) = (self.doc.as_ref(), self.provider.as_ref()) else {
            return SmolStr::default();
        };
        if self.read_only {
            return SmolStr::default();
        }
        let doc = doc.clone();
        let Some(layer) = Self::layer_record(&doc, layer_id) else {
            return SmolStr::default();
        };
        let Some(highlights) = child_list(&layer, "highlights") else {
            return SmolStr::default();
        };
        let Some(token) = provider.encode(draft.surface, draft.span) else {
            tracing::debug!(
                "highlight skipped: anchor unavailable on surface {}",
                draft.surface
            );
            return SmolStr::default();
        };
        let text = provider
            .snapshot_text(draft.surface, draft.span)
            .unwrap_or_default();

        if draft.kind == MarkKind::Comment {
            remove_provisional_comments(&highlights);
        }

        let id = new_id();
        let Ok(record) = highlights.insert_container(highlights.len(), LoroMap::new()) else {
            return SmolStr::default();
        };
        record.insert("id", id.as_str()).ok();
        record.insert("surface", draft.surface as i64).ok();
        record.insert("anchor", token.as_str()).ok();
        record.insert("text", text.as_str()).ok();
        record.insert("note", draft.note.as_str()).ok();
        record.insert("kind", draft.kind.as_str()).ok();
        record.insert("visible", true).ok();
        record.insert_container("replies", LoroList::new()).ok();
        record.insert_container("reactions", LoroMap::new()).ok();
        commit(&doc, "add-highlight");
        id
    }

    /// Toggle-by-range: remove the matching sibling if one exists, create
    /// the highlight otherwise. Matching compares resolved ranges first and
    /// falls back to captured-text equality, within the same mark kind.
    pub fn toggle_highlight(&mut self, layer_id: &str, draft: HighlightDraft) -> Toggled {
        if let Some(id) = self.remove_matching_highlight(layer_id, &draft) {
            return Toggled::Removed(id);
        }
        let id = self.add_highlight(layer_id, draft);
        if id.is_empty() {
            Toggled::NoOp
        } else {
            Toggled::Added(id)
        }
    }

    fn remove_matching_highlight(&self, layer_id: &str, draft: &HighlightDraft) -> Option<SmolStr> {
        let doc = self.write_doc()?;
        let provider = self.provider.as_ref()?;
        let layer = Self::layer_record(doc, layer_id)?;
        let highlights = child_list(&layer, "highlights")?;
        let fallback = provider
            .snapshot_text(draft.surface, draft.span)
            .unwrap_or_default();
        let kind = draft.kind;
        let (index, id) = find_mark_at(
            &highlights,
            provider,
            draft.surface,
            draft.span,
            &fallback,
            |record| {
                map_str(record, "kind")
                    .and_then(|k| MarkKind::from_str(&k))
                    .unwrap_or_default()
                    == kind
            },
        )?;
        highlights.delete(index, 1).ok();
        commit(doc, "toggle-highlight");
        Some(id)
    }

    /// Set the free-text note of a highlight. Giving a provisional comment
    /// a non-empty note saves it.
    pub fn update_highlight_note(&mut self, layer_id: &str, highlight_id: &str, note: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::item_record(&doc, layer_id, "highlights", highlight_id) else {
            return false;
        };
        record.insert("note", note).ok();
        commit(&doc, "update-note");
        true
    }

    pub fn toggle_highlight_visibility(&mut self, layer_id: &str, highlight_id: &str) -> bool {
        self.toggle_item_visibility(layer_id, "highlights", highlight_id, "toggle-highlight-visibility")
    }

    pub fn remove_highlight(&mut self, layer_id: &str, highlight_id: &str) -> bool {
        self.remove_item(layer_id, "highlights", highlight_id, "remove-highlight")
    }

    pub fn clear_layer_highlights(&mut self, layer_id: &str) -> bool {
        self.clear_collection(layer_id, "highlights", "clear-highlights")
    }

    // ── underlines ───────────────────────────────────────────────────────

    /// Add an underline over a range. Empty-id sentinel on failure.
    pub fn add_underline(&mut self, layer_id: &str, surface: u32, span: Span) -> SmolStr {
        let (Some(doc), Some(provider)) = (self.doc.as_ref(), self.provider.as_ref()) else {
            return SmolStr::default();
        };
        if self.read_only {
            return SmolStr::default();
        }
        let doc = doc.clone();
        let Some(layer) = Self::layer_record(&doc, layer_id) else {
            return SmolStr::default();
        };
        let Some(underlines) = child_list(&layer, "underlines") else {
            return SmolStr::default();
        };
        let Some(token) = provider.encode(surface, span) else {
            return SmolStr::default();
        };
        let text = provider.snapshot_text(surface, span).unwrap_or_default();

        let id = new_id();
        let Ok(record) = underlines.insert_container(underlines.len(), LoroMap::new()) else {
            return SmolStr::default();
        };
        record.insert("id", id.as_str()).ok();
        record.insert("surface", surface as i64).ok();
        record.insert("anchor", token.as_str()).ok();
        record.insert("text", text.as_str()).ok();
        record.insert("visible", true).ok();
        commit(&doc, "add-underline");
        id
    }

    /// Toggle-by-range for underlines.
    pub fn toggle_underline(&mut self, layer_id: &str, surface: u32, span: Span) -> Toggled {
        if let Some(id) = self.remove_matching_underline(layer_id, surface, span) {
            return Toggled::Removed(id);
        }
        let id = self.add_underline(layer_id, surface, span);
        if id.is_empty() {
            Toggled::NoOp
        } else {
            Toggled::Added(id)
        }
    }

    fn remove_matching_underline(&self, layer_id: &str, surface: u32, span: Span) -> Option<SmolStr> {
        let doc = self.write_doc()?;
        let provider = self.provider.as_ref()?;
        let layer = Self::layer_record(doc, layer_id)?;
        let underlines = child_list(&layer, "underlines")?;
        let fallback = provider.snapshot_text(surface, span).unwrap_or_default();
        let (index, id) =
            find_mark_at(&underlines, provider, surface, span, &fallback, |_| true)?;
        underlines.delete(index, 1).ok();
        commit(doc, "toggle-underline");
        Some(id)
    }

    pub fn toggle_underline_visibility(&mut self, layer_id: &str, underline_id: &str) -> bool {
        self.toggle_item_visibility(layer_id, "underlines", underline_id, "toggle-underline-visibility")
    }

    pub fn remove_underline(&mut self, layer_id: &str, underline_id: &str) -> bool {
        self.remove_item(layer_id, "underlines", underline_id, "remove-underline")
    }

    pub fn clear_layer_underlines(&mut self, layer_id: &str) -> bool {
        self.clear_collection(layer_id, "underlines", "clear-underlines")
    }

    // ── arrows ───────────────────────────────────────────────────────────

    /// Draw an arrow, toggle-by-endpoints: drawing over an existing arrow
    /// with the same endpoints removes it instead (style is ignored for
    /// matching).
    pub fn add_arrow(&mut self, layer_id: &str, draft: ArrowDraft) -> Toggled {
        if let Some(id) = self.remove_matching_arrow(layer_id, &draft) {
            return Toggled::Removed(id);
        }
        let (Some(doc), Some(provider)) = (self.doc.as_ref(), self.provider.as_ref()) else {
            return Toggled::NoOp;
        };
        if self.read_only {
            return Toggled::NoOp;
        }
        let doc = doc.clone();
        let Some(layer) = Self::layer_record(&doc, layer_id) else {
            return Toggled::NoOp;
        };
        let Some(arrows) = child_list(&layer, "arrows") else {
            return Toggled::NoOp;
        };
        let (Some(from_token), Some(to_token)) = (
            provider.encode(draft.from.surface, draft.from.span),
            provider.encode(draft.to.surface, draft.to.span),
        ) else {
            tracing::debug!("arrow skipped: endpoint anchor unavailable");
            return Toggled::NoOp;
        };

        let id = new_id();
        let Ok(record) = arrows.insert_container(arrows.len(), LoroMap::new()) else {
            return Toggled::NoOp;
        };
        record.insert("id", id.as_str()).ok();
        record.insert("style", draft.style.as_str()).ok();
        record.insert("visible", true).ok();
        for (key, endpoint, token) in [
            ("from", draft.from, from_token),
            ("to", draft.to, to_token),
        ] {
            let Ok(end) = record.insert_container(key, LoroMap::new()) else {
                continue;
            };
            end.insert("surface", endpoint.surface as i64).ok();
            end.insert("anchor", token.as_str()).ok();
            let text = provider
                .snapshot_text(endpoint.surface, endpoint.span)
                .unwrap_or_default();
            end.insert("text", text.as_str()).ok();
        }
        commit(&doc, "add-arrow");
        Toggled::Added(id)
    }

    fn remove_matching_arrow(&self, layer_id: &str, draft: &ArrowDraft) -> Option<SmolStr> {
        let doc = self.write_doc()?;
        let provider = self.provider.as_ref()?;
        let layer = Self::layer_record(doc, layer_id)?;
        let arrows = child_list(&layer, "arrows")?;

        let endpoint_matches = |record: &LoroMap, key: &str, endpoint: &EndpointDraft| {
            let Some(end) = child_map(record, key) else {
                return false;
            };
            if map_i64(&end, "surface") != Some(endpoint.surface as i64) {
                return false;
            }
            let exact = map_str(&end, "anchor").is_some_and(|token| {
                provider.resolve(endpoint.surface, &AnchorToken::new(token))
                    == AnchorState::Resolved(endpoint.span)
            });
            let fallback = provider
                .snapshot_text(endpoint.surface, endpoint.span)
                .unwrap_or_default();
            let by_text =
                !fallback.is_empty() && map_str(&end, "text").as_deref() == Some(&fallback);
            exact || by_text
        };

        for index in 0..arrows.len() {
            let Some(record) = record_at(&arrows, index) else {
                continue;
            };
            if endpoint_matches(&record, "from", &draft.from)
                && endpoint_matches(&record, "to", &draft.to)
            {
                let id = map_str(&record, "id")?;
                arrows.delete(index, 1).ok();
                commit(doc, "toggle-arrow");
                return Some(id);
            }
        }
        None
    }

    pub fn toggle_arrow_visibility(&mut self, layer_id: &str, arrow_id: &str) -> bool {
        self.toggle_item_visibility(layer_id, "arrows", arrow_id, "toggle-arrow-visibility")
    }

    pub fn remove_arrow(&mut self, layer_id: &str, arrow_id: &str) -> bool {
        self.remove_item(layer_id, "arrows", arrow_id, "remove-arrow")
    }

    pub fn clear_layer_arrows(&mut self, layer_id: &str) -> bool {
        self.clear_collection(layer_id, "arrows", "clear-arrows")
    }

    // ── replies & reactions ──────────────────────────────────────────────

    /// Append a reply to a highlight's thread. Empty-id sentinel on failure.
    pub fn add_reply(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        user: &str,
        text: &str,
    ) -> SmolStr {
        let Some(doc) = self.write_doc().cloned() else {
            return SmolStr::default();
        };
        let Some(highlight) = Self::item_record(&doc, layer_id, "highlights", highlight_id) else {
            return SmolStr::default();
        };
        let Some(replies) = child_list(&highlight, "replies")
            .or_else(|| highlight.insert_container("replies", LoroList::new()).ok())
        else {
            return SmolStr::default();
        };

        let id = new_id();
        let Ok(record) = replies.insert_container(replies.len(), LoroMap::new()) else {
            return SmolStr::default();
        };
        record.insert("id", id.as_str()).ok();
        record.insert("text", text).ok();
        record.insert("user", user).ok();
        record.insert("at", now_ms()).ok();
        record.insert_container("reactions", LoroMap::new()).ok();
        commit(&doc, "add-reply");
        id
    }

    pub fn update_reply(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        reply_id: &str,
        text: &str,
    ) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::reply_record(&doc, layer_id, highlight_id, reply_id) else {
            return false;
        };
        record.insert("text", text).ok();
        commit(&doc, "update-reply");
        true
    }

    pub fn remove_reply(&mut self, layer_id: &str, highlight_id: &str, reply_id: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(highlight) = Self::item_record(&doc, layer_id, "highlights", highlight_id) else {
            return false;
        };
        let Some(replies) = child_list(&highlight, "replies") else {
            return false;
        };
        let Some((index, _)) = find_record(&replies, reply_id) else {
            return false;
        };
        replies.delete(index, 1).ok();
        commit(&doc, "remove-reply");
        true
    }

    /// Toggle one user's emoji reaction on a highlight. Reacting twice is a
    /// cancel; concurrent identical toggles merge to presence.
    pub fn toggle_reaction_on_highlight(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        emoji: &str,
        user: &str,
    ) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::item_record(&doc, layer_id, "highlights", highlight_id) else {
            return false;
        };
        Self::toggle_reaction(&doc, &record, emoji, user)
    }

    /// Toggle one user's emoji reaction on a reply.
    pub fn toggle_reaction_on_reply(
        &mut self,
        layer_id: &str,
        highlight_id: &str,
        reply_id: &str,
        emoji: &str,
        user: &str,
    ) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::reply_record(&doc, layer_id, highlight_id, reply_id) else {
            return false;
        };
        Self::toggle_reaction(&doc, &record, emoji, user)
    }

    fn toggle_reaction(doc: &LoroDoc, record: &LoroMap, emoji: &str, user: &str) -> bool {
        let Some(reactions) = child_map(record, "reactions")
            .or_else(|| record.insert_container("reactions", LoroMap::new()).ok())
        else {
            return false;
        };
        let key = reaction_key(emoji, user);
        if reactions.get(&key).is_some() {
            reactions.delete(&key).ok();
        } else {
            reactions.insert(&key, true).ok();
        }
        commit(doc, "toggle-reaction");
        true
    }

    // ── shared item plumbing ─────────────────────────────────────────────

    fn item_record(
        doc: &LoroDoc,
        layer_id: &str,
        collection: &str,
        item_id: &str,
    ) -> Option<LoroMap> {
        let layer = Self::layer_record(doc, layer_id)?;
        let list = child_list(&layer, collection)?;
        find_record(&list, item_id).map(|(_, record)| record)
    }

    fn reply_record(
        doc: &LoroDoc,
        layer_id: &str,
        highlight_id: &str,
        reply_id: &str,
    ) -> Option<LoroMap> {
        let highlight = Self::item_record(doc, layer_id, "highlights", highlight_id)?;
        let replies = child_list(&highlight, "replies")?;
        find_record(&replies, reply_id).map(|(_, record)| record)
    }

    fn toggle_item_visibility(
        &mut self,
        layer_id: &str,
        collection: &str,
        item_id: &str,
        op: &str,
    ) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(record) = Self::item_record(&doc, layer_id, collection, item_id) else {
            return false;
        };
        let visible = map_bool(&record, "visible").unwrap_or(true);
        record.insert("visible", !visible).ok();
        commit(&doc, op);
        true
    }

    fn remove_item(&mut self, layer_id: &str, collection: &str, item_id: &str, op: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(layer) = Self::layer_record(&doc, layer_id) else {
            return false;
        };
        let Some(list) = child_list(&layer, collection) else {
            return false;
        };
        let Some((index, _)) = find_record(&list, item_id) else {
            return false;
        };
        list.delete(index, 1).ok();
        commit(&doc, op);
        true
    }

    fn clear_collection(&mut self, layer_id: &str, collection: &str, op: &str) -> bool {
        let Some(doc) = self.write_doc().cloned() else {
            return false;
        };
        let Some(layer) = Self::layer_record(&doc, layer_id) else {
            return false;
        };
        let Some(list) = child_list(&layer, collection) else {
            return false;
        };
        let len = list.len();
        if len == 0 {
            return false;
        }
        list.delete(0, len).ok();
        commit(&doc, op);
        true
    }

    // ── transport surface ────────────────────────────────────────────────

    /// Export a full snapshot for persistence or initial sync.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, AnnotError> {
        match &self.doc {
            Some(doc) => doc
                .export(ExportMode::Snapshot)
                .map_err(|e| AnnotError::Export(e.to_string())),
            None => Err(AnnotError::Export("document not attached".into())),
        }
    }

    /// Export updates since the given version; `None` when nothing changed.
    pub fn export_updates_since(&self, version: &VersionVector) -> Option<Vec<u8>> {
        use std::borrow::Cow;

        let doc = self.doc.as_ref()?;
        if *version == doc.oplog_vv() {
            return None;
        }
        let updates = doc
            .export(ExportMode::Updates {
                from: Cow::Borrowed(version),
            })
            .ok()?;
        if updates.is_empty() {
            return None;
        }
        Some(updates)
    }

    /// Merge remote updates. Tolerated (and logged) while detached; allowed
    /// in read-only mode, which guards local writes only.
    pub fn import(&mut self, data: &[u8]) -> Result<(), AnnotError> {
        let Some(doc) = &self.doc else {
            tracing::warn!("import ignored: document not attached");
            return Ok(());
        };
        doc.import(data)?;
        Ok(())
    }

    /// Current version vector, for delta sync.
    pub fn version(&self) -> Option<VersionVector> {
        self.doc.as_ref().map(|d| d.oplog_vv())
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    /// Record the current version as synced.
    pub fn mark_synced(&mut self) {
        self.sync.last_synced_version = self.version();
    }

    /// Whether anything changed since the last `mark_synced`.
    pub fn has_unsynced_changes(&self) -> bool {
        match (&self.doc, &self.sync.last_synced_version) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(doc), Some(last)) => doc.oplog_vv() != *last,
        }
    }

    /// Subscribe to change notifications. `None` while detached.
    pub fn subscribe(
        &self,
        callback: impl Fn(ChangeKind) + Send + Sync + 'static,
    ) -> Option<Subscription> {
        self.doc.as_ref().map(|doc| subscribe_changes(doc, callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surfaces::SurfaceSet;
    use marginalia_core::DEFAULT_PALETTE;

    fn store_with_text(text: &str) -> AnnotationStore<SurfaceSet> {
        let doc = LoroDoc::new();
        let mut surfaces = SurfaceSet::new(doc.clone());
        surfaces.mount(0);
        surfaces.splice(0, 0, 0, text);
        let mut store = AnnotationStore::new();
        store.attach(doc, surfaces);
        store
    }

    fn sync_into(from: &AnnotationStore<SurfaceSet>, to: &mut AnnotationStore<SurfaceSet>) {
        let version = to.version().unwrap();
        if let Some(updates) = from.export_updates_since(&version) {
            to.import(&updates).unwrap();
        }
    }

    #[test]
    fn test_detached_store_is_inert() {
        let mut store: AnnotationStore<SurfaceSet> = AnnotationStore::new();
        assert!(!store.is_attached());
        assert!(store.add_layer(AddLayerOptions::default()).is_none());
        assert!(!store.remove_layer("x"));
        assert_eq!(store.add_highlight("x", HighlightDraft::highlight(0, Span::new(0, 1))), "");
        assert!(store.layers().is_empty());
        assert!(store.version().is_none());
        assert!(!store.has_unsynced_changes());
    }

    #[test]
    fn test_layer_lifecycle_scenario() {
        let mut store = store_with_text("some shared text");

        let l1 = store.add_layer(AddLayerOptions::default()).unwrap();
        let l2 = store.add_layer(AddLayerOptions::default()).unwrap();
        let l3 = store.add_layer(AddLayerOptions::default()).unwrap();
        assert_eq!(l1.name, "Layer 1");
        assert_eq!(l2.name, "Layer 2");
        assert_eq!(l3.name, "Layer 3");
        assert_eq!(l1.color, DEFAULT_PALETTE[0]);
        assert_eq!(l2.color, DEFAULT_PALETTE[1]);
        assert_eq!(l3.color, DEFAULT_PALETTE[2]);
        assert_eq!(store.active_layer_id(), Some(l3.id.as_str()));

        assert!(store.remove_layer(&l2.id));
        assert_eq!(store.layers().len(), 2);

        // The freed color is reused; the name counter never rewinds.
        let l4 = store.add_layer(AddLayerOptions::default()).unwrap();
        assert_eq!(l4.color, DEFAULT_PALETTE[1]);
        assert_eq!(l4.name, "Layer 4");
    }

    #[test]
    fn test_palette_exhaustion_fails_closed() {
        let mut store = store_with_text("text");
        for _ in 0..DEFAULT_PALETTE.len() {
            assert!(store.add_layer(AddLayerOptions::default()).is_some());
        }
        assert!(store.add_layer(AddLayerOptions::default()).is_none());
        assert_eq!(store.layers().len(), DEFAULT_PALETTE.len());

        // All colors distinct.
        let mut colors: Vec<_> = store.layers().iter().map(|l| l.color.clone()).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), DEFAULT_PALETTE.len());

        // Extra colors extend capacity.
        let extra = AddLayerOptions {
            extra_colors: vec!["#101010".into()],
            ..Default::default()
        };
        assert_eq!(store.add_layer(extra).unwrap().color, "#101010");
    }

    #[test]
    fn test_explicit_name_does_not_consume_counter() {
        let mut store = store_with_text("text");
        store
            .add_layer(AddLayerOptions {
                name: Some("Mine".into()),
                ..Default::default()
            })
            .unwrap();
        let l = store.add_layer(AddLayerOptions::default()).unwrap();
        assert_eq!(l.name, "Layer 1");
    }

    #[test]
    fn test_counter_floor_recovered_on_attach() {
        let mut store = store_with_text("text");
        store.add_layer(AddLayerOptions::default()).unwrap();
        store.add_layer(AddLayerOptions::default()).unwrap();

        // A second process resumes the same document.
        let snapshot = store.export_snapshot().unwrap();
        let doc = LoroDoc::new();
        doc.import(&snapshot).unwrap();
        let mut surfaces = SurfaceSet::new(doc.clone());
        surfaces.mount(0);
        let mut resumed = AnnotationStore::new();
        resumed.attach(doc, surfaces);

        let l = resumed.add_layer(AddLayerOptions::default()).unwrap();
        assert_eq!(l.name, "Layer 3");
        // Active layer defaults to the first existing layer.
        assert!(resumed.active_layer_id().is_some());
    }

    #[test]
    fn test_remove_layer_fixes_active() {
        let mut store = store_with_text("text");
        let l1 = store.add_layer(AddLayerOptions::default()).unwrap();
        let l2 = store.add_layer(AddLayerOptions::default()).unwrap();
        assert_eq!(store.active_layer_id(), Some(l2.id.as_str()));

        store.remove_layer(&l2.id);
        assert_eq!(store.active_layer_id(), Some(l1.id.as_str()));
        store.remove_layer(&l1.id);
        assert_eq!(store.active_layer_id(), None);

        // Unknown id is a silent no-op.
        assert!(!store.remove_layer("nope"));
    }

    #[test]
    fn test_highlight_roundtrip_and_projection() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        let id = store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(4, 9)));
        assert!(!id.is_empty());

        let layers = store.layers();
        let h = &layers[0].highlights[0];
        assert_eq!(h.id, id);
        assert_eq!(h.text, "quick");
        assert_eq!(h.anchor, AnchorState::Resolved(Span::new(4, 9)));
        assert_eq!(h.kind, MarkKind::Highlight);
        assert!(h.visible);

        // Concurrent-style edit before the range shifts the projection.
        store.provider().unwrap().splice(0, 0, 0, "## ");
        let layers = store.layers();
        assert_eq!(
            layers[0].highlights[0].anchor,
            AnchorState::Resolved(Span::new(7, 12))
        );
    }

    #[test]
    fn test_toggle_highlight_is_idempotent() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();
        let draft = HighlightDraft::highlight(0, Span::new(4, 9));

        let added = store.toggle_highlight(&layer.id, draft.clone());
        assert!(added.added_id().is_some());
        assert_eq!(store.layers()[0].highlights.len(), 1);

        let removed = store.toggle_highlight(&layer.id, draft);
        assert!(matches!(removed, Toggled::Removed(_)));
        assert!(store.layers()[0].highlights.is_empty());
    }

    #[test]
    fn test_toggle_matches_by_fallback_text() {
        // Two occurrences of the same word: toggling the second occurrence
        // still matches the first by captured text, mirroring what happens
        // when a remote edit shifted the offsets out from under us.
        let mut store = store_with_text("abc abc");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(0, 3)));
        let toggled = store.toggle_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(4, 7)));
        assert!(matches!(toggled, Toggled::Removed(_)));
        assert!(store.layers()[0].highlights.is_empty());
    }

    #[test]
    fn test_toggle_respects_kind() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(4, 9)));
        // A comment at the same range is not a duplicate of a highlight.
        let toggled = store.toggle_highlight(
            &layer.id,
            HighlightDraft::comment(0, Span::new(4, 9), "why this word?"),
        );
        assert!(matches!(toggled, Toggled::Added(_)));
        assert_eq!(store.layers()[0].highlights.len(), 2);
    }

    #[test]
    fn test_provisional_comment_cleanup() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        let provisional =
            store.add_highlight(&layer.id, HighlightDraft::comment(0, Span::new(0, 3), ""));
        assert!(!provisional.is_empty());
        assert_eq!(store.layers()[0].highlights.len(), 1);

        // Landing a real comment sweeps the abandoned draft.
        store.add_highlight(
            &layer.id,
            HighlightDraft::comment(0, Span::new(4, 9), "saved"),
        );
        let layers = store.layers();
        assert_eq!(layers[0].highlights.len(), 1);
        assert_eq!(layers[0].highlights[0].note, "saved");

        // Saving a provisional comment via note update keeps it.
        let id = store.add_highlight(&layer.id, HighlightDraft::comment(0, Span::new(10, 15), ""));
        assert!(store.update_highlight_note(&layer.id, &id, "kept"));
        store.add_highlight(
            &layer.id,
            HighlightDraft::comment(0, Span::new(16, 19), "another"),
        );
        let notes: Vec<_> = store.layers()[0]
            .highlights
            .iter()
            .map(|h| h.note.clone())
            .collect();
        assert!(notes.contains(&"kept".into()));
        assert!(notes.contains(&"another".into()));
    }

    #[test]
    fn test_underline_toggle() {
        let mut store = store_with_text("underline me");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        let t = store.toggle_underline(&layer.id, 0, Span::new(0, 9));
        assert!(matches!(t, Toggled::Added(_)));
        assert_eq!(store.layers()[0].underlines.len(), 1);

        let t = store.toggle_underline(&layer.id, 0, Span::new(0, 9));
        assert!(matches!(t, Toggled::Removed(_)));
        assert!(store.layers()[0].underlines.is_empty());
    }

    #[test]
    fn test_arrow_toggle_and_cross_surface() {
        let doc = LoroDoc::new();
        let mut surfaces = SurfaceSet::new(doc.clone());
        surfaces.mount(0);
        surfaces.mount(1);
        surfaces.splice(0, 0, 0, "source passage");
        surfaces.splice(1, 0, 0, "target passage");
        let mut store = AnnotationStore::new();
        store.attach(doc, surfaces);
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();

        let draft = ArrowDraft {
            from: EndpointDraft {
                surface: 0,
                span: Span::new(0, 6),
            },
            to: EndpointDraft {
                surface: 1,
                span: Span::new(0, 6),
            },
            style: ArrowStyle::Dashed,
        };
        let t = store.add_arrow(&layer.id, draft.clone());
        assert!(matches!(t, Toggled::Added(_)));
        let arrows = &store.layers()[0].arrows;
        assert_eq!(arrows.len(), 1);
        assert!(arrows[0].is_cross_surface());
        assert_eq!(arrows[0].style, ArrowStyle::Dashed);

        // Re-drawing the same endpoints removes, even with another style.
        let t = store.add_arrow(
            &layer.id,
            ArrowDraft {
                style: ArrowStyle::Solid,
                ..draft
            },
        );
        assert!(matches!(t, Toggled::Removed(_)));
        assert!(store.layers()[0].arrows.is_empty());
    }

    #[test]
    fn test_replies_and_reactions() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();
        let h = store.add_highlight(
            &layer.id,
            HighlightDraft::comment(0, Span::new(4, 9), "thread head"),
        );

        let reply = store.add_reply(&layer.id, &h, "ada", "agreed");
        assert!(!reply.is_empty());
        assert!(store.update_reply(&layer.id, &h, &reply, "strongly agreed"));

        // Reaction toggles: on, then cancelled by the same (emoji, user).
        assert!(store.toggle_reaction_on_highlight(&layer.id, &h, "👍", "ada"));
        assert!(store.toggle_reaction_on_highlight(&layer.id, &h, "👍", "zoe"));
        assert!(store.toggle_reaction_on_reply(&layer.id, &h, &reply, "🎉", "zoe"));

        let layers = store.layers();
        let head = &layers[0].highlights[0];
        assert_eq!(head.replies.len(), 1);
        assert_eq!(head.replies[0].text, "strongly agreed");
        assert_eq!(head.replies[0].user, "ada");
        assert!(head.replies[0].at > 0);
        assert_eq!(head.reactions.len(), 2);
        assert_eq!(head.replies[0].reactions.len(), 1);

        assert!(store.toggle_reaction_on_highlight(&layer.id, &h, "👍", "ada"));
        let layers = store.layers();
        let head = &layers[0].highlights[0];
        assert_eq!(head.reactions.len(), 1);
        assert_eq!(head.reactions[0].user, "zoe");

        assert!(store.remove_reply(&layer.id, &h, &reply));
        assert!(store.layers()[0].highlights[0].replies.is_empty());

        // Unknown ids are silent no-ops.
        assert!(!store.update_reply(&layer.id, &h, "nope", "x"));
        assert!(!store.toggle_reaction_on_highlight(&layer.id, "nope", "👍", "ada"));
    }

    #[test]
    fn test_visibility_toggles() {
        let mut store = store_with_text("the quick brown fox");
        let a = store.add_layer(AddLayerOptions::default()).unwrap();
        let b = store.add_layer(AddLayerOptions::default()).unwrap();
        let h = store.add_highlight(&a.id, HighlightDraft::highlight(0, Span::new(0, 3)));

        assert!(store.toggle_layer_visibility(&a.id));
        assert!(!store.layers()[0].visible);

        assert!(store.toggle_highlight_visibility(&a.id, &h));
        assert!(!store.layers()[0].highlights[0].visible);

        // One layer is still visible, so hide-all wins.
        assert!(store.toggle_all_layer_visibility());
        assert!(store.layers().iter().all(|l| !l.visible));
        // Now nothing is visible, so show-all wins.
        assert!(store.toggle_all_layer_visibility());
        assert!(store.layers().iter().all(|l| l.visible));

        let _ = b;
    }

    #[test]
    fn test_clear_collections() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();
        store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(0, 3)));
        store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(4, 9)));
        store.add_underline(&layer.id, 0, Span::new(10, 15));

        assert!(store.clear_layer_highlights(&layer.id));
        assert!(store.layers()[0].highlights.is_empty());
        assert_eq!(store.layers()[0].underlines.len(), 1);

        assert!(store.clear_layer_underlines(&layer.id));
        assert!(store.layers()[0].underlines.is_empty());

        // Clearing an already-empty collection is a no-op.
        assert!(!store.clear_layer_arrows(&layer.id));
    }

    #[test]
    fn test_read_only_guard() {
        let mut store = store_with_text("the quick brown fox");
        let layer = store.add_layer(AddLayerOptions::default()).unwrap();
        let before = store.layers();

        store.set_read_only(true);
        assert!(store.add_layer(AddLayerOptions::default()).is_none());
        assert_eq!(
            store.add_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(0, 3))),
            ""
        );
        assert_eq!(
            store.toggle_highlight(&layer.id, HighlightDraft::highlight(0, Span::new(0, 3))),
            Toggled::NoOp
        );
        assert!(!store.remove_layer(&layer.id));
        assert!(!store.toggle_layer_visibility(&layer.id));
        assert!(!store.update_layer_name(&layer.id, "x"));
        assert_eq!(store.layers(), before);

        store.set_read_only(false);
        assert!(store.add_layer(AddLayerOptions::default()).is_some());
    }

    #[test]
    fn test_two_replicas_converge() {
        let mut a = store_with_text("the quick brown fox");
        // Replica B starts from A's snapshot (shared history).
        let snapshot = a.export_snapshot().unwrap();
        let doc_b = LoroDoc::new();
        doc_b.import(&snapshot).unwrap();
        let mut surfaces_b = SurfaceSet::new(doc_b.clone());
        surfaces_b.mount(0);
        let mut b = AnnotationStore::new();
        b.attach(doc_b, surfaces_b);

        // Concurrent mutations on both sides.
        let la = a.add_layer(AddLayerOptions::default()).unwrap();
        a.add_highlight(&la.id, HighlightDraft::highlight(0, Span::new(4, 9)));
        let lb = b.add_layer(AddLayerOptions::default()).unwrap();
        b.add_underline(&lb.id, 0, Span::new(10, 15));

        // Exchange updates both ways.
        sync_into(&a, &mut b);
        sync_into(&b, &mut a);
        sync_into(&a, &mut b);

        let layers_a = a.layers();
        let layers_b = b.layers();
        assert_eq!(layers_a.len(), 2);
        assert_eq!(layers_a, layers_b);
        assert_eq!(a.version().unwrap(), b.version().unwrap());
    }

    #[test]
    fn test_sync_state_tracking() {
        let mut store = store_with_text("text");
        assert!(store.has_unsynced_changes());
        store.mark_synced();
        assert!(!store.has_unsynced_changes());
        let version = store.version().unwrap();
        assert!(store.export_updates_since(&version).is_none());

        store.add_layer(AddLayerOptions::default()).unwrap();
        assert!(store.has_unsynced_changes());
        assert!(store.export_updates_since(&version).is_some());
    }
}
