//! Read projection: replicated document -> immutable `Layer[]` snapshot.
//!
//! `project` is a pure function of the document state plus anchor
//! resolution. It never mutates the document (read/write separation keeps
//! the undo history honest), skips records it cannot understand, and
//! surfaces unresolvable anchors as `Absent` positions instead of dropping
//! the records that own them.

use std::sync::Arc;

use loro::event::DiffEvent;
use loro::{EventTriggerKind, LoroDoc, LoroMap, Subscription};
use marginalia_core::{
    AnchorProvider, AnchorState, AnchorToken, Arrow, ArrowEndpoint, ArrowStyle, CommentReply,
    Highlight, Layer, MarkKind, Reaction, Underline,
};
use smol_str::SmolStr;

use crate::schema::{
    self, LAYERS, child_list, child_map, map_bool, map_i64, map_str, record_at,
};

/// What triggered a change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// A transaction committed by this process.
    Local,
    /// Remote updates merged in.
    Remote,
    /// The document was checked out to another version.
    Checkout,
}

/// Subscribe to deep change notifications on a document.
///
/// The callback fires after every committed transaction, local or imported;
/// consumers re-project on each call. Dropping the returned subscription
/// unsubscribes.
pub fn subscribe_changes(
    doc: &LoroDoc,
    callback: impl Fn(ChangeKind) + Send + Sync + 'static,
) -> Subscription {
    doc.subscribe_root(Arc::new(move |event: DiffEvent| {
        let kind = match event.triggered_by {
            EventTriggerKind::Local => ChangeKind::Local,
            EventTriggerKind::Import => ChangeKind::Remote,
            EventTriggerKind::Checkout => ChangeKind::Checkout,
        };
        callback(kind);
    }))
}

/// Project the current document state to a layer snapshot.
pub fn project(doc: &LoroDoc, provider: &impl AnchorProvider) -> Vec<Layer> {
    let layers = doc.get_list(LAYERS);
    (0..layers.len())
        .filter_map(|index| record_at(&layers, index))
        .filter_map(|record| project_layer(&record, provider))
        .collect()
}

fn project_layer(record: &LoroMap, provider: &impl AnchorProvider) -> Option<Layer> {
    let id = map_str(record, "id")?;
    let name = map_str(record, "name").unwrap_or_default();
    let color = map_str(record, "color").unwrap_or_default();
    let visible = map_bool(record, "visible").unwrap_or(true);

    let mut highlights = Vec::new();
    if let Some(list) = child_list(record, "highlights") {
        for index in 0..list.len() {
            if let Some(h) = record_at(&list, index).and_then(|r| project_highlight(&r, provider)) {
                highlights.push(h);
            }
        }
    }

    let mut arrows = Vec::new();
    if let Some(list) = child_list(record, "arrows") {
        for index in 0..list.len() {
            if let Some(a) = record_at(&list, index).and_then(|r| project_arrow(&r, provider)) {
                arrows.push(a);
            }
        }
    }

    let mut underlines = Vec::new();
    if let Some(list) = child_list(record, "underlines") {
        for index in 0..list.len() {
            if let Some(u) = record_at(&list, index).and_then(|r| project_underline(&r, provider))
            {
                underlines.push(u);
            }
        }
    }

    Some(Layer {
        id,
        name,
        color,
        visible,
        highlights,
        arrows,
        underlines,
    })
}

fn resolve_anchor(record: &LoroMap, surface: u32, provider: &impl AnchorProvider) -> AnchorState {
    match map_str(record, "anchor") {
        Some(token) => provider.resolve(surface, &AnchorToken::new(token)),
        None => AnchorState::Absent,
    }
}

fn project_highlight(record: &LoroMap, provider: &impl AnchorProvider) -> Option<Highlight> {
    let id = map_str(record, "id")?;
    let surface = map_i64(record, "surface").unwrap_or(0) as u32;
    let kind = map_str(record, "kind")
        .and_then(|k| MarkKind::from_str(&k))
        .unwrap_or_default();

    let mut replies = Vec::new();
    if let Some(list) = child_list(record, "replies") {
        for index in 0..list.len() {
            if let Some(reply) = record_at(&list, index).and_then(|r| project_reply(&r)) {
                replies.push(reply);
            }
        }
    }

    Some(Highlight {
        anchor: resolve_anchor(record, surface, provider),
        surface,
        text: map_str(record, "text").unwrap_or_default(),
        note: map_str(record, "note").unwrap_or_default(),
        kind,
        visible: map_bool(record, "visible").unwrap_or(true),
        replies,
        reactions: project_reactions(record),
        id,
    })
}

fn project_reply(record: &LoroMap) -> Option<CommentReply> {
    Some(CommentReply {
        id: map_str(record, "id")?,
        text: map_str(record, "text").unwrap_or_default(),
        user: map_str(record, "user").unwrap_or_default(),
        at: map_i64(record, "at").unwrap_or(0),
        reactions: project_reactions(record),
    })
}

/// Reactions are keyed `"<emoji>:<user>"`; the emoji token never contains
/// `':'`, the user name may. Sorted key order keeps projection output
/// deterministic across replicas.
fn project_reactions(record: &LoroMap) -> Vec<Reaction> {
    let Some(reactions) = child_map(record, "reactions") else {
        return Vec::new();
    };
    schema::value_keys_sorted(&reactions)
        .into_iter()
        .filter_map(|key| {
            let (emoji, user) = key.split_once(':')?;
            Some(Reaction {
                emoji: SmolStr::new(emoji),
                user: SmolStr::new(user),
            })
        })
        .collect()
}

fn project_endpoint(record: &LoroMap, provider: &impl AnchorProvider) -> Option<ArrowEndpoint> {
    let surface = map_i64(record, "surface")? as u32;
    Some(ArrowEndpoint {
        anchor: resolve_anchor(record, surface, provider),
        surface,
        text: map_str(record, "text").unwrap_or_default(),
    })
}

fn project_arrow(record: &LoroMap, provider: &impl AnchorProvider) -> Option<Arrow> {
    let id = map_str(record, "id")?;
    let from = project_endpoint(&child_map(record, "from")?, provider)?;
    let to = project_endpoint(&child_map(record, "to")?, provider)?;
    Some(Arrow {
        id,
        from,
        to,
        style: map_str(record, "style")
            .and_then(|s| ArrowStyle::from_str(&s))
            .unwrap_or_default(),
        visible: map_bool(record, "visible").unwrap_or(true),
    })
}

fn project_underline(record: &LoroMap, provider: &impl AnchorProvider) -> Option<Underline> {
    let id = map_str(record, "id")?;
    let surface = map_i64(record, "surface").unwrap_or(0) as u32;
    Some(Underline {
        anchor: resolve_anchor(record, surface, provider),
        surface,
        text: map_str(record, "text").unwrap_or_default(),
        visible: map_bool(record, "visible").unwrap_or(true),
        id,
    })
}
