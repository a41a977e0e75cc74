//! Offset/anchor translation over loro text surfaces.
//!
//! Each text surface is a `LoroText` container (`"surface:{index}"`) in a
//! shared document. Anchors are pairs of loro cursors: stable references
//! that the CRDT keeps resolvable while surrounding text is edited
//! concurrently. Tokens are the base64 forms of the two encoded cursors
//! joined with `'.'`, safe to store as plain strings in annotation records.
//!
//! Mounting is local state: an unmounted surface makes its anchors
//! temporarily unresolvable (`Stale`), not broken (`Absent`).

use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use loro::cursor::{Cursor, Side};
use loro::{CommitOptions, LoroDoc, LoroText};
use marginalia_core::{AnchorProvider, AnchorState, AnchorToken, Span};

use crate::error::AnnotError;

/// Origin prefix for text-surface transactions. The annotation undo manager
/// excludes this prefix so surface edits never land on the annotation undo
/// stack.
pub const SURFACE_ORIGIN_PREFIX: &str = "surface:";

fn container_name(surface: u32) -> String {
    format!("surface:{surface}")
}

/// A set of mounted text surfaces over one loro document.
///
/// Owns the surface-index -> `LoroText` mapping plus the local mounted set,
/// and implements `AnchorProvider` for the annotation store.
pub struct SurfaceSet {
    doc: LoroDoc,
    mounted: BTreeSet<u32>,
}

impl SurfaceSet {
    /// Create a surface set over the given document.
    pub fn new(doc: LoroDoc) -> Self {
        Self {
            doc,
            mounted: BTreeSet::new(),
        }
    }

    /// Mount a surface, making its anchors resolvable.
    pub fn mount(&mut self, surface: u32) {
        self.mounted.insert(surface);
    }

    /// Unmount a surface. Its anchors resolve as stale until remounted.
    pub fn unmount(&mut self, surface: u32) {
        self.mounted.remove(&surface);
    }

    /// Currently-mounted surface indices, ascending.
    pub fn mounted(&self) -> Vec<u32> {
        self.mounted.iter().copied().collect()
    }

    /// The text container of a mounted surface.
    pub fn text(&self, surface: u32) -> Option<LoroText> {
        if !self.mounted.contains(&surface) {
            return None;
        }
        Some(self.doc.get_text(container_name(surface).as_str()))
    }

    /// Apply a text edit to a mounted surface and commit it under the
    /// surface origin, keeping it off the annotation undo stack.
    ///
    /// This is the seam the text-editing collaborator drives; it is also
    /// what tests use to simulate concurrent edits.
    pub fn splice(&self, surface: u32, pos: usize, delete_len: usize, insert: &str) {
        let Some(text) = self.text(surface) else {
            tracing::debug!("splice ignored: surface {surface} not mounted");
            return;
        };
        if delete_len > 0 {
            text.delete(pos, delete_len).ok();
        }
        if !insert.is_empty() {
            text.insert(pos, insert).ok();
        }
        self.doc
            .commit_with(CommitOptions::new().origin(&format!("{SURFACE_ORIGIN_PREFIX}edit")));
    }

    /// Full text of a mounted surface.
    pub fn content(&self, surface: u32) -> Option<String> {
        self.text(surface).map(|t| t.to_string())
    }
}

pub(crate) fn encode_cursors(start: &Cursor, end: &Cursor) -> AnchorToken {
    AnchorToken::new(format!(
        "{}.{}",
        BASE64.encode(start.encode()),
        BASE64.encode(end.encode())
    ))
}

pub(crate) fn decode_token(token: &AnchorToken) -> Result<(Cursor, Cursor), AnnotError> {
    let bad = || AnnotError::BadAnchorToken(token.as_str().to_string());
    let (start, end) = token.as_str().split_once('.').ok_or_else(bad)?;
    let start = BASE64.decode(start).map_err(|_| bad())?;
    let end = BASE64.decode(end).map_err(|_| bad())?;
    let start = Cursor::decode(&start).map_err(|_| bad())?;
    let end = Cursor::decode(&end).map_err(|_| bad())?;
    Ok((start, end))
}

impl AnchorProvider for SurfaceSet {
    fn is_mounted(&self, surface: u32) -> bool {
        self.mounted.contains(&surface)
    }

    fn encode(&self, surface: u32, span: Span) -> Option<AnchorToken> {
        let text = self.text(surface)?;
        if span.to > text.len_unicode() {
            return None;
        }
        let start = text.get_cursor(span.from, Side::Left)?;
        let end = text.get_cursor(span.to, Side::Left)?;
        Some(encode_cursors(&start, &end))
    }

    fn resolve(&self, surface: u32, token: &AnchorToken) -> AnchorState {
        if !self.mounted.contains(&surface) {
            return AnchorState::Stale;
        }
        let Ok((start, end)) = decode_token(token) else {
            return AnchorState::Absent;
        };
        let (Ok(start), Ok(end)) = (
            self.doc.get_cursor_pos(&start),
            self.doc.get_cursor_pos(&end),
        ) else {
            return AnchorState::Absent;
        };
        // Concurrent deletes can invert the endpoints; keep the span ordered.
        AnchorState::Resolved(Span::new(start.current.pos, end.current.pos))
    }

    fn snapshot_text(&self, surface: u32, span: Span) -> Option<String> {
        let text = self.text(surface)?;
        text.slice(span.from, span.to).ok()
    }
}
