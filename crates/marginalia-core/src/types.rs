//! Core annotation types: spans, marks, arrows, and projected snapshots.
//!
//! These types are storage-agnostic. The replicated store produces them as
//! immutable snapshots on every projection cycle; presentation code consumes
//! them and never mutates them.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A half-open character range `[from, to)` in one text surface.
///
/// Offsets are character offsets (NOT byte offsets) in the surface's current
/// text. Spans are only meaningful for the projection cycle they were
/// resolved in; store anchor tokens, not spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    /// Create a span, ordering the endpoints if needed.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    /// Span length in characters.
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// Check if the span is empty (a caret, not a range).
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Check if an offset falls inside the span.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.from && offset < self.to
    }
}

/// Where an anchored range currently sits, as seen by one projection cycle.
///
/// `Stale` means the surface is not mounted right now and the anchor may
/// resolve again later; `Absent` means the anchor can no longer be placed in
/// the surface's text. Neither state deletes the underlying record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorState {
    /// The anchor resolves to a current span.
    Resolved(Span),
    /// The surface is temporarily unavailable; position unknown.
    Stale,
    /// The anchor cannot be placed anymore (e.g. the text was deleted).
    Absent,
}

impl AnchorState {
    /// The resolved span, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Resolved(span) => Some(*span),
            _ => None,
        }
    }

    /// Returns true if the anchor currently resolves to a position.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Kind of a range mark: a plain highlight or a comment thread head.
///
/// A comment with an empty note is "provisional" (awaiting text) and is
/// eligible for silent cleanup; a comment with a non-empty note is saved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    #[default]
    Highlight,
    Comment,
}

impl MarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highlight => "highlight",
            Self::Comment => "comment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "highlight" => Some(Self::Highlight),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// Stroke style of a connecting arrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Double,
}

impl ArrowStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Double => "double",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "solid" => Some(Self::Solid),
            "dashed" => Some(Self::Dashed),
            "dotted" => Some(Self::Dotted),
            "double" => Some(Self::Double),
            _ => None,
        }
    }
}

/// One emoji reaction by one user. Presence-only: reacting twice cancels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: SmolStr,
    pub user: SmolStr,
}

/// A reply in a comment thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentReply {
    pub id: SmolStr,
    pub text: SmolStr,
    pub user: SmolStr,
    /// Creation time, epoch milliseconds.
    pub at: i64,
    pub reactions: Vec<Reaction>,
}

/// Projected highlight (or comment-thread head) with its current position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: SmolStr,
    pub surface: u32,
    pub anchor: AnchorState,
    /// Text captured when the mark was created; the fallback for matching
    /// when offsets have drifted across replicas.
    pub text: SmolStr,
    /// Free-text annotation. Empty for plain highlights and provisional
    /// comments.
    pub note: SmolStr,
    pub kind: MarkKind,
    pub visible: bool,
    pub replies: Vec<CommentReply>,
    pub reactions: Vec<Reaction>,
}

impl Highlight {
    /// A comment that has been given text.
    pub fn is_saved_comment(&self) -> bool {
        self.kind == MarkKind::Comment && !self.note.is_empty()
    }

    /// A comment still awaiting its text; eligible for silent cleanup.
    pub fn is_provisional_comment(&self) -> bool {
        self.kind == MarkKind::Comment && self.note.is_empty()
    }
}

/// One end of an arrow. Endpoints may live on different surfaces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowEndpoint {
    pub surface: u32,
    pub anchor: AnchorState,
    /// Text captured at creation time, for cross-replica matching.
    pub text: SmolStr,
}

/// Projected connecting arrow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrow {
    pub id: SmolStr,
    pub from: ArrowEndpoint,
    pub to: ArrowEndpoint,
    pub style: ArrowStyle,
    pub visible: bool,
}

impl Arrow {
    /// True when the arrow connects ranges on two different surfaces.
    pub fn is_cross_surface(&self) -> bool {
        self.from.surface != self.to.surface
    }
}

/// Projected underline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Underline {
    pub id: SmolStr,
    pub surface: u32,
    pub anchor: AnchorState,
    pub text: SmolStr,
    pub visible: bool,
}

/// A named, colored, independently toggleable grouping of annotations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: SmolStr,
    pub name: SmolStr,
    pub color: SmolStr,
    pub visible: bool,
    pub highlights: Vec<Highlight>,
    pub arrows: Vec<Arrow>,
    pub underlines: Vec<Underline>,
}

impl Layer {
    /// True when the layer holds no annotations of any kind.
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.arrows.is_empty() && self.underlines.is_empty()
    }

    /// Total annotation count across all collections.
    pub fn annotation_count(&self) -> usize {
        self.highlights.len() + self.arrows.len() + self.underlines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_orders_endpoints() {
        let span = Span::new(9, 3);
        assert_eq!(span.from, 3);
        assert_eq!(span.to, 9);
        assert_eq!(span.len(), 6);
        assert!(!span.is_empty());
    }

    #[test]
    fn test_span_contains() {
        let span = Span::new(5, 10);
        assert!(!span.contains(4));
        assert!(span.contains(5));
        assert!(span.contains(9));
        assert!(!span.contains(10)); // end is exclusive
    }

    #[test]
    fn test_anchor_state_span() {
        assert_eq!(
            AnchorState::Resolved(Span::new(1, 2)).span(),
            Some(Span::new(1, 2))
        );
        assert_eq!(AnchorState::Stale.span(), None);
        assert_eq!(AnchorState::Absent.span(), None);
        assert!(!AnchorState::Absent.is_resolved());
    }

    #[test]
    fn test_mark_kind_roundtrip() {
        for kind in [MarkKind::Highlight, MarkKind::Comment] {
            assert_eq!(MarkKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MarkKind::from_str("sticker"), None);
    }

    #[test]
    fn test_arrow_style_roundtrip() {
        for style in [
            ArrowStyle::Solid,
            ArrowStyle::Dashed,
            ArrowStyle::Dotted,
            ArrowStyle::Double,
        ] {
            assert_eq!(ArrowStyle::from_str(style.as_str()), Some(style));
        }
        assert_eq!(ArrowStyle::from_str("wavy"), None);
    }

    #[test]
    fn test_provisional_comment() {
        let mut h = Highlight {
            id: "h1".into(),
            surface: 0,
            anchor: AnchorState::Absent,
            text: "quoted".into(),
            note: "".into(),
            kind: MarkKind::Comment,
            visible: true,
            replies: Vec::new(),
            reactions: Vec::new(),
        };
        assert!(h.is_provisional_comment());
        assert!(!h.is_saved_comment());

        h.note = "now saved".into();
        assert!(h.is_saved_comment());
        assert!(!h.is_provisional_comment());

        h.kind = MarkKind::Highlight;
        assert!(!h.is_saved_comment());
    }
}
