//! The anchor seam between the annotation store and the text surfaces.
//!
//! The store never touches surface text directly. It goes through
//! `AnchorProvider`, which turns offset ranges into opaque tokens that stay
//! valid under concurrent edits, and resolves tokens back to current offsets
//! for each projection cycle.

use smol_str::SmolStr;

use crate::types::{AnchorState, Span};

/// An opaque, provider-issued reference to a text range.
///
/// Tokens are stable across concurrent inserts/deletes in the surface and
/// are safe to store in the replicated document. Only the provider that
/// issued a token can resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnchorToken(SmolStr);

impl AnchorToken {
    pub fn new(token: impl Into<SmolStr>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AnchorToken {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Offset/token translation over a set of mounted text surfaces.
///
/// Implementations must keep `resolve` side-effect-free: it runs once per
/// annotation per projection cycle. A surface that is not currently mounted
/// is temporarily unresolvable (`AnchorState::Stale`), never an error.
pub trait AnchorProvider {
    /// Whether the surface is currently mounted.
    fn is_mounted(&self, surface: u32) -> bool;

    /// Issue a stable token for an offset range.
    ///
    /// Returns `None` when the surface is unmounted or the span does not fit
    /// the surface's current text; callers treat that as a silent no-op.
    fn encode(&self, surface: u32, span: Span) -> Option<AnchorToken>;

    /// Resolve a token back to current offsets.
    fn resolve(&self, surface: u32, token: &AnchorToken) -> AnchorState;

    /// Capture the literal text of a range, for fallback matching.
    fn snapshot_text(&self, surface: u32, span: Span) -> Option<String>;
}
