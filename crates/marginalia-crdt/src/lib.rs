//! Loro-backed replicated annotation store.
//!
//! This crate provides:
//! - `AnnotationStore`: layers of highlights/arrows/underlines/comment
//!   threads/reactions over a replicated document, with toggle-by-range
//!   mutation semantics
//! - `SurfaceSet`: offset <-> anchor-token translation over loro text
//!   surfaces, so annotations stay attached under concurrent edits
//! - `project`/`subscribe_changes`: the pure read projection and its change
//!   notification
//! - `UnifiedHistory`: document undo + local command history behind one
//!   undo/redo surface
//! - `Workspace`: the consumer-facing facade combining all of the above

mod error;
mod project;
mod schema;
mod store;
mod surfaces;
mod undo;
mod workspace;

pub use error::AnnotError;
pub use project::{ChangeKind, project, subscribe_changes};
pub use store::{
    ANNOT_ORIGIN_PREFIX, AddLayerOptions, AnnotationStore, ArrowDraft, EndpointDraft,
    HighlightDraft, NewLayer, SyncState, Toggled,
};
pub use surfaces::{SURFACE_ORIGIN_PREFIX, SurfaceSet};
pub use undo::{UndoSource, UnifiedHistory};
pub use workspace::{Tool, Workspace};

// Re-export the core domain types and the loro types consumers need.
pub use marginalia_core::{
    AnchorProvider, AnchorState, AnchorToken, Arrow, ArrowEndpoint, ArrowStyle, Command,
    CommandHistory, CommentReply, Highlight, Layer, LogEntry, LogKind, MarkKind, Reaction, Span,
    Underline,
};
pub use loro::{ExportMode, LoroDoc, Subscription, VersionVector};
