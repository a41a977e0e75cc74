//! marginalia-core: annotation domain logic without storage dependencies.
//!
//! This crate provides:
//! - Snapshot types (`Layer`, `Highlight`, `Arrow`, `Underline`, ...) produced
//!   by the replicated store's projection
//! - `AnchorProvider` trait + `AnchorToken` for offset/token translation
//! - The layer color palette and default-name allocation
//! - `CommandHistory` - the local (non-replicated) half of undo

pub mod anchor;
pub mod history;
pub mod palette;
pub mod types;

pub use anchor::{AnchorProvider, AnchorToken};
pub use history::{Command, CommandHistory, LogEntry, LogKind};
pub use palette::{DEFAULT_PALETTE, default_layer_name, first_free_color, parse_default_layer_name};
pub use smol_str::SmolStr;
pub use types::{
    AnchorState, Arrow, ArrowEndpoint, ArrowStyle, CommentReply, Highlight, Layer, MarkKind,
    Reaction, Span, Underline,
};
