//! Layer color and default-name assignment.
//!
//! Color allocation is a pure function of the current layer set, never of
//! history, so undo/redo replays stay consistent without special-casing.
//! The default-name counter is session-local and monotonic; its floor is
//! recovered by scanning existing names (see the store's attach path).

use smol_str::SmolStr;

/// Fixed ordered palette for new layers.
///
/// New layers take the first color not used by any existing layer; removing
/// a layer frees its color for the next allocation only.
pub const DEFAULT_PALETTE: [&str; 12] = [
    "#ffd54f", // amber
    "#aed581", // light green
    "#4fc3f7", // light blue
    "#f48fb1", // pink
    "#ffb74d", // orange
    "#b39ddb", // lavender
    "#80cbc4", // teal
    "#e57373", // red
    "#90a4ae", // blue grey
    "#dce775", // lime
    "#9fa8da", // indigo
    "#a1887f", // brown
];

/// Pick the first color of the palette (extended by `extra`, deduplicated)
/// that no existing layer uses.
///
/// Returns `None` when every candidate is taken. No wrap-around: exhaustion
/// fails closed and the caller surfaces it.
pub fn first_free_color(extra: &[SmolStr], used: &[SmolStr]) -> Option<SmolStr> {
    let mut candidates: Vec<&str> = DEFAULT_PALETTE.to_vec();
    for color in extra {
        if !candidates.iter().any(|c| *c == color.as_str()) {
            candidates.push(color.as_str());
        }
    }
    candidates
        .into_iter()
        .find(|c| !used.iter().any(|u| u == c))
        .map(SmolStr::new)
}

/// Default display name for the nth layer created this session.
pub fn default_layer_name(counter: u64) -> SmolStr {
    smol_str::format_smolstr!("Layer {counter}")
}

/// Parse a default-form name back to its counter value.
///
/// Used to recover the counter floor from existing layers when a process
/// resumes a document, so default names never collide within a session.
pub fn parse_default_layer_name(name: &str) -> Option<u64> {
    name.strip_prefix("Layer ")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smol(items: &[&str]) -> Vec<SmolStr> {
        items.iter().map(|s| SmolStr::new(s)).collect()
    }

    #[test]
    fn test_first_free_skips_used() {
        let used = smol(&[DEFAULT_PALETTE[0], DEFAULT_PALETTE[1]]);
        assert_eq!(
            first_free_color(&[], &used).as_deref(),
            Some(DEFAULT_PALETTE[2])
        );
    }

    #[test]
    fn test_exhaustion_fails_closed() {
        let used = smol(&DEFAULT_PALETTE);
        assert_eq!(first_free_color(&[], &used), None);

        // An extra color extends the palette past exhaustion.
        let extra = smol(&["#123456"]);
        assert_eq!(first_free_color(&extra, &used).as_deref(), Some("#123456"));
    }

    #[test]
    fn test_removal_frees_color_for_next_allocation() {
        let mut used = smol(&DEFAULT_PALETTE[..3]);
        used.remove(1);
        assert_eq!(
            first_free_color(&[], &used).as_deref(),
            Some(DEFAULT_PALETTE[1])
        );
    }

    #[test]
    fn test_extra_colors_dedupe_against_palette() {
        // Duplicating a palette color must not produce a second candidate.
        let extra = smol(&[DEFAULT_PALETTE[0], "#123456", "#123456"]);
        let used = smol(&DEFAULT_PALETTE);
        assert_eq!(first_free_color(&extra, &used).as_deref(), Some("#123456"));

        let mut all_used = smol(&DEFAULT_PALETTE);
        all_used.push(SmolStr::new("#123456"));
        assert_eq!(first_free_color(&extra, &all_used), None);
    }

    #[test]
    fn test_default_name_roundtrip() {
        assert_eq!(default_layer_name(4), "Layer 4");
        assert_eq!(parse_default_layer_name("Layer 4"), Some(4));
        assert_eq!(parse_default_layer_name("Layer 12"), Some(12));
        assert_eq!(parse_default_layer_name("My notes"), None);
        assert_eq!(parse_default_layer_name("Layer x"), None);
    }
}
