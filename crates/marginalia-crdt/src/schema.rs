//! Typed accessors over the replicated annotation schema.
//!
//! Document layout, rooted in one `LoroDoc`:
//!
//! ```text
//! LoroList "layers" [
//!   LoroMap {
//!     "id", "name", "color", "visible",
//!     "highlights": LoroList [ LoroMap {
//!        "id", "surface", "anchor", "text", "note", "kind", "visible",
//!        "replies": LoroList [ LoroMap { "id", "text", "user", "at",
//!                                        "reactions": LoroMap } ],
//!        "reactions": LoroMap { "<emoji>:<user>": true }
//!     } ],
//!     "arrows": LoroList [ LoroMap { "id", "style", "visible",
//!        "from": LoroMap { "surface", "anchor", "text" },
//!        "to":   LoroMap { "surface", "anchor", "text" } } ],
//!     "underlines": LoroList [ LoroMap { "id", "surface", "anchor",
//!                                        "text", "visible" } ]
//!   }
//! ]
//! ```
//!
//! Record fields are plain last-write-wins values; collections are native
//! replicated containers so concurrent structural edits merge instead of
//! overwriting each other.

use loro::{Container, LoroList, LoroMap, LoroValue, ValueOrContainer};
use smol_str::SmolStr;

/// Root list container holding the layers.
pub(crate) const LAYERS: &str = "layers";

pub(crate) fn map_str(map: &LoroMap, key: &str) -> Option<SmolStr> {
    match map.get(key) {
        Some(ValueOrContainer::Value(LoroValue::String(s))) => Some(SmolStr::new(&*s)),
        _ => None,
    }
}

pub(crate) fn map_bool(map: &LoroMap, key: &str) -> Option<bool> {
    match map.get(key) {
        Some(ValueOrContainer::Value(LoroValue::Bool(b))) => Some(b),
        _ => None,
    }
}

pub(crate) fn map_i64(map: &LoroMap, key: &str) -> Option<i64> {
    match map.get(key) {
        Some(ValueOrContainer::Value(LoroValue::I64(i))) => Some(i),
        _ => None,
    }
}

pub(crate) fn child_list(map: &LoroMap, key: &str) -> Option<LoroList> {
    match map.get(key) {
        Some(ValueOrContainer::Container(Container::List(list))) => Some(list),
        _ => None,
    }
}

pub(crate) fn child_map(map: &LoroMap, key: &str) -> Option<LoroMap> {
    match map.get(key) {
        Some(ValueOrContainer::Container(Container::Map(m))) => Some(m),
        _ => None,
    }
}

/// The record map at a list index, if that slot holds a map.
pub(crate) fn record_at(list: &LoroList, index: usize) -> Option<LoroMap> {
    match list.get(index) {
        Some(ValueOrContainer::Container(Container::Map(m))) => Some(m),
        _ => None,
    }
}

/// Find a record by its `"id"` field. O(n); annotation lists are small.
pub(crate) fn find_record(list: &LoroList, id: &str) -> Option<(usize, LoroMap)> {
    for index in 0..list.len() {
        if let Some(record) = record_at(list, index) {
            if map_str(&record, "id").as_deref() == Some(id) {
                return Some((index, record));
            }
        }
    }
    None
}

/// Plain-value keys of a map, sorted for deterministic projection order.
pub(crate) fn value_keys_sorted(map: &LoroMap) -> Vec<String> {
    let mut keys: Vec<String> = match map.get_value() {
        LoroValue::Map(entries) => entries.keys().map(|k| k.to_string()).collect(),
        _ => Vec::new(),
    };
    keys.sort();
    keys
}
