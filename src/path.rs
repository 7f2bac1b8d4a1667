//! Dotted field-path resolution over BSON documents
//!
//! A dotted path such as `card.number` is ambiguous between a single flat
//! key that happens to contain dots (common in wire-format documents) and a
//! hierarchical descent through nested documents. Both operations here
//! resolve the ambiguity the same way: at every level the remaining path is
//! tried as one literal key first, and only then split at the first `.` to
//! descend into a nested document.
//!
//! Resolution never fails. An absent key, a non-document intermediate, or a
//! path deeper than the segment bound all mean "field not applicable", so
//! heterogeneous document shapes flow through untouched.

use bson::{Bson, Document};

/// Resolve a dotted path against a document.
///
/// Returns `None` when the field is absent, an intermediate value is not a
/// nested document, or more than `max_depth` descents would be needed.
pub fn lookup<'a>(path: &str, doc: &'a Document, max_depth: usize) -> Option<&'a Bson> {
    let mut current = doc;
    let mut remaining = path;
    for _ in 0..max_depth {
        // Flat literal keys take precedence over hierarchical interpretation.
        if let Some(value) = current.get(remaining) {
            return Some(value);
        }
        let (head, rest) = remaining.split_once('.')?;
        match current.get(head) {
            Some(Bson::Document(sub)) => {
                current = sub;
                remaining = rest;
            }
            _ => return None,
        }
    }
    None
}

/// Write a value at a dotted path, overwriting existing slots only.
///
/// If the remaining path exists as a literal key at the current level it is
/// overwritten in place. Otherwise, when the path contains a `.` and does
/// not end with one, it is split at the first `.` and the walk descends into
/// an existing nested document. In every other case the write is silently
/// dropped: the document's existing shape is authoritative and is never
/// grown, so decryption cannot introduce fields the original schema did not
/// provision for.
pub fn write(path: &str, doc: &mut Document, value: Bson, max_depth: usize) {
    let mut current = doc;
    let mut remaining = path;
    for _ in 0..max_depth {
        let level = current;
        if level.contains_key(remaining) {
            level.insert(remaining, value);
            return;
        }
        if remaining.ends_with('.') {
            return;
        }
        let Some((head, rest)) = remaining.split_once('.') else {
            return;
        };
        match level.get_mut(head) {
            Some(Bson::Document(sub)) => {
                current = sub;
                remaining = rest;
            }
            _ => return,
        }
    }
}
