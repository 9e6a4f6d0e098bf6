use super::scanner::{next_marker_pair, scan, MARKER};
use crate::docx::Document;
use std::collections::{HashMap, HashSet};

/// Upper bound on replacements in one paragraph. Only reached when values
/// splice markers together with the surrounding text over and over.
const MAX_ROUNDS: usize = 10_000;

/// Whether the value of `key` leads back to `key` through the values of the
/// keys it mentions.
fn expands_into_itself(key: &str, values: &HashMap<String, String>) -> bool {
    let mut pending: Vec<String> = values.get(key).map(|v| scan(v)).unwrap_or_default();
    let mut seen = HashSet::new();
    while let Some(next) = pending.pop() {
        if next == key {
            return true;
        }
        if !seen.insert(next.clone()) {
            continue;
        }
        if let Some(value) = values.get(&next) {
            pending.extend(scan(value));
        }
    }
    false
}

/// Resolves placeholders of one paragraph, always starting again from the
/// first `##key##` pair of the rebuilt text.
///
/// Stops at the first key missing from `values`, leaving it and everything
/// after it untouched. A value may itself contain placeholders; they are
/// resolved in later rounds. A key whose value expands back into itself is
/// treated like a missing one.
///
/// Returns `None` when the text did not change.
pub fn substitute_text(text: &str, values: &HashMap<String, String>) -> Option<String> {
    let mut cyclic: HashMap<&str, bool> = HashMap::new();
    let mut current = text.to_string();

    for _ in 0..MAX_ROUNDS {
        let Some((open, close)) = next_marker_pair(&current, 0) else {
            break;
        };
        let key = &current[open + MARKER.len()..close];
        let Some((known, value)) = values.get_key_value(key) else {
            break;
        };
        let is_cyclic = *cyclic
            .entry(known.as_str())
            .or_insert_with(|| expands_into_itself(known, values));
        if is_cyclic {
            log::warn!("Placeholder {} expands into itself, left unresolved", known);
            break;
        }
        let mut next = String::with_capacity(current.len() + value.len());
        next.push_str(&current[..open]);
        next.push_str(value);
        next.push_str(&current[close + MARKER.len()..]);
        current = next;
    }

    (current != text).then_some(current)
}

/// Substitutes every paragraph of the document in place: body, table cells,
/// headers and footers. Returns the number of rewritten paragraphs.
pub fn substitute_document(doc: &mut Document, values: &HashMap<String, String>) -> usize {
    doc.rewrite_paragraphs(|text| substitute_text(text, values))
}
