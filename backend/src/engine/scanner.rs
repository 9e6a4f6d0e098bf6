use crate::docx::Document;

/// Delimiter on both sides of a placeholder key.
pub const MARKER: &str = "##";

/// Byte offsets of the next `##…##` pair at or after `from`: the start of the
/// opening marker and the start of the closing one.
pub(crate) fn next_marker_pair(text: &str, from: usize) -> Option<(usize, usize)> {
    let open = from + text.get(from..)?.find(MARKER)?;
    let key_start = open + MARKER.len();
    let close = key_start + text[key_start..].find(MARKER)?;
    Some((open, close))
}

/// Keys of every `##key##` pair in `text`, left to right.
///
/// An unterminated marker ends the scan quietly. Empty keys (`####`) are
/// skipped.
pub fn scan(text: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut cursor = 0;
    while let Some((open, close)) = next_marker_pair(text, cursor) {
        let key = &text[open + MARKER.len()..close];
        if !key.is_empty() {
            keys.push(key.to_string());
        }
        cursor = close + MARKER.len();
    }
    keys
}

/// Distinct keys of a whole document in order of first appearance: body,
/// tables, headers, footers.
pub fn scan_document(doc: &Document) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for text in doc.paragraph_texts() {
        for key in scan(&text) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx_with, paragraph, runs, table};

    #[test]
    fn adjacent_pairs_are_both_found() {
        assert_eq!(scan("##A####B##"), vec!["A", "B"]);
    }

    #[test]
    fn unterminated_marker_yields_nothing() {
        assert!(scan("Total: ##AMOUNT").is_empty());
        assert_eq!(scan("##A## and ##B"), vec!["A"]);
    }

    #[test]
    fn empty_keys_are_skipped() {
        assert_eq!(scan("####x##Y##"), vec!["Y"]);
        assert!(scan("no markers here").is_empty());
    }

    #[test]
    fn keys_may_contain_non_ascii_text() {
        assert_eq!(scan("Ism: ##F.I.SH## «##Сумма##»"), vec!["F.I.SH", "Сумма"]);
    }

    #[test]
    fn document_scan_is_ordered_and_deduplicated() {
        let body = format!(
            "{}{}{}",
            paragraph("Dear ##NAME##,"),
            table(&[&["##AMOUNT##", "##NAME##"]]),
            runs(&["split ##DA", "TE## key"])
        );
        let bytes = docx_with(&body, &[&paragraph("##COMPANY##")], &[&paragraph("##NAME## / ##PAGE##")]);
        let doc = Document::from_bytes(&bytes).unwrap();
        assert_eq!(
            scan_document(&doc),
            vec!["NAME", "DATE", "AMOUNT", "COMPANY", "PAGE"]
        );
    }
}
