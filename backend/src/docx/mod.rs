//! # Docx package
//!
//! A `.docx` file is a zip package of XML parts. `Document` keeps every
//! entry of the package verbatim and parses only the story parts that can
//! hold template text:
//!
//! - `word/document.xml` (the body),
//! - `word/header*.xml`,
//! - `word/footer*.xml`.
//!
//! Paragraphs are always visited in the same order: body paragraphs, body
//! tables (row by row, cell by cell, nested tables included), then headers
//! and footers. `body_runs` is the exception: it follows the page, with each
//! table between the paragraphs around it. Parts that were not rewritten are
//! written back byte for byte.

pub mod paragraph;
pub mod xml;

use paragraph::RunText;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use xml::{Element, Node};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const BODY_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing part {0}")]
    MissingPart(String),

    #[error("unexpected structure in {part}: {reason}")]
    Malformed { part: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartKind {
    Body,
    Header,
    Footer,
}

impl PartKind {
    fn of(name: &str) -> Option<PartKind> {
        if name == BODY_PART {
            return Some(PartKind::Body);
        }
        let file = name.strip_prefix("word/")?;
        if file.contains('/') || !file.ends_with(".xml") {
            return None;
        }
        if file.starts_with("header") {
            Some(PartKind::Header)
        } else if file.starts_with("footer") {
            Some(PartKind::Footer)
        } else {
            None
        }
    }

    fn root(&self) -> &'static str {
        match self {
            PartKind::Body => "w:document",
            PartKind::Header => "w:hdr",
            PartKind::Footer => "w:ftr",
        }
    }
}

struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

struct Story {
    kind: PartKind,
    entry: usize,
    nodes: Vec<Node>,
    dirty: bool,
}

impl Story {
    /// The element whose block children are the story's paragraphs and tables.
    fn container(&self) -> Option<&Element> {
        let root = self.nodes.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })?;
        match self.kind {
            PartKind::Body => root.child("w:body"),
            _ => Some(root),
        }
    }

    fn container_mut(&mut self) -> Option<&mut Element> {
        let kind = self.kind;
        let root = self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })?;
        match kind {
            PartKind::Body => root.child_mut("w:body"),
            _ => Some(root),
        }
    }

    fn paragraphs(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        if let Some(container) = self.container() {
            paragraph::collect(container, &mut out);
        }
        out
    }

    fn paragraphs_in_reading_order(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        if let Some(container) = self.container() {
            paragraph::collect_in_reading_order(container, &mut out);
        }
        out
    }
}

/// Sort key for `header2.xml` before `header10.xml`.
fn part_order(name: &str) -> (usize, &str) {
    (name.len(), name)
}

pub struct Document {
    entries: Vec<Entry>,
    stories: Vec<Story>,
}

impl Document {
    pub fn from_bytes(bytes: &[u8]) -> Result<Document, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }

        let mut stories = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let Some(kind) = PartKind::of(&entry.name) else {
                continue;
            };
            let nodes = xml::parse(&entry.data).map_err(|source| DocxError::Xml {
                part: entry.name.clone(),
                source,
            })?;
            let story = Story {
                kind,
                entry: index,
                nodes,
                dirty: false,
            };
            let root_ok = story
                .nodes
                .iter()
                .any(|n| matches!(n, Node::Element(el) if el.is(kind.root())));
            if !root_ok || story.container().is_none() {
                return Err(DocxError::Malformed {
                    part: entry.name.clone(),
                    reason: format!("expected a {} root", kind.root()),
                });
            }
            stories.push(story);
        }

        if !stories.iter().any(|s| s.kind == PartKind::Body) {
            return Err(DocxError::MissingPart(BODY_PART.to_string()));
        }
        stories.sort_by(|a, b| {
            (a.kind, part_order(&entries[a.entry].name))
                .cmp(&(b.kind, part_order(&entries[b.entry].name)))
        });

        Ok(Document { entries, stories })
    }

    /// Writes the package back, re-serializing only rewritten parts.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut rewritten: Vec<Option<Vec<u8>>> = vec![None; self.entries.len()];
        for story in self.stories.iter().filter(|s| s.dirty) {
            let data = xml::write(&story.nodes).map_err(|source| DocxError::Xml {
                part: self.entries[story.entry].name.clone(),
                source,
            })?;
            rewritten[story.entry] = Some(data);
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (entry, replacement) in self.entries.iter().zip(rewritten.iter()) {
            if entry.is_dir {
                zip.add_directory(entry.name.clone(), options)?;
                continue;
            }
            zip.start_file(entry.name.clone(), options)?;
            zip.write_all(replacement.as_deref().unwrap_or(entry.data.as_slice()))?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Plain text of every paragraph, in visiting order.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.stories
            .iter()
            .flat_map(|story| story.paragraphs())
            .map(paragraph::text)
            .collect()
    }

    /// Styled runs of the body's paragraphs in reading order, one entry per
    /// paragraph.
    pub fn body_runs(&self) -> Vec<Vec<RunText>> {
        self.stories
            .iter()
            .filter(|story| story.kind == PartKind::Body)
            .flat_map(|story| story.paragraphs_in_reading_order())
            .map(paragraph::run_texts)
            .collect()
    }

    /// Offers each paragraph's text to `f`; when it returns a new text the
    /// paragraph is rewritten as a single run. Returns how many changed.
    pub fn rewrite_paragraphs<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut changed = 0;
        for story in &mut self.stories {
            let mut story_changed = 0;
            if let Some(container) = story.container_mut() {
                paragraph::visit_mut(container, &mut |p: &mut Element| {
                    let current = paragraph::text(p);
                    if let Some(updated) = f(&current) {
                        if updated != current {
                            paragraph::rewrite(p, &updated);
                            story_changed += 1;
                        }
                    }
                });
            }
            if story_changed > 0 {
                story.dirty = true;
                changed += story_changed;
            }
        }
        changed
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory `.docx` packages for tests.

    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    pub fn paragraph(text: &str) -> String {
        runs(&[text])
    }

    /// A paragraph whose text is split over several runs.
    pub fn runs(parts: &[&str]) -> String {
        let runs: String = parts
            .iter()
            .map(|t| format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, t))
            .collect();
        format!("<w:p>{}</w:p>", runs)
    }

    pub fn table(rows: &[&[&str]]) -> String {
        let rows: String = rows
            .iter()
            .map(|cells| {
                let cells: String = cells
                    .iter()
                    .map(|c| format!("<w:tc>{}</w:tc>", paragraph(c)))
                    .collect();
                format!("<w:tr>{}</w:tr>", cells)
            })
            .collect();
        format!("<w:tbl>{}</w:tbl>", rows)
    }

    pub fn docx_with(body: &str, headers: &[&str], footers: &[&str]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        let mut put = |name: &str, content: String| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };
        put(
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_string(),
        );
        put(
            "word/document.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {}><w:body>{}<w:sectPr/></w:body></w:document>"#,
                NS, body
            ),
        );
        for (i, header) in headers.iter().enumerate() {
            put(
                &format!("word/header{}.xml", i + 1),
                format!("<w:hdr {}>{}</w:hdr>", NS, header),
            );
        }
        for (i, footer) in footers.iter().enumerate() {
            put(
                &format!("word/footer{}.xml", i + 1),
                format!("<w:ftr {}>{}</w:ftr>", NS, footer),
            );
        }
        put("word/media/logo.bin", "\u{1}\u{2}\u{3}".to_string());
        zip.finish().unwrap().into_inner()
    }

    pub fn docx(body: &str) -> Vec<u8> {
        docx_with(body, &[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn paragraphs_are_visited_body_tables_headers_footers() {
        let bytes = docx_with(
            &format!("{}{}{}", paragraph("one"), table(&[&["a", "b"], &["c", "d"]]), paragraph("two")),
            &[&paragraph("head")],
            &[&paragraph("foot")],
        );
        let doc = Document::from_bytes(&bytes).unwrap();
        assert_eq!(
            doc.paragraph_texts(),
            vec!["one", "two", "a", "b", "c", "d", "head", "foot"]
        );
    }

    #[test]
    fn body_runs_follow_the_page() {
        let bytes = docx_with(
            &format!("{}{}{}", paragraph("Intro"), table(&[&["CELL"]]), paragraph("Signature")),
            &[&paragraph("head")],
            &[],
        );
        let doc = Document::from_bytes(&bytes).unwrap();
        let texts: Vec<String> = doc
            .body_runs()
            .into_iter()
            .map(|runs| runs.into_iter().map(|r| r.text).collect())
            .collect();
        assert_eq!(texts, vec!["Intro", "CELL", "Signature"]);
        assert_eq!(doc.paragraph_texts(), vec!["Intro", "Signature", "CELL", "head"]);
    }

    #[test]
    fn untouched_parts_round_trip_verbatim() {
        let bytes = docx_with(&paragraph("hello"), &[&paragraph("h")], &[]);
        let mut doc = Document::from_bytes(&bytes).unwrap();
        let changed = doc.rewrite_paragraphs(|text| (text == "h").then(|| "H".to_string()));
        assert_eq!(changed, 1);
        let out = doc.to_bytes().unwrap();

        assert_eq!(entry(&out, "word/document.xml"), entry(&bytes, "word/document.xml"));
        assert_eq!(entry(&out, "word/media/logo.bin"), entry(&bytes, "word/media/logo.bin"));
        let reread = Document::from_bytes(&out).unwrap();
        assert_eq!(reread.paragraph_texts(), vec!["hello", "H"]);
    }

    #[test]
    fn nested_tables_are_reached() {
        let inner = table(&[&["deep"]]);
        let body = format!("<w:tbl><w:tr><w:tc>{}{}</w:tc></w:tr></w:tbl>", paragraph("outer"), inner);
        let doc = Document::from_bytes(&docx(&body)).unwrap();
        assert_eq!(doc.paragraph_texts(), vec!["outer", "deep"]);
    }

    #[test]
    fn non_docx_input_is_rejected() {
        assert!(matches!(
            Document::from_bytes(b"plain text, not a zip"),
            Err(DocxError::Zip(_))
        ));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("readme.txt", FileOptions::default()).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(
            Document::from_bytes(&bytes),
            Err(DocxError::MissingPart(_))
        ));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", FileOptions::default()).unwrap();
        zip.write_all(b"<w:document><w:body>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(Document::from_bytes(&bytes), Err(DocxError::Xml { .. })));
    }
}
