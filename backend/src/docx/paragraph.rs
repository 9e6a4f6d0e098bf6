//! WordprocessingML paragraph handling: locating paragraphs in a story,
//! reading their text and rewriting it.

use super::xml::{Element, Node};

const PARAGRAPH: &str = "w:p";
const RUN: &str = "w:r";
const RUN_PROPS: &str = "w:rPr";
const TEXT: &str = "w:t";
const TABLE: &str = "w:tbl";
const ROW: &str = "w:tr";
const CELL: &str = "w:tc";
const SDT: &str = "w:sdt";
const SDT_CONTENT: &str = "w:sdtContent";

/// Inline wrappers whose runs still belong to the enclosing paragraph.
const RUN_WRAPPERS: [&str; 7] = [
    "w:hyperlink",
    "w:ins",
    "w:smartTag",
    "w:fldSimple",
    "w:customXml",
    SDT,
    SDT_CONTENT,
];

/// A run of text with the two character properties the PDF renderer keeps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunText {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Collects the paragraphs of a block container: its own paragraphs
/// first, then the paragraphs of its tables row by row, cell by cell.
pub fn collect<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    collect_paragraphs(container, out);
    collect_tables(container, out);
}

fn collect_paragraphs<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for child in container.elements() {
        if child.is(PARAGRAPH) {
            out.push(child);
        } else if child.is(SDT) {
            if let Some(content) = child.child(SDT_CONTENT) {
                collect_paragraphs(content, out);
            }
        }
    }
}

fn collect_tables<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for child in container.elements() {
        if child.is(TABLE) {
            for row in child.elements().filter(|el| el.is(ROW)) {
                for cell in row.elements().filter(|el| el.is(CELL)) {
                    collect(cell, out);
                }
            }
        } else if child.is(SDT) {
            if let Some(content) = child.child(SDT_CONTENT) {
                collect_tables(content, out);
            }
        }
    }
}

/// Collects the paragraphs of a block container as they are laid out on the
/// page: a table's cells come between the paragraphs around it.
pub fn collect_in_reading_order<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for child in container.elements() {
        if child.is(PARAGRAPH) {
            out.push(child);
        } else if child.is(TABLE) {
            for row in child.elements().filter(|el| el.is(ROW)) {
                for cell in row.elements().filter(|el| el.is(CELL)) {
                    collect_in_reading_order(cell, out);
                }
            }
        } else if child.is(SDT) {
            if let Some(content) = child.child(SDT_CONTENT) {
                collect_in_reading_order(content, out);
            }
        }
    }
}

/// Mutable counterpart of [`collect`], visiting in the same order.
pub fn visit_mut<F: FnMut(&mut Element)>(container: &mut Element, f: &mut F) {
    visit_paragraphs_mut(container, f);
    visit_tables_mut(container, f);
}

fn visit_paragraphs_mut<F: FnMut(&mut Element)>(container: &mut Element, f: &mut F) {
    for child in container.elements_mut() {
        if child.is(PARAGRAPH) {
            f(child);
        } else if child.is(SDT) {
            if let Some(content) = child.child_mut(SDT_CONTENT) {
                visit_paragraphs_mut(content, f);
            }
        }
    }
}

fn visit_tables_mut<F: FnMut(&mut Element)>(container: &mut Element, f: &mut F) {
    for child in container.elements_mut() {
        if child.is(TABLE) {
            for row in child.elements_mut().filter(|el| el.is(ROW)) {
                for cell in row.elements_mut().filter(|el| el.is(CELL)) {
                    visit_mut(cell, f);
                }
            }
        } else if child.is(SDT) {
            if let Some(content) = child.child_mut(SDT_CONTENT) {
                visit_tables_mut(content, f);
            }
        }
    }
}

fn runs<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for child in container.elements() {
        if child.is(RUN) {
            out.push(child);
        } else if RUN_WRAPPERS.iter().any(|name| child.is(name)) {
            runs(child, out);
        }
    }
}

fn run_text(run: &Element) -> String {
    run.elements()
        .filter(|el| el.is(TEXT))
        .map(Element::text)
        .collect()
}

pub fn text(paragraph: &Element) -> String {
    let mut found = Vec::new();
    runs(paragraph, &mut found);
    found.into_iter().map(run_text).collect()
}

fn toggled(props: Option<&Element>, name: &str) -> bool {
    props
        .and_then(|p| p.child(name))
        .map(|el| !matches!(el.attribute("w:val").as_deref(), Some("0" | "false" | "off")))
        .unwrap_or(false)
}

pub fn run_texts(paragraph: &Element) -> Vec<RunText> {
    let mut found = Vec::new();
    runs(paragraph, &mut found);
    found
        .into_iter()
        .filter_map(|run| {
            let text = run_text(run);
            if text.is_empty() {
                return None;
            }
            let props = run.child(RUN_PROPS);
            Some(RunText {
                text,
                bold: toggled(props, "w:b"),
                italic: toggled(props, "w:i"),
            })
        })
        .collect()
}

fn has_text(el: &Element) -> bool {
    if el.is(RUN) {
        return el.elements().any(|c| c.is(TEXT));
    }
    RUN_WRAPPERS.iter().any(|name| el.is(name)) && el.elements().any(has_text)
}

fn first_text_props(container: &Element) -> Option<Element> {
    let mut found = Vec::new();
    runs(container, &mut found);
    found
        .iter()
        .find(|run| run.elements().any(|c| c.is(TEXT)))
        .or_else(|| found.first())
        .and_then(|run| run.child(RUN_PROPS).cloned())
}

fn clear_text(container: &mut Element) {
    for child in container.elements_mut() {
        if child.is(RUN) {
            child
                .children
                .retain(|node| !matches!(node, Node::Element(el) if el.is(TEXT)));
        } else if RUN_WRAPPERS.iter().any(|name| child.is(name)) {
            clear_text(child);
        }
    }
}

/// Replaces the paragraph's text with `new_text` held in a single run.
///
/// Every `w:t` is removed; runs keep their other content (tabs, breaks,
/// drawings). The new run takes the properties of the first text run and
/// sits where the first text-bearing child was.
pub fn rewrite(paragraph: &mut Element, new_text: &str) {
    let props = first_text_props(paragraph);
    let position = paragraph.children.iter().position(|node| match node {
        Node::Element(el) => has_text(el),
        _ => false,
    });

    clear_text(paragraph);

    let mut run = Element::new(RUN);
    if let Some(props) = props {
        run.push_element(props);
    }
    let mut t = Element::new(TEXT);
    t.start.push_attribute(("xml:space", "preserve"));
    t.push_text(new_text);
    run.push_element(t);

    match position {
        Some(index) => paragraph.children.insert(index, Node::Element(run)),
        None => paragraph.children.push(Node::Element(run)),
    }
    paragraph.empty = false;
}
