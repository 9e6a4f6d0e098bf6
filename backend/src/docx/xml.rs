//! Lossless element tree over quick-xml events.
//!
//! Only elements are structured; everything else (declarations, comments,
//! processing instructions, CDATA) is carried as the raw event so a parsed
//! part writes back byte-compatible apart from the nodes we touch.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

#[derive(Clone, Debug)]
pub enum Node {
    Element(Element),
    Text(BytesText<'static>),
    Other(Event<'static>),
}

#[derive(Clone, Debug)]
pub struct Element {
    pub start: BytesStart<'static>,
    pub children: Vec<Node>,
    /// Written as `<name/>` while it has no children.
    pub empty: bool,
}

impl Element {
    pub fn new(name: &str) -> Element {
        Element {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
            empty: false,
        }
    }

    pub fn is(&self, qname: &str) -> bool {
        self.start.name().as_ref() == qname.as_bytes()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, qname: &str) -> Option<&Element> {
        self.elements().find(|el| el.is(qname))
    }

    pub fn child_mut(&mut self, qname: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.is(qname))
    }

    /// Value of an attribute, unescaped. Malformed attributes read as absent.
    pub fn attribute(&self, qname: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == qname.as_bytes())
            .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
    }

    /// Concatenated character data of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) => {
                    if let Ok(s) = t.unescape() {
                        out.push_str(&s);
                    }
                }
                Node::Other(Event::CData(c)) => {
                    out.push_str(&String::from_utf8_lossy(c.as_ref()));
                }
                _ => {}
            }
        }
        out
    }

    pub fn push_text(&mut self, text: &str) {
        self.children
            .push(Node::Text(BytesText::new(text).into_owned()));
        self.empty = false;
    }

    pub fn push_element(&mut self, el: Element) {
        self.children.push(Node::Element(el));
        self.empty = false;
    }
}

/// Parses a whole part into its top-level nodes.
pub fn parse(data: &[u8]) -> Result<Vec<Node>, quick_xml::Error> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        let node = match event {
            Event::Eof => break,
            Event::Start(start) => {
                stack.push(Element {
                    start,
                    children: Vec::new(),
                    empty: false,
                });
                buf.clear();
                continue;
            }
            Event::End(_) => match stack.pop() {
                Some(el) => Node::Element(el),
                None => {
                    return Err(quick_xml::Error::UnexpectedEof(
                        "closing tag without opening tag".to_string(),
                    ))
                }
            },
            Event::Empty(start) => Node::Element(Element {
                start,
                children: Vec::new(),
                empty: true,
            }),
            Event::Text(text) => {
                text.unescape()?;
                Node::Text(text)
            }
            other => Node::Other(other),
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(quick_xml::Error::UnexpectedEof(format!(
            "unclosed element {}",
            String::from_utf8_lossy(open.start.name().as_ref())
        )));
    }
    Ok(roots)
}

pub fn write(nodes: &[Node]) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());
    for node in nodes {
        write_node(&mut writer, node)?;
    }
    Ok(writer.into_inner())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), quick_xml::Error> {
    match node {
        Node::Element(el) if el.empty && el.children.is_empty() => {
            writer.write_event(Event::Empty(el.start.clone()))?;
        }
        Node::Element(el) => {
            writer.write_event(Event::Start(el.start.clone()))?;
            for child in &el.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(el.start.to_end()))?;
        }
        Node::Text(text) => writer.write_event(Event::Text(text.clone()))?,
        Node::Other(event) => writer.write_event(event.clone())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><!-- note --><w:body><w:p><w:r><w:t xml:space="preserve">a &amp; b</w:t></w:r><w:r><w:br/></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn untouched_tree_writes_back_identically() {
        let nodes = parse(SAMPLE.as_bytes()).unwrap();
        let out = write(&nodes).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), SAMPLE);
    }

    #[test]
    fn text_is_unescaped_and_attributes_are_readable() {
        let nodes = parse(SAMPLE.as_bytes()).unwrap();
        let doc = nodes
            .iter()
            .find_map(|n| match n {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .unwrap();
        let t = doc
            .child("w:body")
            .and_then(|b| b.child("w:p"))
            .and_then(|p| p.child("w:r"))
            .and_then(|r| r.child("w:t"))
            .unwrap();
        assert_eq!(t.text(), "a & b");
        assert_eq!(t.attribute("xml:space").as_deref(), Some("preserve"));
    }

    #[test]
    fn pushed_text_is_escaped_on_write() {
        let mut t = Element::new("w:t");
        t.push_text("<x> & y");
        let out = write(&[Node::Element(t)]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<w:t>&lt;x&gt; &amp; y</w:t>");
    }

    #[test]
    fn unbalanced_markup_is_rejected() {
        assert!(parse(b"<w:document><w:body></w:document>").is_err());
        assert!(parse(b"<w:document><w:body>").is_err());
    }
}
