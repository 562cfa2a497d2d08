//! Owned XML tree and queries over it.
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element. Names are local names (namespace prefixes are dropped).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// What to do with an element during [Element::rewrite].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Keep the element and rewrite its children.
    Keep,
    /// Remove the element and its subtree.
    Remove,
    /// Replace the element and its subtree by a text node.
    Replace(String),
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check `class` among the whitespace-separated values of the `class` attribute.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(name))
    }

    /// Descendant elements (not including `self`), depth first, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// First descendant matching `predicate`.
    pub fn find<P: Fn(&Element) -> bool>(&self, predicate: P) -> Option<&Element> {
        self.descendants().find(|e| predicate(e))
    }

    /// First descendant named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Element> {
        self.find(|e| e.is(name))
    }

    /// Every descendant matching `predicate`.
    pub fn find_all<P: Fn(&Element) -> bool>(&self, predicate: P) -> Vec<&Element> {
        self.descendants().filter(|e| predicate(e)).collect()
    }

    /// Descendants named `name` that are not nested in another element named `name`.
    pub fn outermost(&self, name: &str) -> Vec<&Element> {
        fn walk<'a>(e: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
            for child in e.elements() {
                if child.is(name) {
                    found.push(child);
                } else {
                    walk(child, name, found);
                }
            }
        }

        let mut found = Vec::new();
        walk(self, name, &mut found);
        found
    }

    /// Concatenated text of the subtree.
    pub fn text(&self) -> String {
        fn walk(e: &Element, out: &mut String) {
            for child in &e.children {
                match child {
                    Node::Text(t) => out.push_str(t),
                    Node::Element(e) => walk(e, out),
                }
            }
        }

        let mut out = String::new();
        walk(self, &mut out);
        out
    }

    /// Rewrite the subtree (not including `self`) top-down.
    ///
    /// `f` sees each element before its children; removed or replaced elements are not descended into.
    pub fn rewrite<F: FnMut(&Element) -> Rewrite>(&mut self, f: &mut F) {
        let children = std::mem::take(&mut self.children);
        self.children.reserve(children.len());
        for child in children {
            match child {
                Node::Text(t) => self.children.push(Node::Text(t)),
                Node::Element(mut e) => match f(&e) {
                    Rewrite::Keep => {
                        e.rewrite(f);
                        self.children.push(Node::Element(e));
                    }
                    Rewrite::Remove => (),
                    Rewrite::Replace(text) => self.children.push(Node::Text(text)),
                },
            }
        }
    }
}

/// Depth-first iterator over descendants, see [Element::descendants].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.stack.pop()?;
        let position = self.stack.len();
        self.stack.extend(e.elements());
        self.stack[position..].reverse();
        Some(e)
    }
}

fn element_from(start: &BytesStart) -> Result<Element, Error> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

/// Parse a full XML document and return its root element.
pub fn parse(xml: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    // attach a finished element to its parent, or make it the root
    fn close(stack: &mut [Element], root: &mut Option<Element>, e: Element) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(e)),
            None => {
                if root.is_none() {
                    *root = Some(e);
                }
            }
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => stack.push(element_from(e)?),
            Event::Empty(ref e) => {
                let e = element_from(e)?;
                close(&mut stack, &mut root, e);
            }
            Event::End(_) => {
                if let Some(e) = stack.pop() {
                    close(&mut stack, &mut root, e);
                }
            }
            Event::Text(ref t) => {
                if let Some(parent) = stack.last_mut() {
                    let text = match t.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(e) => {
                            debug!("keeping escaped text: {}", e);
                            String::from_utf8_lossy(t.as_ref()).into_owned()
                        }
                    };
                    parent.children.push(Node::Text(text));
                }
            }
            Event::CData(ref t) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Text(String::from_utf8_lossy(t.as_ref()).into_owned()));
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }

    root.ok_or_else(|| Error::Custom("no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<document xmlns="http://dlmf.nist.gov/LaTeXML">
  <title>T</title>
  <section xml:id="S1"><title>Intro</title><para><p>Hello &amp; <emph>world</emph></p></para>
    <section><p>nested</p></section>
  </section>
  <section class="ltx_a ltx_b"><p>Second</p></section>
  <bibliography/>
</document>"#;

    #[test]
    fn parse_tree() {
        let root = parse(DOC).unwrap();
        assert_eq!(root.name, "document");
        assert_eq!(root.elements().count(), 4);
        assert_eq!(root.child("title").unwrap().text(), "T");
        assert!(root.child("bibliography").is_some());

        let p = root.find_by_name("p").unwrap();
        assert_eq!(p.text(), "Hello & world");

        let first = root.child("section").unwrap();
        assert_eq!(first.attr("id"), Some("S1"));
    }

    #[test]
    fn descendants_in_document_order() {
        let root = parse(DOC).unwrap();
        let ps: Vec<String> = root
            .find_all(|e| e.is("p"))
            .into_iter()
            .map(|e| e.text())
            .collect();
        assert_eq!(ps, vec!["Hello & world", "nested", "Second"]);
    }

    #[test]
    fn outermost_sections() {
        let root = parse(DOC).unwrap();
        let sections = root.outermost("section");
        assert_eq!(sections.len(), 2);
        assert!(sections[1].has_class("ltx_b"));
        assert!(!sections[1].has_class("ltx"));
        assert_eq!(root.find_all(|e| e.is("section")).len(), 3);
    }

    #[test]
    fn rewrite_subtree() {
        let mut root = parse(r#"<a>x<b>y<c/></b><d>z</d><e>w</e></a>"#).unwrap();
        let mut seen = Vec::new();
        root.rewrite(&mut |e: &Element| {
            seen.push(e.name.clone());
            match e.name.as_str() {
                "b" => Rewrite::Remove,
                "d" => Rewrite::Replace("Z".to_string()),
                _ => Rewrite::Keep,
            }
        });
        assert_eq!(root.text(), "xZw");
        // removed subtrees are not visited
        assert_eq!(seen, vec!["b", "d", "e"]);
    }

    #[test]
    fn no_root() {
        assert!(parse("").is_err());
    }
}
