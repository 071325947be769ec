//! The message-body DOM: a small ElementTree-shaped tree (tag, attributes,
//! `text`, `tail`, children) built by parsing the stored `body_xml`, mutated
//! in place by [`crate::parser::rewrite`] and finally rendered by
//! [`crate::parser::render_html`]/[`crate::parser::render_text`].
//!
//! Grounded on `skypedata.py::MessageParser.make_xml`'s three-tier fallback:
//! parse as XML; if that fails, escape bare `&` and retry; if that still
//! fails, fall back to a single text node holding the raw body.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

pub const ROOT_TAG: &str = "xml";

#[derive(Debug, Clone, Default)]
pub struct DomNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(pair) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            pair.1 = value;
        } else {
            self.attrs.push((key.to_string(), value));
        }
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
        self.text = None;
        self.tail = self.tail.take();
        self.children.clear();
    }

    /// Depth-first iterator over every descendant tag equal to `tag`.
    pub fn iter_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DomNode> + 'a {
        self.iter_all().filter(move |n| n.tag == tag)
    }

    pub fn iter_all(&self) -> DomIter<'_> {
        DomIter { stack: vec![self] }
    }

    pub fn find(&self, tag: &str) -> Option<&DomNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut DomNode> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    /// Concatenated text of this node and every descendant, ElementTree's
    /// `"".join(x.itertext())` equivalent.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        if let Some(t) = &self.text {
            out.push_str(t);
        }
        for child in &self.children {
            out.push_str(&child.all_text());
            if let Some(t) = &child.tail {
                out.push_str(t);
            }
        }
        out
    }
}

pub struct DomIter<'a> {
    stack: Vec<&'a DomNode>,
}

impl<'a> Iterator for DomIter<'a> {
    type Item = &'a DomNode;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Escapes XML-unsafe control bytes the way `SAFEBYTE_RGX`/`SAFEBYTE_REPL`
/// do, turning e.g. `\x01` into the literal four characters `\x01`.
fn escape_control_bytes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let b = c as u32;
        let is_unsafe = matches!(b, 0x00..=0x08 | 0x0B..=0x0C | 0x0E..=0x1F | 0x7F);
        if is_unsafe {
            out.push_str(&format!("\\x{b:02x}"));
        } else {
            out.push(c);
        }
    }
    out
}

fn try_parse(xml: &str) -> Option<DomNode> {
    let wrapped = format!("<{ROOT_TAG}>{xml}</{ROOT_TAG}>");
    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    let mut root = DomNode::new(ROOT_TAG);
    let mut stack: Vec<DomNode> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                stack.push(node_from_start(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let node = node_from_start(&e)?;
                attach_child(&mut stack, &mut root, node);
            }
            Ok(Event::End(_)) => {
                let node = stack.pop()?;
                attach_child(&mut stack, &mut root, node);
            }
            Ok(Event::Text(t)) | Ok(Event::CData(t)) => {
                let text = t.unescape().ok()?.into_owned();
                append_text(&mut stack, &mut root, text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
        buf.clear();
    }
    if !stack.is_empty() {
        return None;
    }
    Some(root)
}

fn node_from_start(e: &BytesStart) -> Option<DomNode> {
    let tag = String::from_utf8(e.name().as_ref().to_vec()).ok()?;
    let mut node = DomNode::new(tag);
    for attr in e.attributes().flatten() {
        let key = String::from_utf8(attr.key.as_ref().to_vec()).ok()?;
        let value = attr.unescape_value().ok()?.into_owned();
        node.attrs.push((key, value));
    }
    Some(node)
}

fn attach_child(stack: &mut [DomNode], root: &mut DomNode, child: DomNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
    } else {
        root.children.push(child);
    }
}

fn append_text(stack: &mut [DomNode], root: &mut DomNode, text: String) {
    let target = stack.last_mut().unwrap_or(root);
    match target.children.last_mut() {
        Some(last_child) => {
            let tail = last_child.tail.get_or_insert_with(String::new);
            tail.push_str(&text);
        }
        None => {
            let buf = target.text.get_or_insert_with(String::new);
            buf.push_str(&text);
        }
    }
}

/// Parses `text` into a DOM rooted at `<xml>`, trying three fallbacks in
/// order: as-is; with unsafe control bytes escaped; with bare `&` escaped
/// to `&amp;`; and finally a single unparsed text node.
pub fn make_xml(text: &str) -> DomNode {
    if let Some(dom) = try_parse(text) {
        return dom;
    }
    let safe = escape_control_bytes(text);
    if let Some(dom) = try_parse(&safe) {
        return dom;
    }
    let amp_escaped = safe.replace('&', "&amp;");
    if let Some(dom) = try_parse(&amp_escaped) {
        return dom;
    }
    let mut root = DomNode::new(ROOT_TAG);
    root.text = Some(text.to_string());
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_element() {
        let dom = make_xml("hello <b>world</b>!");
        assert_eq!(dom.text.as_deref(), Some("hello "));
        assert_eq!(dom.children.len(), 1);
        assert_eq!(dom.children[0].tag, "b");
        assert_eq!(dom.children[0].text.as_deref(), Some("world"));
        assert_eq!(dom.children[0].tail.as_deref(), Some("!"));
    }

    #[test]
    fn falls_back_to_text_node_on_bare_ampersand() {
        let dom = make_xml("Tom & Jerry");
        assert_eq!(dom.all_text(), "Tom & Jerry");
    }

    #[test]
    fn falls_back_on_unclosed_tag() {
        let dom = make_xml("broken <b text without close");
        assert!(dom.all_text().contains("broken"));
    }
}
