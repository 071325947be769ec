//! HTML rendering of a message DOM, ported from
//! `skypedata.py::MessageParser.dom_to_html`'s tag-rewrite pass. The
//! original's presentation-layer concerns (CSS-styled quote subtables via
//! `step.Template`, shared-media download/embedding) are templating and GUI
//! shell work and are out of scope here; this renders the same semantic
//! rewrite (quote footers, emoticon spans, grey status text, `@mentions`,
//! link targets) into plain HTML tags a caller can style itself.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::parser::dom::DomNode;
use crate::parser::emoticons::EMOTICON_DATA;

const PASSTHROUGH_TAGS: &[&str] = &["blink", "font", "span", "table", "tr", "td", "br"];
const URL_SAFE: &AsciiSet = &CONTROLS.remove(b':').remove(b'/').remove(b'=').remove(b'?').remove(b'&').remove(b'#');

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlOptions {
    pub export: bool,
}

/// Renders `dom` as an HTML fragment (without an enclosing root tag).
/// Mutating tag rewrite and serialization happen in one pass over a clone,
/// leaving the caller's (cached) DOM untouched — mirroring the original's
/// `copy.deepcopy(dom)` before HTML-specific mutation.
pub fn dom_to_html(dom: &DomNode, opts: HtmlOptions) -> String {
    let mut work = dom.clone();
    rewrite_for_html(&mut work, opts);
    let mut out = String::new();
    serialize_children(&work, &mut out);
    out.replace('\n', "<br />")
}

fn rewrite_for_html(node: &mut DomNode, opts: HtmlOptions) {
    let mut i = 0;
    while i < node.children.len() {
        let keep = rewrite_one(&mut node.children[i], opts);
        if !keep {
            node.children.remove(i);
            continue;
        }
        rewrite_for_html(&mut node.children[i], opts);
        i += 1;
    }
}

/// Rewrites a single child element in place; returns `false` if the element
/// should be dropped entirely (an unknown, empty tag).
fn rewrite_one(elem: &mut DomNode, opts: HtmlOptions) -> bool {
    match elem.tag.as_str() {
        "quote" => {
            let footer = elem
                .find("quotefrom")
                .and_then(|q| q.text.clone())
                .unwrap_or_default();
            elem.children.retain(|c| c.tag != "quotefrom");
            elem.tag = "blockquote".to_string();
            if !footer.is_empty() {
                let mut cite = DomNode::new("cite");
                cite.text = Some(footer);
                elem.children.insert(0, cite);
            }
            true
        }
        "ss" => {
            let emot_type = elem.get_attr("type").map(str::to_string);
            let text = elem.text.clone();
            let tail = elem.tail.clone();
            elem.tag = "span".to_string();
            elem.attrs.clear();
            elem.text = text;
            elem.tail = tail;
            if opts.export {
                if let Some(data) = emot_type.as_deref().and_then(emoticon_by_name) {
                    let mut title = data.1.to_string();
                    if data.2.first() != Some(&data.1) {
                        title.push(' ');
                        title.push_str(data.2[0]);
                    }
                    elem.set_attr("title", title);
                    elem.set_attr("class", format!("emoticon {}", data.0));
                }
            }
            true
        }
        "msgstatus" | "bodystatus" => {
            elem.tag = "span".to_string();
            elem.set_attr("class", "gray");
            elem.tail = Some(format!(" {}", elem.tail.clone().unwrap_or_default()));
            true
        }
        "b" | "i" | "s" => {
            elem.attrs.clear();
            true
        }
        "at" => {
            elem.tag = "b".to_string();
            if let Some(text) = &elem.text {
                if !text.starts_with('@') {
                    elem.text = Some(format!("@{text}"));
                }
            }
            true
        }
        "a" => {
            elem.set_attr("target", "_blank");
            if opts.export {
                if let Some(href) = elem.get_attr("href") {
                    let decoded = percent_decode_str(href).decode_utf8_lossy().into_owned();
                    let requoted = utf8_percent_encode(&decoded, URL_SAFE).to_string();
                    elem.set_attr("href", requoted);
                }
            }
            true
        }
        tag if PASSTHROUGH_TAGS.contains(&tag) => true,
        _ => {
            let is_empty = elem.text.as_deref().unwrap_or("").is_empty()
                && elem.tail.as_deref().unwrap_or("").is_empty()
                && elem.children.is_empty();
            if is_empty {
                false
            } else {
                elem.tag = "span".to_string();
                elem.attrs.clear();
                true
            }
        }
    }
}

fn emoticon_by_name(name: &str) -> Option<(&'static str, &'static str, &'static [&'static str])> {
    EMOTICON_DATA.iter().find(|(n, _, _)| *n == name).copied()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn serialize_children(node: &DomNode, out: &mut String) {
    if let Some(text) = &node.text {
        out.push_str(&escape_text(text));
    }
    for child in &node.children {
        serialize_node(child, out);
    }
}

fn serialize_node(node: &DomNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.tag);
    for (k, v) in &node.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_text(v));
        out.push('"');
    }
    out.push('>');
    serialize_children(node, out);
    out.push_str("</");
    out.push_str(&node.tag);
    out.push('>');
    if let Some(tail) = &node.tail {
        out.push_str(&escape_text(tail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::make_xml;

    #[test]
    fn renders_bold_emphasis() {
        let dom = make_xml("hello <b>world</b>!");
        let html = dom_to_html(&dom, HtmlOptions::default());
        assert_eq!(html, "hello <b>world</b>!");
    }

    #[test]
    fn at_tag_becomes_bold_with_at_prefix() {
        let mut dom = DomNode::new("xml");
        let mut at = DomNode::new("at");
        at.text = Some("bob".to_string());
        dom.children.push(at);
        let html = dom_to_html(&dom, HtmlOptions::default());
        assert_eq!(html, "<b>@bob</b>");
    }

    #[test]
    fn unknown_empty_tag_is_dropped() {
        let mut dom = DomNode::new("xml");
        dom.children.push(DomNode::new("weirdtag"));
        let html = dom_to_html(&dom, HtmlOptions::default());
        assert_eq!(html, "");
    }

    #[test]
    fn link_gets_blank_target() {
        let mut dom = DomNode::new("xml");
        let mut a = DomNode::new("a");
        a.set_attr("href", "https://example.com");
        a.text = Some("example".to_string());
        dom.children.push(a);
        let html = dom_to_html(&dom, HtmlOptions::default());
        assert!(html.contains("target=\"_blank\""));
    }
}
