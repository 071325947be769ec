//! Plaintext rendering of a message DOM, ported from
//! `skypedata.py::MessageParser.dom_to_text`.

use crate::parser::dom::DomNode;

/// Recursively renders `dom` as a plaintext string: quotes get a leading
/// `"`, `<quotefrom>` gets its own CRLF-delimited line, `<msgstatus>` is
/// bracketed, `<at>` gets an `@` prefix, and `<i>`/`<b>`/`<s>` get
/// markdown-ish delimiters unless the DOM carries an explicit `raw_pre`/
/// `raw_post` override.
pub fn dom_to_text(dom: &DomNode) -> String {
    let mut text = dom.text.clone().unwrap_or_default();
    let mut tail = dom.tail.clone().unwrap_or_default();

    match dom.tag.as_str() {
        "quote" => text = format!("\"{text}"),
        "quotefrom" => text = format!("\"\r\n{text}\r\n"),
        "msgstatus" => text = format!("[{}]\r\n", text.trim()),
        "at" if !text.is_empty() && !text.starts_with('@') => text = format!("@{text}"),
        "i" | "b" | "s" => {
            let default_delim = match dom.tag.as_str() {
                "i" => "_",
                "b" => "*",
                _ => "~",
            };
            let pre = dom.get_attr("raw_pre").unwrap_or(default_delim);
            let post = dom.get_attr("raw_post").unwrap_or(default_delim);
            text = format!("{pre}{text}");
            tail = format!("{post}{tail}");
        }
        _ => {}
    }

    let mut out = text;
    for child in &dom.children {
        out.push_str(&dom_to_text(child));
    }
    out.push_str(&tail);
    out
}

/// Wraps `text` to `width` columns per line (long words and hyphens are
/// never broken, matching `textwrap.TextWrapper`'s original settings), then
/// forces DOS line endings the way `parse()`'s `"wrap"` output option does.
pub fn wrap_dos(text: &str, width: usize) -> String {
    let mut out_lines = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            out_lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in line.split(' ') {
            let extra = if current.is_empty() { 0 } else { 1 };
            if current.len() + extra + word.len() > width && !current.is_empty() {
                out_lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out_lines.push(current);
    }
    out_lines.join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::make_xml;

    #[test]
    fn quote_gets_leading_quote_mark() {
        let mut quote = DomNode::new("quote");
        quote.text = Some("hi".to_string());
        assert_eq!(dom_to_text(&quote), "\"hi");
    }

    #[test]
    fn at_tag_gets_at_prefix() {
        let mut at = DomNode::new("at");
        at.text = Some("bob".to_string());
        assert_eq!(dom_to_text(&at), "@bob");
    }

    #[test]
    fn bold_tag_wraps_with_asterisks() {
        let dom = make_xml("plain <b>bold</b> text");
        assert_eq!(dom_to_text(&dom), "plain *bold* text");
    }
}
