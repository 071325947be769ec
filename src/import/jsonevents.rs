//! A small streaming JSON event reader, in the spirit of
//! [`quick_xml::Reader`]'s pull-parser model but for JSON: repeated calls to
//! [`JsonEventReader::next`] yield one [`JsonEvent`] at a time without ever
//! materializing the whole document, so a multi-gigabyte export archive
//! never has to fit in memory at once (spec.md §4.5).
//!
//! No ecosystem SAX-style JSON crate appears anywhere in the retrieval
//! pack, so this is hand-rolled rather than adapted from one.

use std::io::Read;

use crate::error::{ChatVaultError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    StartMap,
    EndMap,
    StartArray,
    EndArray,
    /// An object key, emitted before the event for its value.
    MapKey(String),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Eof,
}

/// One path segment: an object key or `"item"` for array elements, matching
/// the dotted-path convention spec.md §4.5 describes
/// (`conversations.item.MessageList.item.from`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Item,
}

/// Tracks the nesting-frame kind so `end_map`/`end_array` know what to pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

pub struct JsonEventReader<R: Read> {
    bytes: std::iter::Peekable<std::io::Bytes<R>>,
    frames: Vec<Frame>,
    path: Vec<PathSegment>,
    /// Set once we've consumed a map key and are about to read its value;
    /// cleared immediately after the value event is produced.
    pending_key: bool,
    done: bool,
}

impl<R: Read> JsonEventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes().peekable(),
            frames: Vec::new(),
            path: Vec::new(),
            pending_key: false,
            done: false,
        }
    }

    /// The current dotted path, e.g. `conversations.item.MessageList.item.from`.
    pub fn path(&self) -> String {
        self.path
            .iter()
            .map(|seg| match seg {
                PathSegment::Key(k) => k.as_str(),
                PathSegment::Item => "item",
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.bytes.peek().and_then(|r| r.as_ref().ok()).copied()
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.bytes.next() {
            None => Ok(None),
            Some(Ok(b)) => Ok(Some(b)),
            Some(Err(e)) => Err(ChatVaultError::Io(e.to_string())),
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.next_byte()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Consumes one structural byte if it matches `expected`, erroring otherwise.
    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.next_byte()? {
            Some(b) if b == expected => Ok(()),
            other => Err(ChatVaultError::Parse(format!(
                "expected '{}', found {:?}",
                expected as char, other
            ))),
        }
    }

    /// Reads the next event. Call in a loop until [`JsonEvent::Eof`].
    ///
    /// State machine: `pending_key` distinguishes "we just read an object
    /// key and must read its value next" from "we're between array
    /// elements or at a fresh top-level value."
    pub fn next(&mut self) -> Result<JsonEvent> {
        if self.done {
            return Ok(JsonEvent::Eof);
        }
        self.skip_whitespace()?;

        if let Some(&Frame::Object) = self.frames.last() {
            if !self.pending_key {
                match self.peek_byte() {
                    Some(b'}') => {
                        self.next_byte()?;
                        self.frames.pop();
                        self.path.pop();
                        if self.frames.is_empty() {
                            self.done = true;
                        }
                        return Ok(JsonEvent::EndMap);
                    }
                    Some(b',') => {
                        self.next_byte()?;
                        self.skip_whitespace()?;
                    }
                    _ => {}
                }
                let key = self.read_json_string()?;
                self.skip_whitespace()?;
                self.expect(b':')?;
                self.path.push(PathSegment::Key(key.clone()));
                self.pending_key = true;
                return Ok(JsonEvent::MapKey(key));
            }
            self.pending_key = false;
            let ev = self.read_value()?;
            if !matches!(ev, JsonEvent::StartMap | JsonEvent::StartArray) {
                self.path.pop();
            }
            return Ok(ev);
        }

        if let Some(&Frame::Array) = self.frames.last() {
            self.skip_whitespace()?;
            match self.peek_byte() {
                Some(b']') => {
                    self.next_byte()?;
                    self.frames.pop();
                    self.path.pop();
                    if self.frames.is_empty() {
                        self.done = true;
                    }
                    return Ok(JsonEvent::EndArray);
                }
                Some(b',') => {
                    self.next_byte()?;
                    self.skip_whitespace()?;
                }
                _ => {}
            }
            self.path.push(PathSegment::Item);
            let ev = self.read_value()?;
            if !matches!(ev, JsonEvent::StartMap | JsonEvent::StartArray) {
                self.path.pop();
            }
            return Ok(ev);
        }

        // Top level: exactly one value, then EOF.
        let ev = self.read_value()?;
        if matches!(ev, JsonEvent::Eof) {
            self.done = true;
        }
        Ok(ev)
    }

    fn read_value(&mut self) -> Result<JsonEvent> {
        self.skip_whitespace()?;
        match self.peek_byte() {
            None => Ok(JsonEvent::Eof),
            Some(b'{') => {
                self.next_byte()?;
                self.frames.push(Frame::Object);
                Ok(JsonEvent::StartMap)
            }
            Some(b'[') => {
                self.next_byte()?;
                self.frames.push(Frame::Array);
                Ok(JsonEvent::StartArray)
            }
            Some(b'"') => Ok(JsonEvent::String(self.read_json_string()?)),
            Some(b't') => {
                self.expect_literal("true")?;
                Ok(JsonEvent::Bool(true))
            }
            Some(b'f') => {
                self.expect_literal("false")?;
                Ok(JsonEvent::Bool(false))
            }
            Some(b'n') => {
                self.expect_literal("null")?;
                Ok(JsonEvent::Null)
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => Ok(JsonEvent::Number(self.read_number()?)),
            Some(other) => Err(ChatVaultError::Parse(format!("unexpected byte '{}'", other as char))),
        }
    }

    fn expect_literal(&mut self, lit: &str) -> Result<()> {
        for expected in lit.bytes() {
            self.expect(expected)?;
        }
        Ok(())
    }

    fn read_number(&mut self) -> Result<f64> {
        let mut buf = String::new();
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E') {
                buf.push(b as char);
                self.next_byte()?;
            } else {
                break;
            }
        }
        buf.parse::<f64>()
            .map_err(|e| ChatVaultError::Parse(format!("bad number {buf:?}: {e}")))
    }

    fn read_json_string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            match self.next_byte()? {
                None => return Err(ChatVaultError::Parse("unterminated string".into())),
                Some(b'"') => break,
                Some(b'\\') => match self.next_byte()? {
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'/') => out.push('/'),
                    Some(b'b') => out.push('\u{8}'),
                    Some(b'f') => out.push('\u{c}'),
                    Some(b'n') => out.push('\n'),
                    Some(b'r') => out.push('\r'),
                    Some(b't') => out.push('\t'),
                    Some(b'u') => {
                        let cp = self.read_hex4()?;
                        if (0xD800..=0xDBFF).contains(&cp) {
                            self.expect(b'\\')?;
                            self.expect(b'u')?;
                            let low = self.read_hex4()?;
                            let combined = 0x10000 + (cp - 0xD800) * 0x400 + (low - 0xDC00);
                            if let Some(c) = char::from_u32(combined) {
                                out.push(c);
                            }
                        } else if let Some(c) = char::from_u32(cp) {
                            out.push(c);
                        }
                    }
                    other => {
                        return Err(ChatVaultError::Parse(format!(
                            "bad escape sequence: {other:?}"
                        )))
                    }
                },
                Some(b) => {
                    // Collect a UTF-8 run rather than pushing byte-by-byte
                    // through `as char`, which would mangle anything non-ASCII.
                    let mut buf = vec![b];
                    let extra = utf8_extra_bytes(b);
                    for _ in 0..extra {
                        if let Some(nb) = self.next_byte()? {
                            buf.push(nb);
                        }
                    }
                    match std::str::from_utf8(&buf) {
                        Ok(s) => out.push_str(s),
                        Err(_) => out.push('\u{FFFD}'),
                    }
                }
            }
        }
        Ok(out)
    }

    fn read_hex4(&mut self) -> Result<u32> {
        let mut buf = String::with_capacity(4);
        for _ in 0..4 {
            if let Some(b) = self.next_byte()? {
                buf.push(b as char);
            }
        }
        u32::from_str_radix(&buf, 16).map_err(|e| ChatVaultError::Parse(format!("bad \\u escape {buf:?}: {e}")))
    }
}

fn utf8_extra_bytes(lead: u8) -> usize {
    if lead & 0xE0 == 0xC0 {
        1
    } else if lead & 0xF0 == 0xE0 {
        2
    } else if lead & 0xF8 == 0xF0 {
        3
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(json: &str) -> Vec<JsonEvent> {
        let mut reader = JsonEventReader::new(json.as_bytes());
        let mut out = Vec::new();
        loop {
            let ev = reader.next().unwrap();
            if ev == JsonEvent::Eof {
                break;
            }
            out.push(ev);
        }
        out
    }

    #[test]
    fn flat_object_emits_keys_and_values() {
        let evs = events(r#"{"a": 1, "b": "x"}"#);
        assert_eq!(
            evs,
            vec![
                JsonEvent::StartMap,
                JsonEvent::MapKey("a".into()),
                JsonEvent::Number(1.0),
                JsonEvent::MapKey("b".into()),
                JsonEvent::String("x".into()),
                JsonEvent::EndMap,
            ]
        );
    }

    #[test]
    fn nested_array_of_objects_tracks_path() {
        let mut reader = JsonEventReader::new(r#"{"conversations": [{"id": "x"}]}"#.as_bytes());
        let mut paths = Vec::new();
        loop {
            let ev = reader.next().unwrap();
            if ev == JsonEvent::Eof {
                break;
            }
            if matches!(ev, JsonEvent::String(_) | JsonEvent::MapKey(_)) {
                paths.push((reader.path(), ev));
            }
        }
        assert!(paths
            .iter()
            .any(|(p, ev)| p == "conversations.item.id" && matches!(ev, JsonEvent::String(s) if s == "x")));
    }

    #[test]
    fn escaped_string_and_unicode_escape_decode() {
        let evs = events(r#""line1\nline2 é""#);
        assert_eq!(evs, vec![JsonEvent::String("line1\nline2 é".into())]);
    }

    #[test]
    fn empty_array_and_object_round_trip() {
        let evs = events(r#"{"a": [], "b": {}}"#);
        assert_eq!(
            evs,
            vec![
                JsonEvent::StartMap,
                JsonEvent::MapKey("a".into()),
                JsonEvent::StartArray,
                JsonEvent::EndArray,
                JsonEvent::MapKey("b".into()),
                JsonEvent::StartMap,
                JsonEvent::EndMap,
                JsonEvent::EndMap,
            ]
        );
    }
}
