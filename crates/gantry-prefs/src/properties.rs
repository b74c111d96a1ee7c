//! A minimal codec for Java `.properties`-style preference files.
//!
//! The goal is round-tripping the `.settings/<node>.prefs` files Gantry
//! writes, not full java.util.Properties compatibility: `#`/`!` comments,
//! `=`/`:`/whitespace separators, backslash line continuations, and the
//! standard escapes.

use std::collections::BTreeMap;

/// Parse properties text into key/value entries. Later duplicates win.
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let bytes = text.as_bytes();
    let mut offset = 0usize;
    let mut entries = BTreeMap::new();

    while offset < bytes.len() {
        let line_start = offset;
        let logical = read_logical_line(bytes, &mut offset);
        if let Some((key, value)) = parse_logical_line(&logical) {
            entries.insert(key, value);
        }

        // Ensure we always make progress even on pathological inputs.
        if offset == line_start {
            offset += 1;
        }
    }

    entries
}

/// Serialize entries to properties text, keys in sorted order.
pub fn serialize(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

fn read_logical_line(bytes: &[u8], offset: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();

    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < bytes.len() && bytes[line_end] != b'\n' {
            line_end += 1;
        }

        let mut content_end = line_end;
        if content_end > segment_start && bytes[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        // Does the physical line end with an unescaped `\`?
        let continues = ends_with_unescaped_backslash(&bytes[segment_start..content_end]);
        let copy_end = if continues {
            content_end.saturating_sub(1)
        } else {
            content_end
        };
        out.extend_from_slice(&bytes[segment_start..copy_end]);

        // Consume the newline if present.
        *offset = if line_end < bytes.len() {
            line_end + 1
        } else {
            line_end
        };

        if !continues {
            break;
        }

        // Continuation: skip leading whitespace on the next physical line.
        while *offset < bytes.len() {
            match bytes[*offset] {
                b' ' | b'\t' | b'\x0C' => *offset += 1,
                _ => break,
            }
        }
    }

    out
}

fn ends_with_unescaped_backslash(line: &[u8]) -> bool {
    let mut backslashes = 0usize;
    for &b in line.iter().rev() {
        if b == b'\\' {
            backslashes += 1;
        } else {
            break;
        }
    }
    backslashes % 2 == 1
}

fn parse_logical_line(line: &[u8]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    if i >= line.len() || line[i] == b'#' || line[i] == b'!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            b'\\' => i += 2,
            b'=' | b':' => break,
            b if is_whitespace(b) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }
    if i < line.len() && (line[i] == b'=' || line[i] == b':') {
        i += 1;
    }
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    let key = unescape(&line[key_start..key_end]);
    let value = unescape(&line[i..]);
    Some((key, value))
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0C')
}

fn unescape(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            push_raw_byte(&mut out, bytes, &mut i);
            continue;
        }

        i += 1;
        if i >= bytes.len() {
            out.push('\\');
            break;
        }

        match bytes[i] {
            b't' => out.push('\t'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b'f' => out.push('\x0C'),
            b'\\' => out.push('\\'),
            b'u' => {
                if i + 4 < bytes.len() {
                    let mut value = 0u32;
                    for j in 1..=4 {
                        value <<= 4;
                        value |= u32::from(from_hex(bytes[i + j]));
                    }
                    if let Some(ch) = char::from_u32(value) {
                        out.push(ch);
                        i += 4;
                    }
                } else {
                    out.push('u');
                }
                i += 1;
                continue;
            }
            other => out.push(other as char),
        }
        i += 1;
    }

    out
}

// Copies one UTF-8 scalar starting at `*i`, advancing past it.
fn push_raw_byte(out: &mut String, bytes: &[u8], i: &mut usize) {
    let b = bytes[*i];
    if b.is_ascii() {
        out.push(b as char);
        *i += 1;
        return;
    }
    let len = match b {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    };
    let end = (*i + len).min(bytes.len());
    match std::str::from_utf8(&bytes[*i..end]) {
        Ok(s) => out.push_str(s),
        Err(_) => out.push(char::REPLACEMENT_CHARACTER),
    }
    *i = end;
}

fn from_hex(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + (b - b'a'),
        b'A'..=b'F' => 10 + (b - b'A'),
        _ => 0,
    }
}

fn escape_into(out: &mut String, text: &str, escape_spaces: bool) {
    for (idx, ch) in text.chars().enumerate() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            ' ' if escape_spaces || idx == 0 => {
                out.push('\\');
                out.push(' ');
            }
            ch if (ch as u32) < 0x20 || (ch as u32) > 0x7E => {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf).iter() {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
            ch => out.push(ch),
        }
    }
}
