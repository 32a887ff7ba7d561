use std::borrow::Cow;

use crate::error::{SyncError, SyncResult};

/// Nesting bound shared with the binary decoder.
const DEPTH_LIMIT: usize = 200;

// -----------------------------------------------------------------------------
// Nodes

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Object,
    Array,
    Key,
    String,
    Number,
    Bool,
    Null,
}

/// One token of the flat parse. There is no tree: a container's subtree is
/// the `span` nodes starting at the container itself, so skipping a value is
/// an index add and walking members is pointer arithmetic over the vector.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Byte offset of the token's first character.
    pub start: usize,
    /// Byte offset one past the token (past the closing bracket/quote).
    pub end: usize,
    /// Node count of the whole subtree, including this node.
    pub span: usize,
    /// Members (objects) or elements (arrays); 0 for scalars and keys.
    pub count: usize,
}

fn err(detail: impl Into<Cow<'static, str>>, offset: usize) -> SyncError {
    SyncError::MalformedJson {
        detail: detail.into(),
        offset,
        path: String::from("(root)"),
    }
}

// -----------------------------------------------------------------------------
// Tokenizer

/// Parses a complete JSON document into `nodes` in a single pass. The
/// vector is cleared first and may be reused across documents.
pub(crate) fn tokenize(text: &str, nodes: &mut Vec<Node>) -> SyncResult<()> {
    nodes.clear();
    let bytes = text.as_bytes();
    let mut pos = 0;
    skip_ws(bytes, &mut pos);
    parse_value(bytes, &mut pos, nodes, 0)?;
    skip_ws(bytes, &mut pos);
    if pos != bytes.len() {
        return Err(err("trailing characters after the document", pos));
    }
    Ok(())
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while let Some(b) = bytes.get(*pos) {
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => *pos += 1,
            _ => break,
        }
    }
}

fn parse_value(
    bytes: &[u8],
    pos: &mut usize,
    nodes: &mut Vec<Node>,
    depth: usize,
) -> SyncResult<()> {
    if depth > DEPTH_LIMIT {
        return Err(err("nesting depth limit exceeded", *pos));
    }
    match bytes.get(*pos) {
        Some(b'{') => parse_object(bytes, pos, nodes, depth),
        Some(b'[') => parse_array(bytes, pos, nodes, depth),
        Some(b'"') => {
            let start = *pos;
            let end = scan_string(bytes, pos)?;
            nodes.push(Node {
                kind: NodeKind::String,
                start,
                end,
                span: 1,
                count: 0,
            });
            Ok(())
        }
        Some(b't') => parse_literal(bytes, pos, nodes, b"true", NodeKind::Bool),
        Some(b'f') => parse_literal(bytes, pos, nodes, b"false", NodeKind::Bool),
        Some(b'n') => parse_literal(bytes, pos, nodes, b"null", NodeKind::Null),
        Some(b'-' | b'0'..=b'9') => parse_number(bytes, pos, nodes),
        Some(_) => Err(err("unexpected character", *pos)),
        None => Err(err("unexpected end of document", *pos)),
    }
}

fn parse_object(
    bytes: &[u8],
    pos: &mut usize,
    nodes: &mut Vec<Node>,
    depth: usize,
) -> SyncResult<()> {
    let start = *pos;
    *pos += 1;
    let index = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Object,
        start,
        end: 0,
        span: 0,
        count: 0,
    });
    let mut count = 0;
    skip_ws(bytes, pos);
    if bytes.get(*pos) != Some(&b'}') {
        loop {
            skip_ws(bytes, pos);
            if bytes.get(*pos) != Some(&b'"') {
                return Err(err("expected a member key", *pos));
            }
            let key_start = *pos;
            let key_end = scan_string(bytes, pos)?;
            nodes.push(Node {
                kind: NodeKind::Key,
                start: key_start,
                end: key_end,
                span: 1,
                count: 0,
            });
            skip_ws(bytes, pos);
            if bytes.get(*pos) != Some(&b':') {
                return Err(err("expected `:` after a member key", *pos));
            }
            *pos += 1;
            skip_ws(bytes, pos);
            parse_value(bytes, pos, nodes, depth + 1)?;
            count += 1;
            skip_ws(bytes, pos);
            match bytes.get(*pos) {
                Some(b',') => *pos += 1,
                Some(b'}') => break,
                _ => return Err(err("expected `,` or `}`", *pos)),
            }
        }
    }
    *pos += 1;
    let span = nodes.len() - index;
    let node = &mut nodes[index];
    node.end = *pos;
    node.span = span;
    node.count = count;
    Ok(())
}

fn parse_array(
    bytes: &[u8],
    pos: &mut usize,
    nodes: &mut Vec<Node>,
    depth: usize,
) -> SyncResult<()> {
    let start = *pos;
    *pos += 1;
    let index = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Array,
        start,
        end: 0,
        span: 0,
        count: 0,
    });
    let mut count = 0;
    skip_ws(bytes, pos);
    if bytes.get(*pos) != Some(&b']') {
        loop {
            skip_ws(bytes, pos);
            parse_value(bytes, pos, nodes, depth + 1)?;
            count += 1;
            skip_ws(bytes, pos);
            match bytes.get(*pos) {
                Some(b',') => *pos += 1,
                Some(b']') => break,
                _ => return Err(err("expected `,` or `]`", *pos)),
            }
        }
    }
    *pos += 1;
    let span = nodes.len() - index;
    let node = &mut nodes[index];
    node.end = *pos;
    node.span = span;
    node.count = count;
    Ok(())
}

fn parse_literal(
    bytes: &[u8],
    pos: &mut usize,
    nodes: &mut Vec<Node>,
    literal: &[u8],
    kind: NodeKind,
) -> SyncResult<()> {
    let start = *pos;
    if bytes.len() < start + literal.len() || &bytes[start..start + literal.len()] != literal {
        return Err(err("invalid literal", start));
    }
    *pos += literal.len();
    nodes.push(Node {
        kind,
        start,
        end: *pos,
        span: 1,
        count: 0,
    });
    Ok(())
}

fn parse_number(bytes: &[u8], pos: &mut usize, nodes: &mut Vec<Node>) -> SyncResult<()> {
    let start = *pos;
    if bytes.get(*pos) == Some(&b'-') {
        *pos += 1;
    }
    let digits = *pos;
    while matches!(bytes.get(*pos), Some(b'0'..=b'9')) {
        *pos += 1;
    }
    if *pos == digits {
        return Err(err("expected digits", *pos));
    }
    if bytes.get(*pos) == Some(&b'.') {
        *pos += 1;
        let frac = *pos;
        while matches!(bytes.get(*pos), Some(b'0'..=b'9')) {
            *pos += 1;
        }
        if *pos == frac {
            return Err(err("expected fraction digits", *pos));
        }
    }
    if matches!(bytes.get(*pos), Some(b'e' | b'E')) {
        *pos += 1;
        if matches!(bytes.get(*pos), Some(b'+' | b'-')) {
            *pos += 1;
        }
        let exp = *pos;
        while matches!(bytes.get(*pos), Some(b'0'..=b'9')) {
            *pos += 1;
        }
        if *pos == exp {
            return Err(err("expected exponent digits", *pos));
        }
    }
    nodes.push(Node {
        kind: NodeKind::Number,
        start,
        end: *pos,
        span: 1,
        count: 0,
    });
    Ok(())
}

/// Scans a string token, validating escapes; returns the offset past the
/// closing quote.
fn scan_string(bytes: &[u8], pos: &mut usize) -> SyncResult<usize> {
    *pos += 1;
    loop {
        match bytes.get(*pos) {
            Some(b'"') => {
                *pos += 1;
                return Ok(*pos);
            }
            Some(b'\\') => {
                *pos += 1;
                match bytes.get(*pos) {
                    Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => *pos += 1,
                    Some(b'u') => {
                        *pos += 1;
                        for _ in 0..4 {
                            if !matches!(
                                bytes.get(*pos),
                                Some(b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F')
                            ) {
                                return Err(err("invalid \\u escape", *pos));
                            }
                            *pos += 1;
                        }
                    }
                    _ => return Err(err("invalid escape", *pos)),
                }
            }
            Some(b) if *b < 0x20 => return Err(err("raw control character in string", *pos)),
            Some(_) => *pos += 1,
            None => return Err(err("unterminated string", *pos)),
        }
    }
}

// -----------------------------------------------------------------------------
// String decoding

/// Decodes the contents of a string token (offsets include the quotes).
pub(crate) fn unescape(text: &str, start: usize, end: usize) -> SyncResult<String> {
    let raw = &text[start + 1..end - 1];
    if !raw.contains('\\') {
        return Ok(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next().map(|(_, c)| c) {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let unit = read_hex4(&mut chars, start + offset)?;
                if (0xD800..0xDC00).contains(&unit) {
                    // high surrogate; a \uXXXX low surrogate must follow
                    if chars.next().map(|(_, c)| c) != Some('\\')
                        || chars.next().map(|(_, c)| c) != Some('u')
                    {
                        return Err(err("unpaired surrogate", start + offset));
                    }
                    let low = read_hex4(&mut chars, start + offset)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(err("unpaired surrogate", start + offset));
                    }
                    let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    match char::from_u32(code) {
                        Some(c) => out.push(c),
                        None => return Err(err("invalid surrogate pair", start + offset)),
                    }
                } else {
                    match char::from_u32(unit) {
                        Some(c) => out.push(c),
                        None => return Err(err("unpaired surrogate", start + offset)),
                    }
                }
            }
            _ => return Err(err("invalid escape", start + offset)),
        }
    }
    Ok(out)
}

fn read_hex4(chars: &mut std::str::CharIndices<'_>, offset: usize) -> SyncResult<u32> {
    let mut value = 0_u32;
    for _ in 0..4 {
        let digit = chars
            .next()
            .and_then(|(_, c)| c.to_digit(16))
            .ok_or_else(|| err("invalid \\u escape", offset))?;
        value = value * 16 + digit;
    }
    Ok(value)
}

// -----------------------------------------------------------------------------
