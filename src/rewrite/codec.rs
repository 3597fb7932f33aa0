//! Percent-encoding for query strings, fragments and decoded path segments.
//!
//! # Responsibilities
//! - Escape characters that may not appear raw in a query or fragment
//! - Leave existing `%XX` escapes alone so encoding is idempotent
//! - Optionally escape `%` itself for values known to be decoded
//! - Decode percent-escapes in request paths
//!
//! # Design Decisions
//! - The allowed-character table is a `const` lookup over ASCII
//! - Escapes are always uppercase hex, one `%XX` per UTF-8 byte
//! - Non-ASCII characters pass through unless they are control or space characters

use std::borrow::Cow;

/// Which character set the encoder allows through unescaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeMode {
    /// Static target: `?`, `[` and `]` are also left as-is.
    #[default]
    Static,
    /// Templated target: only the strict query set is left as-is.
    Template,
}

const fn build_query_table() -> [bool; 128] {
    let mut table = [false; 128];
    let mut c = b'a';
    while c <= b'z' {
        table[c as usize] = true;
        table[(c - b'a' + b'A') as usize] = true;
        c += 1;
    }
    let mut d = b'0';
    while d <= b'9' {
        table[d as usize] = true;
        d += 1;
    }
    let extra = b"_-!.~'()*,;:$&+=/@%";
    let mut i = 0;
    while i < extra.len() {
        table[extra[i] as usize] = true;
        i += 1;
    }
    table
}

/// ASCII characters allowed unescaped in a query or fragment.
static QUERY_CHARS: [bool; 128] = build_query_table();

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_allowed(c: char, encode_percent: bool, mode: EncodeMode) -> bool {
    if c.is_ascii() {
        if encode_percent && c == '%' {
            return false;
        }
        if QUERY_CHARS[c as usize] {
            return true;
        }
        return mode == EncodeMode::Static && matches!(c, '?' | '[' | ']');
    }
    !(c.is_control() || c.is_whitespace())
}

/// Percent-encode a query string or fragment.
///
/// Existing `%` characters are preserved unless `encode_percent` is set, in
/// which case they become `%25`. Use `encode_percent = true` only for
/// values that are already decoded, such as a request path segment.
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
pub fn encode_query_or_fragment(input: &str, encode_percent: bool, mode: EncodeMode) -> Cow<'_, str> {
    let first = match input
        .char_indices()
        .find(|(_, c)| !is_allowed(*c, encode_percent, mode))
    {
        Some((idx, _)) => idx,
        None => return Cow::Borrowed(input),
    };

    let mut out = String::with_capacity(input.len() + 16);
    out.push_str(&input[..first]);
    let mut buf = [0u8; 4];
    for c in input[first..].chars() {
        if is_allowed(c, encode_percent, mode) {
            out.push(c);
            continue;
        }
        for byte in c.encode_utf8(&mut buf).bytes() {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    Cow::Owned(out)
}

/// Decode `%XX` escapes. Malformed escapes are kept literally and invalid
/// UTF-8 is replaced.
pub fn percent_decode(input: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(input).decode_utf8_lossy()
}
