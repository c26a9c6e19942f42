//! String escaping and path translation for the emitted markup.
//!
//! Output strings are written between a backtick and a straight quote;
//! the characters `\`, `>`, `'`, `` ` `` and tab must be escaped inside
//! them, and bytes outside ASCII are written as `\xHH` escapes. A few
//! characters are not representable inside strings at all and are emitted
//! as statement-level special-character tokens between runs.

use std::borrow::Cow;

use memchr::{memchr2, memchr3};
use percent_encoding::percent_decode_str;

/// Statement-level token for characters that cannot appear inside a string
/// run. Returns `None` for ordinary characters.
pub fn special_char_token(c: char) -> Option<&'static str> {
    match c {
        '\t' => Some("<Char Tab>"),
        '\u{00a0}' => Some("<Char HardSpace>"),
        '\u{2011}' => Some("<Char HardHyphen>"),
        '\u{00ad}' => Some("<Char DiscHyphen>"),
        '\u{2013}' => Some("<Char EnDash>"),
        '\u{2014}' => Some("<Char EmDash>"),
        '\u{2022}' => Some("<Char Bullet>"),
        '\u{2018}' => Some("<Char OpenQuote>"),
        '\u{2019}' => Some("<Char CloseQuote>"),
        '\u{201c}' => Some("<Char OpenDblQuote>"),
        '\u{201d}' => Some("<Char CloseDblQuote>"),
        _ => None,
    }
}

/// Escape text for inclusion in a backtick-quoted string.
///
/// Borrows the input unchanged when nothing needs escaping, which is the
/// common case for running text.
pub fn escape_string(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let dirty = memchr3(b'\\', b'>', b'\'', bytes)
        .or_else(|| memchr2(b'`', b'\t', bytes))
        .or_else(|| bytes.iter().position(|&b| b >= 0x80));
    if dirty.is_none() {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '>' => out.push_str("\\>"),
            '\'' => out.push_str("\\q"),
            '`' => out.push_str("\\Q"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x80 => out.push(c),
            c if (c as u32) <= 0xff => {
                out.push_str(&format!("\\x{:02x} ", c as u32));
            }
            // Not representable in the output charset.
            _ => out.push('?'),
        }
    }
    Cow::Owned(out)
}

/// Translate a graphic location to the output format's device-independent
/// path syntax: every component is prefixed with `<c\>`, absolute paths
/// start with `<r\>`.
///
/// Accepts `file:` URLs (percent-decoded) and native paths. Returns `None`
/// for locations that cannot be translated (other URL schemes, empty
/// paths); the caller reports and omits the object.
pub fn to_di_path(location: &str) -> Option<String> {
    let path: Cow<'_, str> = if let Some(rest) = location.strip_prefix("file://") {
        // file://host/path — we only support an empty host
        let rest = rest.strip_prefix('/').map(|p| format!("/{p}"));
        match rest {
            Some(p) => Cow::Owned(percent_decode_str(&p).decode_utf8_lossy().into_owned()),
            None => return None,
        }
    } else if let Some(rest) = location.strip_prefix("file:") {
        Cow::Owned(percent_decode_str(rest).decode_utf8_lossy().into_owned())
    } else if location.contains(':') && !location.starts_with('/') {
        // Some other URL scheme; not a file we can reference.
        return None;
    } else {
        Cow::Borrowed(location)
    };

    if path.is_empty() {
        return None;
    }

    let absolute = path.starts_with('/');
    let mut out = String::with_capacity(path.len() + 16);
    if absolute {
        out.push_str("<r\\>");
    }
    for component in path.split('/').filter(|c| !c.is_empty()) {
        out.push_str("<c\\>");
        out.push_str(&escape_string(component));
    }
    if out.is_empty() { None } else { Some(out) }
}
