//! XML entity escaping and the `_xHHHH_` identifier escaping scheme.
//!
//! Handles:
//! - Built-in entities: `&lt;` `&gt;` `&amp;` `&quot;` `&apos;`
//! - Numeric character references: `&#123;` `&#x7B;`
//! - Identifier escapes: `_x0020_` for characters that are not legal in XML names
//!
//! Every function returns `Cow::Borrowed` when the input needs no change.

use std::borrow::Cow;

use memchr::{memchr, memchr3};

/// Error produced when a character or entity reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity reference '{reference}' at offset {offset}")]
pub struct EntityError {
    /// Byte offset of the `&` within the unescaped text
    pub offset: usize,
    /// The offending reference, truncated for display
    pub reference: String,
}

/// Escape the five reserved characters (`& < > " '`).
pub fn escape(text: &str) -> Cow<'_, str> {
    escape_attribute(text)
}

/// Escape text for use inside a double- or single-quoted attribute value.
pub fn escape_attribute(text: &str) -> Cow<'_, str> {
    escape_with(text, |b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\''))
}

/// Escape character data. Quotes are left alone.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if memchr3(b'&', b'<', b'>', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    escape_with(text, |b| matches!(b, b'&' | b'<' | b'>'))
}

fn escape_with(text: &str, needs_escape: impl Fn(u8) -> bool) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let first = match bytes.iter().position(|&b| needs_escape(b)) {
        Some(i) => i,
        None => return Cow::Borrowed(text),
    };

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..first]);
    let mut start = first;
    for (i, &b) in bytes.iter().enumerate().skip(first) {
        let replacement = match b {
            b'&' if needs_escape(b) => "&amp;",
            b'<' if needs_escape(b) => "&lt;",
            b'>' if needs_escape(b) => "&gt;",
            b'"' if needs_escape(b) => "&quot;",
            b'\'' if needs_escape(b) => "&apos;",
            _ => continue,
        };
        out.push_str(&text[start..i]);
        out.push_str(replacement);
        start = i + 1;
    }
    out.push_str(&text[start..]);
    Cow::Owned(out)
}

/// Resolve entity and character references in a single left-to-right pass.
///
/// `&amp;lt;` becomes `&lt;`: the output of one replacement is never rescanned.
pub fn unescape(text: &str) -> Result<Cow<'_, str>, EntityError> {
    let bytes = text.as_bytes();
    let mut amp = match memchr(b'&', bytes) {
        Some(i) => i,
        None => return Ok(Cow::Borrowed(text)),
    };

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    loop {
        out.push_str(&text[pos..amp]);
        let semi = memchr(b';', &bytes[amp..])
            .map(|i| amp + i)
            .ok_or_else(|| entity_error(text, amp))?;
        let reference = &text[amp + 1..semi];
        match reference {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => out.push(decode_char_ref(reference).ok_or_else(|| entity_error(text, amp))?),
        }
        pos = semi + 1;
        match memchr(b'&', &bytes[pos..]) {
            Some(i) => amp = pos + i,
            None => break,
        }
    }
    out.push_str(&text[pos..]);
    Ok(Cow::Owned(out))
}

fn decode_char_ref(reference: &str) -> Option<char> {
    let digits = reference.strip_prefix('#')?;
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok()?,
        Some(_) => return None,
        None if !digits.is_empty() => digits.parse().ok()?,
        None => return None,
    };
    char::from_u32(code).filter(|&c| c != '\0')
}

fn entity_error(text: &str, offset: usize) -> EntityError {
    let reference: String = text[offset..].chars().take(12).collect();
    EntityError { offset, reference }
}

/// Replace every `_xHHHH_` (or `_xHHHHHHHH_`) escape with its character.
///
/// Matches are taken left to right without overlap; anything that is not a
/// complete, valid escape is copied through untouched.
pub fn decode_id(id: &str) -> Cow<'_, str> {
    if !id.contains("_x") {
        return Cow::Borrowed(id);
    }

    let mut out = String::with_capacity(id.len());
    let mut rest = id;
    while let Some(start) = rest.find("_x") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match parse_id_escape(candidate) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('_');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Parse a `_xHHHH_` or `_xHHHHHHHH_` escape at the start of `s`, returning the
/// character and the number of bytes consumed.
fn parse_id_escape(s: &str) -> Option<(char, usize)> {
    let bytes = s.as_bytes();
    for width in [4usize, 8] {
        let end = 2 + width;
        if bytes.len() > end
            && bytes[end] == b'_'
            && bytes[2..end].iter().all(u8::is_ascii_hexdigit)
        {
            let code = u32::from_str_radix(&s[2..end], 16).ok()?;
            return char::from_u32(code).map(|c| (c, end + 1));
        }
    }
    None
}

fn is_id_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
    }
}

// Any `_x` in the output must begin a real escape, so a literal `_` followed
// by `x` is escaped as well.
fn starts_escape(id: &str, i: usize, c: char) -> bool {
    c == '_' && id[i + 1..].starts_with('x')
}

/// Escape characters that are not permitted in an XML identifier.
///
/// Characters outside `[A-Za-z0-9_.-]` (and a leading digit, `-` or `.`) become
/// `_xHHHH_`; characters beyond the BMP use eight hex digits. An underscore
/// followed by `x` is escaped itself so that [`decode_id`] inverts this exactly.
pub fn encode_id(id: &str) -> Cow<'_, str> {
    let clean = id
        .char_indices()
        .all(|(i, c)| is_id_char(c, i == 0) && !starts_escape(id, i, c));
    if clean {
        return Cow::Borrowed(id);
    }

    let mut out = String::with_capacity(id.len() + 16);
    for (i, c) in id.char_indices() {
        if is_id_char(c, i == 0) && !starts_escape(id, i, c) {
            out.push(c);
        } else if (c as u32) <= 0xFFFF {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            out.push_str(&format!("_x{:08X}_", c as u32));
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_reserved_characters() {
        assert_eq!(escape("a < b & c > \"d\" 'e'"), "a &lt; b &amp; c &gt; &quot;d&quot; &apos;e&apos;");
        assert_eq!(escape_text("\"quoted\" <tag>"), "\"quoted\" &lt;tag&gt;");
        assert!(matches!(escape("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unescape_builtin_and_numeric() {
        assert_eq!(unescape("&lt;&gt;&amp;&quot;&apos;").unwrap(), "<>&\"'");
        assert_eq!(unescape("&#65;&#x42;&#X43;").unwrap(), "ABC");
        assert_eq!(unescape("&#x1F600;").unwrap(), "\u{1F600}");
        assert!(matches!(unescape("no entities").unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unescape_keeps_double_escaped_text() {
        assert_eq!(unescape("&quot;&lt;&amp;lt;&gt;&quot;").unwrap(), "\"<&lt;>\"");
        assert_eq!(unescape("&amp;amp;").unwrap(), "&amp;");
    }

    #[test]
    fn test_unescape_rejects_bad_references() {
        let err = unescape("fish & chips").unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(unescape("&bogus;").is_err());
        assert!(unescape("&#;").is_err());
        assert!(unescape("&#xZZ;").is_err());
        assert!(unescape("&#0;").is_err());
    }

    #[test]
    fn test_decode_id() {
        assert_eq!(decode_id("_x0031_invalid_x0020_ID"), "1invalid ID");
        assert_eq!(decode_id("_invalid-ID__x0023_2__x003c_3_x003e_"), "_invalid-ID_#2_<3>");
        assert_eq!(decode_id("_x0021__x0021__x0021_"), "!!!");
        assert_eq!(decode_id("_x00_ and _xZZZZ_"), "_x00_ and _xZZZZ_");
        assert!(matches!(decode_id("scan=1"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_encode_id() {
        assert_eq!(encode_id("1invalid ID"), "_x0031_invalid_x0020_ID");
        assert_eq!(encode_id("_x0041_"), "_x005F_x0041_");
        assert_eq!(encode_id("_xyz"), "_x005F_xyz");
        assert!(matches!(encode_id("valid_id-1.0"), Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn prop_unescape_inverts_escape(s in ".*") {
            let escaped = escape(&s);
            prop_assert_eq!(unescape(&escaped).unwrap(), s.as_str());
        }

        #[test]
        fn prop_decode_id_inverts_encode_id(s in ".*") {
            let encoded = encode_id(&s);
            prop_assert_eq!(decode_id(&encoded), s.as_str());
        }
    }
}
