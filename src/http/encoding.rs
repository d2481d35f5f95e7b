//! URL and HTML encoding helpers

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Decode `%XX` escapes in a request path.
///
/// Returns `None` for truncated or non-hex escapes. `+` is left as is;
/// it only means space in query strings.
pub fn percent_decode(input: &str) -> Option<Vec<u8>> {
    if !has_valid_escapes(input) {
        return None;
    }
    Some(percent_decode_str(input).collect())
}

/// Percent-encode a path segment for use inside an `href`
///
/// Unreserved characters (RFC 3986) pass through; everything else,
/// including `/`, is escaped.
pub fn percent_encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Escape text for inclusion in HTML content or a quoted attribute
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// percent_decode_str passes malformed escapes through untouched
fn has_valid_escapes(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.iter().enumerate().all(|(i, &b)| {
        b != b'%'
            || matches!(
                (bytes.get(i + 1), bytes.get(i + 2)),
                (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
    })
}
