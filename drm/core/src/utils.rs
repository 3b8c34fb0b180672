/// Const-compatible byte slice equality.
pub(crate) const fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Decode a single ASCII hex digit to its 4-bit value.
/// Returns `None` for non-hex characters.
pub(crate) const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Const-compatible ASCII whitespace trimming (both ends).
pub const fn trim_ascii(s: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < s.len() && s[start].is_ascii_whitespace() {
        start += 1;
    }
    let mut end = s.len();
    while end > start && s[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let (_, rest) = s.split_at(start);
    let (trimmed, _) = rest.split_at(end - start);
    trimmed
}

/// Const-compatible case-insensitive ASCII byte comparison.
pub const fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i].to_ascii_lowercase() != b[i].to_ascii_lowercase() {
            return false;
        }
        i += 1;
    }
    true
}

/// Position of the first occurrence of `needle` in `haystack` at or after `from`.
pub fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Bytes strictly between the first `start` delimiter and the next `end`
/// delimiter after it.
pub fn between<'a>(haystack: &'a [u8], start: &[u8], end: &[u8]) -> Option<&'a [u8]> {
    let open = find_subslice(haystack, start, 0)? + start.len();
    let close = find_subslice(haystack, end, open)?;
    Some(&haystack[open..close])
}

/// Drop NUL padding bytes, turning UTF-16LE-encoded ASCII into plain ASCII.
pub fn strip_nul(data: &[u8]) -> Vec<u8> {
    data.iter().copied().filter(|&b| b != 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_ignore_case_matching() {
        assert!(eq_ignore_ascii_case(b"hello", b"HELLO"));
        assert!(eq_ignore_ascii_case(b"Hello", b"hELLO"));
        assert!(eq_ignore_ascii_case(b"", b""));
    }

    #[test]
    fn eq_ignore_case_mismatch() {
        assert!(!eq_ignore_ascii_case(b"a", b"b"));
        assert!(!eq_ignore_ascii_case(b"ab", b"a"));
    }

    #[test]
    fn trim_leading_and_trailing() {
        assert_eq!(trim_ascii(b"  hello  "), b"hello");
        assert_eq!(trim_ascii(b"\thello\n"), b"hello");
        assert_eq!(trim_ascii(b"   "), b"");
    }

    #[test]
    fn find_subslice_respects_start() {
        let hay = b"<KID>a</KID><KID>b</KID>";
        assert_eq!(find_subslice(hay, b"<KID>", 0), Some(0));
        assert_eq!(find_subslice(hay, b"<KID>", 1), Some(12));
        assert_eq!(find_subslice(hay, b"<ABC>", 0), None);
        assert_eq!(find_subslice(hay, b"", 0), None);
        assert_eq!(find_subslice(hay, b"<KID>", 100), None);
    }

    #[test]
    fn between_extracts_first_match() {
        assert_eq!(between(b"x<a>hello</a>y", b"<a>", b"</a>"), Some(&b"hello"[..]));
        assert_eq!(between(b"<a></a>", b"<a>", b"</a>"), Some(&b""[..]));
        assert_eq!(between(b"<a>open", b"<a>", b"</a>"), None);
    }

    #[test]
    fn strip_nul_removes_utf16_padding() {
        assert_eq!(strip_nul(b"<\0K\0I\0D\0>\0"), b"<KID>");
    }
}
