//! Search value escaping (FHIR "Encoding Note").
//!
//! FHIR search values may escape special separator characters using `\`:
//! `\,` (comma in values), `\|` (token system/code separator), `\$` and `\\`.

/// Split on `sep`, ignoring separators preceded by `\`. Escapes are kept.
pub(crate) fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&input[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Undo `\` escapes. Malformed escapes are kept verbatim.
pub(crate) fn unescape_search_value(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | ',' | '$' | '|')) => out.push(next),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
