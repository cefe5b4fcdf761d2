#![forbid(unsafe_code)]

//! Entity escaping for C14N output.
//!
//! Per the C14N 1.0 recommendation:
//! - Text nodes: `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `\r` → `&#xD;`
//! - Attribute values: `&` → `&amp;`, `<` → `&lt;`, `"` → `&quot;`,
//!   `\t` → `&#x9;`, `\n` → `&#xA;`, `\r` → `&#xD;`
//! - PI data: `\r` → `&#xD;`

/// Escape text node content per C14N rules.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value per C14N rules.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape processing instruction data.
pub fn escape_pi(s: &str) -> String {
    s.replace('\r', "&#xD;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rules() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("a&b<c>d"), "a&amp;b&lt;c&gt;d");
        assert_eq!(escape_text("line\rend"), "line&#xD;end");
        // Quotes and whitespace pass through untouched in text.
        assert_eq!(escape_text("\"q\"\t\n"), "\"q\"\t\n");
    }

    #[test]
    fn attr_rules() {
        assert_eq!(escape_attr("plain"), "plain");
        assert_eq!(escape_attr("a&b\"c"), "a&amp;b&quot;c");
        assert_eq!(escape_attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
        // `>` is not escaped in attribute values.
        assert_eq!(escape_attr("a>b"), "a>b");
    }

    #[test]
    fn pi_rules() {
        assert_eq!(escape_pi("plain"), "plain");
        assert_eq!(escape_pi("a\rb\rc"), "a&#xD;b&#xD;c");
        // Only carriage returns are escaped in PI data.
        assert_eq!(escape_pi("keep & < > \" \t \n"), "keep & < > \" \t \n");
    }
}
