use std::sync::LazyLock;

use regex::Regex;

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break regex"));

/// Turns model output into plain text: HTML entities are decoded with the
/// full HTML5 table (including the legacy forms without a trailing
/// semicolon), then break tags, including ones that were entity-escaped,
/// become newlines. Unknown named entities are left untouched.
pub fn normalize_generated_text(raw: &str) -> String {
    let decoded = htmlize::unescape(raw);
    BREAK_TAG.replace_all(&decoded, "\n").into_owned()
}

/// Escapes text for HTML element content and quoted attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_variants_become_newlines() {
        let out = normalize_generated_text("Dear Sir,<br>Line two<br/>Line three<br />Four<BR>Five");
        assert_eq!(out, "Dear Sir,\nLine two\nLine three\nFour\nFive");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            normalize_generated_text("Roads &amp; Drains &lt;Ward 5&gt; &quot;urgent&quot; &#39;now&#39; &#x20B9;"),
            "Roads & Drains <Ward 5> \"urgent\" 'now' ₹"
        );
    }

    #[test]
    fn test_entities_decoded_once() {
        assert_eq!(normalize_generated_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_full_entity_table() {
        assert_eq!(
            normalize_generated_text("caf&eacute; 3&times;4 a&middot;b &hellip;"),
            "café 3×4 a·b …"
        );
    }

    #[test]
    fn test_legacy_entities_without_semicolon() {
        assert_eq!(normalize_generated_text("&copy 2024 caf&eacute"), "© 2024 café");
    }

    #[test]
    fn test_null_reference_becomes_replacement_char() {
        assert_eq!(normalize_generated_text("a&#0;b"), "a\u{fffd}b");
    }

    #[test]
    fn test_unknown_entity_left_alone() {
        assert_eq!(normalize_generated_text("a &bogus; b & c"), "a &bogus; b & c");
    }

    #[test]
    fn test_escaped_break_still_becomes_newline() {
        assert_eq!(normalize_generated_text("one&lt;br /&gt;two"), "one\ntwo");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }
}
