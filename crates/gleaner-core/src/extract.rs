//! Marker-based text extraction.
//!
//! These are textual, not structural, primitives: a value is located by the
//! literal text that precedes and follows it, matching the first occurrence
//! of each marker. They have no awareness of HTML nesting and will
//! mis-extract when a marker repeats before the wanted region. That is a
//! known, accepted limitation of the approach — callers wanting structural
//! guarantees need a real parser, which is deliberately out of scope here.

use std::sync::LazyLock;

use regex::Regex;

/// Extract the substring between the first occurrence of `start` and the
/// first occurrence of `end` after it, trimmed of surrounding whitespace.
///
/// HTML entities in both markers and the haystack are decoded before
/// matching, so a marker like `income:&lt;/b&gt;` finds `income:</b>`.
///
/// Returns the empty string when `start` is absent. When `end` is absent,
/// the whole remainder after `start` is returned (first-match-wins, never
/// the last candidate). With `strip_markup` set, tags are removed from the
/// result via [`strip_tags`].
pub fn extract_between(start: &str, end: &str, text: &str, strip_markup: bool) -> String {
    let start = html_escape::decode_html_entities(start);
    let end = html_escape::decode_html_entities(end);
    let text = html_escape::decode_html_entities(text);

    let tail = match text.split_once(start.as_ref()) {
        Some((_, tail)) => tail,
        None => return String::new(),
    };
    let region = match tail.split_once(end.as_ref()) {
        Some((head, _)) => head,
        None => tail,
    };

    if strip_markup {
        strip_tags(region).trim().to_string()
    } else {
        region.trim().to_string()
    }
}

/// Extract the content of the first `<tag>...</tag>` element.
///
/// Same two-marker slicing as [`extract_between`] but with no entity
/// decoding and no trimming: XML payloads are taken verbatim.
pub fn extract_xml_element(tag: &str, text: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let tail = match text.split_once(open.as_str()) {
        Some((_, tail)) => tail,
        None => return String::new(),
    };
    match tail.split_once(close.as_str()) {
        Some((head, _)) => head,
        None => tail,
    }
    .to_string()
}

/// Extract the region between `start` and `end`, then split it on
/// `separator`. Useful for delimited lists embedded in a page.
pub fn extract_list(start: &str, end: &str, separator: &str, text: &str) -> Vec<String> {
    let region = extract_between(start, end, text, false);
    if region.is_empty() {
        return Vec::new();
    }
    region.split(separator).map(str::to_string).collect()
}

/// First `<a>` element of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    /// Inner content between `<a>` and `</a>`, markup included.
    pub text: String,
}

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href=["']?([^"' >]+)["']?[^>]*>(.*?)</a>"#)
        .expect("anchor regex is valid")
});

/// Find the first anchor in `html`, returning its href and inner text.
pub fn first_anchor(html: &str) -> Option<Anchor> {
    let caps = ANCHOR_RE.captures(html)?;
    Some(Anchor {
        href: caps[1].to_string(),
        text: caps[2].to_string(),
    })
}

/// Remove markup tags from `text`, keeping inter-tag content and order.
///
/// A plain scanner: everything from `<` to the matching `>` is dropped. An
/// unterminated `<` swallows the rest of the input, mirroring the textual
/// semantics of the extraction primitives above.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_between_unique_markers() {
        let text = "...household income in 2012:</b> $85,000 (2012)...";
        assert_eq!(
            extract_between("income in 2012:</b> ", " (", text, false),
            "$85,000"
        );
    }

    #[test]
    fn missing_start_marker_yields_empty() {
        assert_eq!(extract_between("nope", ")", "some text (here)", false), "");
    }

    #[test]
    fn missing_end_marker_yields_remainder() {
        assert_eq!(
            extract_between("value: ", "|", "prefix value: rest of line  ", false),
            "rest of line"
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "a [one] b [two]";
        assert_eq!(extract_between("[", "]", text, false), "one");
    }

    #[test]
    fn markers_are_entity_decoded() {
        // "&amp;" in the marker must match a literal "&" in the page.
        assert_eq!(
            extract_between("Tom &amp; Jerry: ", ";", "Tom & Jerry: cartoon; more", false),
            "cartoon"
        );
    }

    #[test]
    fn haystack_is_entity_decoded() {
        assert_eq!(
            extract_between("<b>", "</b>", "&lt;b&gt;bold&lt;/b&gt;", false),
            "bold"
        );
    }

    #[test]
    fn strip_markup_removes_tags_preserving_text() {
        let text = "start <span>one</span> <em>two</em> end|";
        let got = extract_between("start ", "|", text, true);
        assert_eq!(got, "one two end");
        assert!(!got.contains('<'));
    }

    #[test]
    fn idempotent_on_extracted_text() {
        let text = "x [value] y";
        let first = extract_between("[", "]", text, false);
        assert_eq!(first, "value");
        // Markers are gone from the extracted region: re-applying must give
        // the empty string, not echo the input back.
        assert_eq!(extract_between("[", "]", &first, false), "");
    }

    #[test]
    fn xml_element_is_verbatim() {
        let text = "<rss><title>  Hello </title></rss>";
        assert_eq!(extract_xml_element("title", text), "  Hello ");
        assert_eq!(extract_xml_element("missing", text), "");
    }

    #[test]
    fn xml_element_without_close_returns_tail() {
        assert_eq!(extract_xml_element("t", "<t>open ended"), "open ended");
    }

    #[test]
    fn list_splits_on_separator() {
        let text = "names: alpha, beta, gamma;";
        assert_eq!(
            extract_list("names: ", ";", ", ", text),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn list_is_empty_on_miss() {
        assert!(extract_list("nope: ", ";", ",", "irrelevant").is_empty());
    }

    #[test]
    fn first_anchor_href_and_text() {
        let html = r#"<p>see <a class="x" href="https://example.com/a">First</a> and <a href="/b">Second</a></p>"#;
        let anchor = first_anchor(html).unwrap();
        assert_eq!(anchor.href, "https://example.com/a");
        assert_eq!(anchor.text, "First");
    }

    #[test]
    fn first_anchor_unquoted_href() {
        let anchor = first_anchor("<a href=/plain>go</a>").unwrap();
        assert_eq!(anchor.href, "/plain");
    }

    #[test]
    fn first_anchor_none_without_links() {
        assert!(first_anchor("<p>no links here</p>").is_none());
    }

    #[test]
    fn strip_tags_drops_unterminated_tag() {
        assert_eq!(strip_tags("keep <b>bold</b> tail <unclosed"), "keep bold tail ");
    }

    #[test]
    fn full_surface_reachable_from_crate_root() {
        let anchor: crate::Anchor = crate::first_anchor("<a href=/x>x</a>").unwrap();
        assert_eq!(anchor.href, "/x");
        assert_eq!(crate::extract_list("(", ")", ",", "(a,b)"), vec!["a", "b"]);
        assert_eq!(crate::extract_between("[", "]", "[v]", false), "v");
        assert_eq!(crate::extract_xml_element("t", "<t>v</t>"), "v");
        assert_eq!(crate::strip_tags("<i>v</i>"), "v");
    }

    #[test]
    fn strip_tags_stray_angle_bracket_swallows_remainder() {
        // Textual semantics: a bare "<" reads as the start of a tag.
        assert_eq!(strip_tags("2 < 3 is fine in prose"), "2 ");
    }
}
