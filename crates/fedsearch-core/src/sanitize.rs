//! Markup stripping applied to every textual hit field.

use once_cell::sync::Lazy;
use regex::Regex;

// Applied in this order; the generic tag pass assumes emphasis tags are gone.
static EMPHASIS_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?span[^>]*>|</?b>|</?i>|</?em>|</?strong>").expect("emphasis tag pattern")
});
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static ANGLE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>]").expect("bracket pattern"));

/// Remove inline emphasis, then any other tag, then stray angle brackets.
/// Entities such as `&amp;` are left intact so a second pass changes nothing.
pub fn sanitize(text: &str) -> String {
    let text = EMPHASIS_TAGS.replace_all(text, "");
    let text = ANY_TAG.replace_all(&text, "");
    ANGLE_BRACKETS.replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::sanitize;

    #[test]
    fn strips_emphasis_and_tags() {
        assert_eq!(sanitize("<b>Bold</b> and <SPAN class=\"x\">span</SPAN>"), "Bold and span");
        assert_eq!(sanitize("<a href=\"http://x\">link</a> <br/>"), "link ");
        assert_eq!(sanitize("1 < 2"), "1  2");
        assert_eq!(sanitize("1 < 2 > 0"), "1  0");
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        for s in ["<<b>x>y", "a <em>b</em> <c", "plain", "<i><</i>>", ""] {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn entities_are_kept() {
        assert_eq!(sanitize("Tom &amp; <b>Jerry</b> &#39;s"), "Tom &amp; Jerry &#39;s");
    }
}
