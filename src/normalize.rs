//! Whitespace and citation-marker cleanup.

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn citation_markers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\[\d+\])+").expect("static regex"))
}

/// Collapse every whitespace run to one space, then delete `[digits]` markers.
///
/// Markers are removed without replacement, except that a run of markers
/// glued between two non-space characters (`foo[23]bar`) becomes one space
/// so the neighbours stay separate words.
///
/// ```
/// use webcloud::normalize::normalize;
/// assert_eq!(normalize("Hello   world[1]\n\nfoo[23]bar"), "Hello world foo bar");
/// assert_eq!(normalize("safe.[12]"), "safe.");
/// ```
pub fn normalize(text: &str) -> String {
    let collapsed = whitespace_run().replace_all(text, " ");
    let stripped = strip_markers(&collapsed);
    whitespace_run().replace_all(&stripped, " ").into_owned()
}

fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in citation_markers().find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let before = out.chars().next_back();
        let after = text[m.end()..].chars().next();
        if let (Some(b), Some(a)) = (before, after) {
            if !b.is_whitespace() && !a.is_whitespace() {
                out.push(' ');
            }
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}
