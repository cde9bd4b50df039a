//! Main-content text extraction.
//!
//! Boilerplate elements (`script`, `style`, `header`, `footer`, `nav`,
//! `aside`) are treated as removed from the tree: nothing inside them can be
//! chosen as the content root and none of their text reaches the output.
//! The content root is the first match of, in order: `main`, `article`,
//! `div.content`, `div#main`, `body`.

use crate::{Error, Result, TextExtractor};
use log::debug;
use scraper::{ElementRef, Html, Selector};

/// Structural tags whose whole subtree is dropped.
pub const EXCLUDED_TAGS: [&str; 6] = ["script", "style", "header", "footer", "nav", "aside"];

/// Content root candidates, highest priority first.
pub const ROOT_SELECTORS: [&str; 5] = ["main", "article", "div.content", "div#main", "body"];

pub struct HtmlTextExtractor {
    roots: Vec<Selector>,
}

impl HtmlTextExtractor {
    pub fn new() -> Result<Self> {
        let roots = ROOT_SELECTORS
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map_err(|e| Error::Other(format!("Invalid selector {}: {:?}", s, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { roots })
    }

    fn find_root<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for (selector, name) in self.roots.iter().zip(ROOT_SELECTORS) {
            let found = document.select(selector).find(|el| !inside_excluded(el));
            if let Some(el) = found {
                // html5ever always synthesizes <body>, and stray text after
                // </html> (usually a newline) lands in it.
                if name == "body" && !has_content(&el) {
                    return None;
                }
                debug!("content root: {}", name);
                return Some(el);
            }
        }
        None
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, markup: &str) -> Result<String> {
        let document = Html::parse_document(markup);
        let root = self.find_root(&document).ok_or(Error::NoContent)?;
        Ok(visible_text(root))
    }
}

/// An element child or some non-blank text.
fn has_content(el: &ElementRef) -> bool {
    el.children().any(|child| {
        child.value().is_element()
            || child
                .value()
                .as_text()
                .is_some_and(|text| !text.trim().is_empty())
    })
}

fn is_excluded(el: &ElementRef) -> bool {
    EXCLUDED_TAGS.contains(&el.value().name())
}

fn inside_excluded(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_excluded(&a))
}

/// Concatenated descendant text of `root`, skipping excluded subtrees.
fn visible_text(root: ElementRef) -> String {
    let root_id = root.id();
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != root_id)
            .filter_map(ElementRef::wrap)
            .any(|a| is_excluded(&a));
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
