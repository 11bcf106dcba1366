//! Last-resort image extraction for markup the structural parser cannot
//! handle, commonly produced by office-suite paste sources.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::classify::{ElementData, ProcessedContent, ProcessedElement};

static IMG_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("img src pattern is valid")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Whether the markup contains an img tag at all (cheap scan used by the
/// dispatch policy before committing to the regex pass).
pub fn contains_img_tag(markup: &str) -> bool {
    markup.to_ascii_lowercase().contains("<img")
}

/// Extract `<img src=...>` occurrences directly and synthesize a content
/// set of flattened text plus one image element per match. Returns `None`
/// when no source could be extracted.
pub fn extract_images(markup: &str) -> Option<ProcessedContent> {
    let sources: Vec<String> = IMG_SRC_RE
        .captures_iter(markup)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .filter(|src| !src.is_empty())
        .collect();

    if sources.is_empty() {
        return None;
    }
    debug!(count = sources.len(), "regex fallback extracted images");

    let mut elements = Vec::new();
    let stripped = TAG_RE.replace_all(markup, " ");
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        elements.push(ProcessedElement::text(text));
    }
    for src in sources {
        elements.push(ProcessedElement::image(src, ElementData::default()));
    }

    Some(ProcessedContent {
        has_images: true,
        elements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ElementType;

    #[test]
    fn lone_img_yields_image_with_exact_source() {
        let content = extract_images(r#"<img src="X">"#).unwrap();
        assert!(content.has_images);
        assert!(content
            .elements
            .iter()
            .any(|e| e.element_type == ElementType::Image && e.content == "X"));
    }

    #[test]
    fn text_and_sources_both_survive() {
        let content =
            extract_images(r#"<o:p>word soup</o:p><img src='a.png'><img src=b.png>"#).unwrap();
        assert_eq!(content.elements.len(), 3);
        assert_eq!(content.elements[0].element_type, ElementType::Text);
        assert_eq!(content.elements[0].content, "word soup");
        assert_eq!(content.elements[1].content, "a.png");
        assert_eq!(content.elements[2].content, "b.png");
    }

    #[test]
    fn no_images_means_none() {
        assert!(extract_images("<p>nothing here</p>").is_none());
        assert!(extract_images(r#"<img alt="no src">"#).is_none());
    }

    #[test]
    fn case_insensitive_and_multiline() {
        let content = extract_images("<IMG\n  SRC=\"up.png\">").unwrap();
        assert_eq!(content.elements.last().unwrap().content, "up.png");
    }

    #[test]
    fn contains_img_tag_scan() {
        assert!(contains_img_tag("<p><IMG src=x></p>"));
        assert!(!contains_img_tag("<p>imgless</p>"));
    }
}
