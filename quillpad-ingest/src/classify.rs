//! Classification: walk the markup tree in strict document order and turn
//! each content-bearing node into a typed processed element.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{parse_tree, MarkupNode};

/// Type of a processed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Text,
    Image,
    Heading1,
    Heading2,
    Heading3,
    NumberedList,
    BulletList,
    Table,
    Paragraph,
}

/// Annotation metadata carried by image elements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementData {
    pub alt: Option<String>,
    pub title: Option<String>,
}

/// One classified element. Ephemeral: produced by the pipeline solely to
/// drive content-model insertion, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Text content, or for images the source (data-URL, absolute URL, or
    /// relative path, accepted verbatim at this stage).
    pub content: String,
    #[serde(default)]
    pub data: Option<ElementData>,
    #[serde(default)]
    pub level: Option<u8>,
}

impl ProcessedElement {
    pub fn paragraph(content: impl Into<String>) -> Self {
        Self {
            element_type: ElementType::Paragraph,
            content: content.into(),
            data: None,
            level: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            element_type: ElementType::Text,
            content: content.into(),
            data: None,
            level: None,
        }
    }

    pub fn heading(level: u8, content: impl Into<String>) -> Self {
        let element_type = match level {
            1 => ElementType::Heading1,
            2 => ElementType::Heading2,
            _ => ElementType::Heading3,
        };
        Self {
            element_type,
            content: content.into(),
            data: None,
            level: Some(level),
        }
    }

    pub fn list_item(ordered: bool, content: impl Into<String>) -> Self {
        Self {
            element_type: if ordered {
                ElementType::NumberedList
            } else {
                ElementType::BulletList
            },
            content: content.into(),
            data: None,
            level: None,
        }
    }

    pub fn image(src: impl Into<String>, data: ElementData) -> Self {
        Self {
            element_type: ElementType::Image,
            content: src.into(),
            data: Some(data),
            level: None,
        }
    }

    pub fn is_text_like(&self) -> bool {
        self.element_type != ElementType::Image
    }
}

/// Output of the ingestion parse step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedContent {
    pub has_images: bool,
    pub elements: Vec<ProcessedElement>,
}

impl ProcessedContent {
    /// Whether the pipeline found anything beyond plain paragraphs. When it
    /// did not, control is handed back to the default text-insertion path.
    pub fn is_structured(&self) -> bool {
        self.has_images
            || self.elements.iter().any(|e| {
                !matches!(e.element_type, ElementType::Paragraph | ElementType::Text)
            })
    }
}

/// Knobs for classification.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Localized label prefixed to flattened table text.
    pub table_label: String,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            table_label: "Table".to_string(),
        }
    }
}

/// Parse external markup into classified elements, in document order.
pub fn parse_markup(markup: &str) -> ProcessedContent {
    parse_markup_with(markup, &ClassifyOptions::default())
}

pub fn parse_markup_with(markup: &str, options: &ClassifyOptions) -> ProcessedContent {
    let roots = parse_tree(markup);
    let mut classifier = Classifier {
        options,
        content: ProcessedContent::default(),
    };
    for node in &roots {
        classifier.visit(node);
    }
    classifier.content
}

struct Classifier<'a> {
    options: &'a ClassifyOptions,
    content: ProcessedContent,
}

impl Classifier<'_> {
    fn visit(&mut self, node: &MarkupNode) {
        match node {
            MarkupNode::Text(text) => {
                if !text.trim().is_empty() {
                    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    self.content
                        .elements
                        .push(ProcessedElement::paragraph(collapsed));
                }
            }
            MarkupNode::Element { name, .. } => match name.as_str() {
                "h1" => self.push_heading(1, node),
                "h2" => self.push_heading(2, node),
                "h3" => self.push_heading(3, node),
                // transparent grouping, not content-producing
                "p" | "div" | "section" | "article" => {
                    for child in node.children() {
                        self.visit(child);
                    }
                }
                "img" => self.visit_image(node),
                "ol" => self.visit_list(node, true),
                "ul" => self.visit_list(node, false),
                "table" => {
                    // tabular structure is intentionally not reconstructed
                    let text = node.flatten_text();
                    self.content.elements.push(ProcessedElement {
                        element_type: ElementType::Table,
                        content: format!("{}: {}", self.options.table_label, text),
                        data: None,
                        level: None,
                    });
                }
                "figure" => self.visit_figure(node),
                "br" | "hr" => {}
                // graceful degradation: unknown content with text is never
                // silently dropped
                _ => {
                    let text = node.flatten_text();
                    if !text.is_empty() {
                        self.content.elements.push(ProcessedElement::paragraph(text));
                    }
                }
            },
        }
    }

    fn push_heading(&mut self, level: u8, node: &MarkupNode) {
        self.content
            .elements
            .push(ProcessedElement::heading(level, node.flatten_text()));
    }

    fn visit_image(&mut self, node: &MarkupNode) {
        let Some(src) = node.attr("src").filter(|s| !s.is_empty()) else {
            debug!("skipping img without src");
            return;
        };
        self.content.has_images = true;
        self.content.elements.push(ProcessedElement::image(
            src,
            ElementData {
                alt: node.attr("alt").map(str::to_string),
                title: node.attr("title").map(str::to_string),
            },
        ));
    }

    /// Lists recurse only into direct `li` children; each item emits one
    /// list element, then its nested images so they are not lost.
    fn visit_list(&mut self, node: &MarkupNode, ordered: bool) {
        for child in node.children() {
            if child.name() != Some("li") {
                continue;
            }
            self.content
                .elements
                .push(ProcessedElement::list_item(ordered, child.flatten_text()));
            for img in child.images() {
                self.visit_image(img);
            }
        }
    }

    /// A figure yields the first contained image and then a caption
    /// paragraph, when each is present.
    fn visit_figure(&mut self, node: &MarkupNode) {
        if let Some(img) = node.images().first() {
            self.visit_image(img);
        }
        let caption = node.flatten_text();
        if !caption.is_empty() {
            self.content
                .elements
                .push(ProcessedElement::paragraph(caption));
        }
    }
}
