//! Tree builder: tokens into a node tree, with lenient recovery.

use tracing::debug;

use crate::lexer::{tokenize, Token};

/// Elements that never take children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A node in the parsed markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

impl MarkupNode {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. } => Some(name),
            Self::Text(_) => None,
        }
    }

    pub fn attr(&self, wanted: &str) -> Option<&str> {
        match self {
            Self::Element { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name == wanted)
                .map(|(_, value)| value.as_str()),
            Self::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[MarkupNode] {
        match self {
            Self::Element { children, .. } => children,
            Self::Text(_) => &[],
        }
    }

    /// All text in the subtree, whitespace-collapsed.
    pub fn flatten_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Self::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Depth-first `img` descendants, in document order.
    pub fn images(&self) -> Vec<&MarkupNode> {
        let mut out = Vec::new();
        self.collect_images(&mut out);
        out
    }

    fn collect_images<'a>(&'a self, out: &mut Vec<&'a MarkupNode>) {
        match self {
            Self::Element { name, children, .. } => {
                if name == "img" {
                    out.push(self);
                }
                for child in children {
                    child.collect_images(out);
                }
            }
            Self::Text(_) => {}
        }
    }
}

/// Parse markup into a forest of root nodes.
///
/// Recovery rules: unmatched close tags are dropped, still-open tags are
/// closed at end of input, void elements never nest. This never fails;
/// hopeless input just yields text nodes (or nothing).
pub fn parse_tree(markup: &str) -> Vec<MarkupNode> {
    let tokens = tokenize(markup);

    // stack of (name, attrs, children); roots collect finished nodes
    let mut roots: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<MarkupNode>)> = Vec::new();

    let mut push_node = |stack: &mut Vec<(String, Vec<(String, String)>, Vec<MarkupNode>)>,
                         roots: &mut Vec<MarkupNode>,
                         node: MarkupNode| {
        match stack.last_mut() {
            Some((_, _, children)) => children.push(node),
            None => roots.push(node),
        }
    };

    for token in tokens {
        match token {
            Token::Text(text) => {
                push_node(&mut stack, &mut roots, MarkupNode::Text(text));
            }
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
                    push_node(
                        &mut stack,
                        &mut roots,
                        MarkupNode::Element {
                            name,
                            attrs,
                            children: Vec::new(),
                        },
                    );
                } else {
                    // implicit close: a new <li> or <p> ends an open one
                    if (name == "li" || name == "p")
                        && stack.last().map(|(n, _, _)| n == &name).unwrap_or(false)
                    {
                        let (prev_name, prev_attrs, prev_children) =
                            stack.pop().expect("stack top checked");
                        push_node(
                            &mut stack,
                            &mut roots,
                            MarkupNode::Element {
                                name: prev_name,
                                attrs: prev_attrs,
                                children: prev_children,
                            },
                        );
                    }
                    stack.push((name, attrs, Vec::new()));
                }
            }
            Token::Close(name) => {
                let Some(open_at) = stack.iter().rposition(|(n, _, _)| *n == name) else {
                    debug!(tag = %name, "dropping unmatched close tag");
                    continue;
                };
                // implicitly close anything opened inside the match
                while stack.len() > open_at {
                    let (name, attrs, children) = stack.pop().expect("stack bounds checked");
                    push_node(
                        &mut stack,
                        &mut roots,
                        MarkupNode::Element {
                            name,
                            attrs,
                            children,
                        },
                    );
                }
            }
        }
    }

    // close everything still open at EOF
    while let Some((name, attrs, children)) = stack.pop() {
        push_node(
            &mut stack,
            &mut roots,
            MarkupNode::Element {
                name,
                attrs,
                children,
            },
        );
    }

    roots
}
