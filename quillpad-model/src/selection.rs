//! Selection: an anchor/focus pair addressing positions inside blocks.

use serde::{Deserialize, Serialize};

use crate::block::BlockKey;
use crate::document::Document;

/// A position inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub block: BlockKey,
    pub offset: usize,
}

impl Position {
    pub fn new(block: BlockKey, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// An anchor/focus selection. Endpoints must reference blocks that exist in
/// the current document; after any structural mutation the model re-derives
/// a valid selection via [`Document::clamp_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    /// A collapsed selection at a single position.
    pub fn caret(position: Position) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// True when the focus precedes the anchor in document order.
    pub fn is_backward(&self, doc: &Document) -> bool {
        let anchor_idx = doc.index_of(self.anchor.block);
        let focus_idx = doc.index_of(self.focus.block);
        match (anchor_idx, focus_idx) {
            (Some(a), Some(f)) if a == f => self.focus.offset < self.anchor.offset,
            (Some(a), Some(f)) => f < a,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;
    use crate::document::{BlockSpec, Document};

    #[test]
    fn caret_is_collapsed() {
        let doc = Document::new("Doc");
        let sel = Selection::caret(Position::new(doc.blocks[0].key, 0));
        assert!(sel.is_collapsed());
        assert!(!sel.is_backward(&doc));
    }

    #[test]
    fn backward_across_blocks() {
        let doc = Document::new("Doc");
        let title = doc.blocks[0].key;
        let outcome = doc
            .insert_block_after(title, BlockSpec::text(BlockType::Paragraph, "hello"))
            .unwrap();
        let second = outcome.doc.blocks[1].key;

        let sel = Selection::new(Position::new(second, 1), Position::new(title, 0));
        assert!(sel.is_backward(&outcome.doc));

        let sel = Selection::new(Position::new(title, 0), Position::new(second, 1));
        assert!(!sel.is_backward(&outcome.doc));
    }

    #[test]
    fn backward_within_block() {
        let doc = Document::new("Doc");
        let title = doc.blocks[0].key;
        let sel = Selection::new(Position::new(title, 2), Position::new(title, 0));
        assert!(sel.is_backward(&doc));
    }
}
