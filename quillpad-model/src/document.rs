//! The document: an ordered block sequence plus the entity table, with
//! copy-on-write structural operations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::{Block, BlockKey, BlockType, EntityRange, StyleRange};
use crate::entity::{Entity, EntityKey};
use crate::error::{ModelError, Result};
use crate::selection::{Position, Selection};

/// Specification for a new block to insert.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub block_type: BlockType,
    pub text: String,
    pub depth: u32,
    pub data: BTreeMap<String, serde_json::Value>,
}

impl BlockSpec {
    pub fn text(block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            block_type,
            text: text.into(),
            depth: 0,
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(field.into(), value);
        self
    }
}

/// Result of a structural operation: the new document plus a re-derived
/// selection that is guaranteed valid against it.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub doc: Document,
    pub selection: Selection,
}

/// A document: totally ordered blocks plus the entity table.
///
/// The first block is the title. Structural operations never mutate in
/// place; each returns a fresh `Document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub entities: BTreeMap<EntityKey, Entity>,
}

impl Document {
    /// A new document with a single title block.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            blocks: vec![Block::new(BlockType::Title, title)],
            entities: BTreeMap::new(),
        }
    }

    pub fn index_of(&self, key: BlockKey) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }

    pub fn block(&self, key: BlockKey) -> Option<&Block> {
        self.blocks.iter().find(|b| b.key == key)
    }

    fn require_index(&self, key: BlockKey) -> Result<usize> {
        self.index_of(key).ok_or(ModelError::BlockNotFound(key))
    }

    pub fn title(&self) -> &Block {
        &self.blocks[0]
    }

    /// Caret at the end of the last block.
    pub fn end_selection(&self) -> Selection {
        let last = self.blocks.last().expect("document always has a block");
        Selection::caret(Position::new(last.key, last.len()))
    }

    /// Re-derive a valid selection after a structural mutation. Endpoints
    /// whose block no longer exists fall back to the document end; offsets
    /// are clamped into the live text.
    pub fn clamp_selection(&self, selection: Selection) -> Selection {
        let clamp = |pos: Position| -> Position {
            match self.block(pos.block) {
                Some(block) => Position::new(pos.block, block.clamp_offset(pos.offset)),
                None => self.end_selection().focus,
            }
        };
        Selection::new(clamp(selection.anchor), clamp(selection.focus))
    }

    /// Split the focus block at the caret.
    ///
    /// The leading half keeps the block's key; the trailing half gets a
    /// fresh key. Splitting the title demotes the trailing block to a
    /// paragraph, so titles never propagate past a split. Style and entity
    /// ranges are partitioned between the halves; ranges straddling the
    /// split point are clipped into both.
    pub fn split_block(&self, selection: &Selection) -> Result<EditOutcome> {
        let idx = self.require_index(selection.focus.block)?;
        let block = &self.blocks[idx];
        let at = block.clamp_offset(selection.focus.offset);

        let trailing_type = if block.block_type == BlockType::Title {
            BlockType::Paragraph
        } else {
            block.block_type
        };

        let mut leading = block.clone();
        leading.text = block.text[..at].to_string();
        let mut trailing = Block::new(trailing_type, &block.text[at..]);
        trailing.depth = block.depth;

        leading.styles = Vec::new();
        trailing.styles = Vec::new();
        for range in &block.styles {
            let (left, right) = split_interval(range.start, range.end, at);
            if let Some((s, e)) = left {
                leading.styles.push(StyleRange {
                    start: s,
                    end: e,
                    style: range.style.clone(),
                });
            }
            if let Some((s, e)) = right {
                trailing.styles.push(StyleRange {
                    start: s,
                    end: e,
                    style: range.style.clone(),
                });
            }
        }

        leading.entity_ranges = Vec::new();
        trailing.entity_ranges = Vec::new();
        for range in &block.entity_ranges {
            let (left, right) = split_interval(range.start, range.end, at);
            if let Some((s, e)) = left {
                leading.entity_ranges.push(EntityRange {
                    start: s,
                    end: e,
                    entity: range.entity,
                });
            }
            if let Some((s, e)) = right {
                trailing.entity_ranges.push(EntityRange {
                    start: s,
                    end: e,
                    entity: range.entity,
                });
            }
        }

        let caret = Position::new(trailing.key, 0);
        let mut doc = self.clone();
        doc.blocks[idx] = leading;
        doc.blocks.insert(idx + 1, trailing);

        Ok(EditOutcome {
            doc,
            selection: Selection::caret(caret),
        })
    }

    /// Merge a block into its predecessor. The merged block's text is
    /// appended and its style/entity ranges shift by the predecessor's
    /// prior length; the caret lands at the join point.
    pub fn merge_block_backward(&self, key: BlockKey) -> Result<EditOutcome> {
        let idx = self.require_index(key)?;
        if idx == 0 {
            return Err(ModelError::NoPredecessor);
        }

        let mut doc = self.clone();
        let merged = doc.blocks.remove(idx);
        let prev = &mut doc.blocks[idx - 1];
        let base = prev.text.len();

        prev.text.push_str(&merged.text);
        for range in merged.styles {
            prev.styles.push(StyleRange {
                start: range.start + base,
                end: range.end + base,
                style: range.style,
            });
        }
        for range in merged.entity_ranges {
            prev.entity_ranges.push(EntityRange {
                start: range.start + base,
                end: range.end + base,
                entity: range.entity,
            });
        }

        let caret = Position::new(prev.key, base);
        Ok(EditOutcome {
            doc,
            selection: Selection::caret(caret),
        })
    }

    /// Delete a block. If the caret was inside it, the new selection is the
    /// end of the preceding block (or the start of the new first block when
    /// the first block was deleted); otherwise the selection passes through
    /// unchanged. Deleting the only block is rejected.
    pub fn delete_block(&self, key: BlockKey, selection: &Selection) -> Result<EditOutcome> {
        if self.blocks.len() == 1 {
            return Err(ModelError::LastBlock);
        }
        let idx = self.require_index(key)?;

        let mut doc = self.clone();
        doc.blocks.remove(idx);

        let under_caret = selection.anchor.block == key || selection.focus.block == key;
        let selection = if under_caret {
            if idx > 0 {
                let prev = &doc.blocks[idx - 1];
                Selection::caret(Position::new(prev.key, prev.len()))
            } else {
                Selection::caret(Position::new(doc.blocks[0].key, 0))
            }
        } else {
            doc.clamp_selection(*selection)
        };

        Ok(EditOutcome { doc, selection })
    }

    /// Change a block's type. The block sequence is untouched, so the
    /// caller's selection remains valid as-is.
    pub fn set_block_type(&self, key: BlockKey, block_type: BlockType) -> Result<Document> {
        let idx = self.require_index(key)?;
        let mut doc = self.clone();
        doc.blocks[idx].block_type = block_type;
        Ok(doc)
    }

    /// Insert a new block after `after`, returning a caret at its end.
    pub fn insert_block_after(&self, after: BlockKey, spec: BlockSpec) -> Result<EditOutcome> {
        let idx = self.require_index(after)?;

        let mut block = Block::new(spec.block_type, spec.text);
        block.depth = spec.depth;
        block.data = spec.data;

        let caret = Position::new(block.key, block.len());
        let mut doc = self.clone();
        doc.blocks.insert(idx + 1, block);

        Ok(EditOutcome {
            doc,
            selection: Selection::caret(caret),
        })
    }

    /// Duplicate a block directly after itself under a fresh key.
    ///
    /// Of the data bag only the `"state"` field is copied; per-type
    /// transient flags (e.g. `"isExtended"`) are dropped so duplicates
    /// start collapsed.
    pub fn duplicate_block(&self, key: BlockKey) -> Result<EditOutcome> {
        let idx = self.require_index(key)?;
        let original = &self.blocks[idx];

        let mut copy = original.clone();
        copy.key = BlockKey::fresh();
        copy.data = original
            .data
            .get("state")
            .map(|v| {
                let mut data = BTreeMap::new();
                data.insert("state".to_string(), v.clone());
                data
            })
            .unwrap_or_default();

        let caret = Position::new(copy.key, copy.len());
        let mut doc = self.clone();
        doc.blocks.insert(idx + 1, copy);

        Ok(EditOutcome {
            doc,
            selection: Selection::caret(caret),
        })
    }

    /// Set one field of a block's data bag. Non-structural: the selection
    /// is unaffected.
    pub fn set_block_data(
        &self,
        key: BlockKey,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<Document> {
        let idx = self.require_index(key)?;
        let mut doc = self.clone();
        doc.blocks[idx].data.insert(field.into(), value);
        Ok(doc)
    }

    /// Drop entities no block range references anymore.
    ///
    /// Entities are deliberately not garbage-collected on edit; this is the
    /// explicit opt-in compaction entry point.
    pub fn compact_entities(&self) -> Document {
        let referenced: BTreeSet<EntityKey> = self
            .blocks
            .iter()
            .flat_map(|b| b.entity_ranges.iter().map(|r| r.entity))
            .collect();

        let before = self.entities.len();
        let mut doc = self.clone();
        doc.entities.retain(|key, _| referenced.contains(key));
        if doc.entities.len() != before {
            debug!(
                removed = before - doc.entities.len(),
                "compacted unreferenced entities"
            );
        }
        doc
    }
}

/// Partition the interval [start, end) at `at`, clipping a straddling
/// interval into both sides. The right side is rebased to the split point.
fn split_interval(start: usize, end: usize, at: usize) -> (Option<(usize, usize)>, Option<(usize, usize)>) {
    let left = if start < at {
        Some((start, end.min(at)))
    } else {
        None
    };
    let right = if end > at {
        Some((start.max(at) - at, end - at))
    } else {
        None
    };
    (left, right)
}
