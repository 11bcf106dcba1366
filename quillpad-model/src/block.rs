//! Block types: the ordered, typed units of document content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKey;

/// Stable identifier for a block.
///
/// Keys are unique within a document for its lifetime and are never reused,
/// even after deletion, so dangling entity references stay detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey(pub Uuid);

impl BlockKey {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type tag for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Title,
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    NumberedListItem,
    BulletListItem,
    Table,
    Image,
    Divider,
    Embed,
    TaskBoard,
}

impl BlockType {
    /// Atomic blocks carry no editable text of their own.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::Image | Self::Divider | Self::Embed | Self::TaskBoard)
    }
}

/// Inline style over a character-offset interval of a block's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRange {
    pub start: usize,
    pub end: usize,
    pub style: String,
}

/// Reference to an entity over a character-offset interval.
///
/// When the underlying text is deleted the range is silently dropped;
/// there is no tombstoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRange {
    pub start: usize,
    pub end: usize,
    pub entity: EntityKey,
}

/// A single ordered unit of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub key: BlockKey,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub text: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub styles: Vec<StyleRange>,
    #[serde(default)]
    pub entity_ranges: Vec<EntityRange>,
    /// Open key/value bag for per-type state (toggle open/closed,
    /// "isExtended", image source, ...).
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl Block {
    pub fn new(block_type: BlockType, text: impl Into<String>) -> Self {
        Self {
            key: BlockKey::fresh(),
            block_type,
            text: text.into(),
            depth: 0,
            styles: Vec::new(),
            entity_ranges: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    /// Length of the block's text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Clamp a caret offset into this block to a valid char boundary.
    pub fn clamp_offset(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.text.len());
        while offset > 0 && !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_keys_are_unique() {
        let a = BlockKey::fresh();
        let b = BlockKey::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn clamp_offset_respects_char_boundaries() {
        let block = Block::new(BlockType::Paragraph, "héllo");
        // 'é' spans bytes 1..3; offset 2 is mid-char
        assert_eq!(block.clamp_offset(2), 1);
        assert_eq!(block.clamp_offset(100), block.text.len());
    }

    #[test]
    fn block_type_serializes_kebab_case() {
        let json = serde_json::to_string(&BlockType::NumberedListItem).unwrap();
        assert_eq!(json, "\"numbered-list-item\"");
    }

    #[test]
    fn atomic_types() {
        assert!(BlockType::Image.is_atomic());
        assert!(BlockType::Divider.is_atomic());
        assert!(!BlockType::Paragraph.is_atomic());
        assert!(!BlockType::Title.is_atomic());
    }
}
