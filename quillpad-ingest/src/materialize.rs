//! Materialization: fold classified elements into content-model blocks.

use quillpad_model::{BlockKey, BlockSpec, BlockType, Document, EditOutcome, Selection};
use serde_json::json;
use tracing::warn;

use crate::classify::{ElementType, ProcessedContent, ProcessedElement};
use crate::error::{IngestError, Result};

fn block_type_for(element_type: ElementType) -> BlockType {
    match element_type {
        ElementType::Text | ElementType::Paragraph => BlockType::Paragraph,
        ElementType::Heading1 => BlockType::Heading1,
        ElementType::Heading2 => BlockType::Heading2,
        ElementType::Heading3 => BlockType::Heading3,
        ElementType::NumberedList => BlockType::NumberedListItem,
        ElementType::BulletList => BlockType::BulletListItem,
        ElementType::Table => BlockType::Table,
        ElementType::Image => BlockType::Image,
    }
}

/// Insert classified elements after the selection's focus block, one block
/// per element in parsed order.
///
/// Every text-like element always creates a new block, even adjacent
/// same-type elements, to keep 1:1 correspondence with parsed order.
/// Image insertion is verified by a block-count post-condition; an image
/// that fails to materialize becomes a literal descriptive text block
/// rather than being silently dropped.
pub fn insert_mixed_content(
    doc: &Document,
    selection: &Selection,
    content: &ProcessedContent,
) -> Result<EditOutcome> {
    if doc.index_of(selection.focus.block).is_none() {
        return Err(IngestError::InvalidInsertionPoint);
    }

    let mut current = doc.clone();
    let mut cursor = selection.focus.block;
    let mut last_selection = *selection;

    for element in &content.elements {
        let outcome = if element.element_type == ElementType::Image {
            insert_image(&current, cursor, element)?
        } else {
            current.insert_block_after(
                cursor,
                BlockSpec::text(block_type_for(element.element_type), &element.content),
            )?
        };
        current = outcome.doc;
        cursor = outcome.selection.focus.block;
        last_selection = outcome.selection;
    }

    Ok(EditOutcome {
        doc: current,
        selection: last_selection,
    })
}

/// Attempt the image-insertion path; if the block count did not actually
/// increase, fall back to a literal text representation.
fn insert_image(doc: &Document, after: BlockKey, element: &ProcessedElement) -> Result<EditOutcome> {
    let before = doc.blocks.len();
    if let Some(outcome) = try_insert_image_block(doc, after, element) {
        if outcome.doc.blocks.len() > before {
            return Ok(outcome);
        }
    }

    let alt = element
        .data
        .as_ref()
        .and_then(|d| d.alt.as_deref())
        .unwrap_or("");
    warn!(src = %element.content, "image insertion produced no block, degrading to text");
    let fallback = format!("[Image: {} - {}]", alt, element.content);
    Ok(doc.insert_block_after(after, BlockSpec::text(BlockType::Paragraph, fallback))?)
}

/// The image-insertion primitive. Declines (returns `None`) when the
/// element carries no usable source.
fn try_insert_image_block(
    doc: &Document,
    after: BlockKey,
    element: &ProcessedElement,
) -> Option<EditOutcome> {
    if element.content.trim().is_empty() {
        return None;
    }

    let mut spec =
        BlockSpec::text(BlockType::Image, "").with_data("src", json!(element.content));
    if let Some(data) = &element.data {
        if let Some(alt) = &data.alt {
            spec = spec.with_data("alt", json!(alt));
        }
        if let Some(title) = &data.title {
            spec = spec.with_data("title", json!(title));
        }
    }

    doc.insert_block_after(after, spec).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{parse_markup, ElementData};
    use quillpad_model::{Position, Selection};

    fn empty_doc() -> (Document, Selection) {
        let doc = Document::new("Title");
        let sel = doc.end_selection();
        (doc, sel)
    }

    #[test]
    fn end_to_end_paste_materializes_four_blocks() {
        let (doc, sel) = empty_doc();
        let content = parse_markup(
            "<h1>Title</h1><p>Hello</p><ul><li>A<img src=\"data:x\"/></li></ul>",
        );
        let outcome = insert_mixed_content(&doc, &sel, &content).unwrap();

        let new_blocks = &outcome.doc.blocks[1..];
        assert_eq!(new_blocks.len(), 4);
        assert_eq!(new_blocks[0].block_type, BlockType::Heading1);
        assert_eq!(new_blocks[0].text, "Title");
        assert_eq!(new_blocks[1].block_type, BlockType::Paragraph);
        assert_eq!(new_blocks[1].text, "Hello");
        assert_eq!(new_blocks[2].block_type, BlockType::BulletListItem);
        assert_eq!(new_blocks[2].text, "A");
        assert_eq!(new_blocks[3].block_type, BlockType::Image);
        assert_eq!(new_blocks[3].data.get("src"), Some(&json!("data:x")));
    }

    #[test]
    fn adjacent_same_type_elements_stay_separate_blocks() {
        let (doc, sel) = empty_doc();
        let content = parse_markup("<p>one</p><p>two</p><p>three</p>");
        let outcome = insert_mixed_content(&doc, &sel, &content).unwrap();
        assert_eq!(outcome.doc.blocks.len(), 4);
        let texts: Vec<&str> = outcome.doc.blocks[1..]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn unusable_image_degrades_to_descriptive_text() {
        let (doc, sel) = empty_doc();
        let content = ProcessedContent {
            has_images: true,
            elements: vec![ProcessedElement::image(
                "   ",
                ElementData {
                    alt: Some("a chart".into()),
                    title: None,
                },
            )],
        };
        let outcome = insert_mixed_content(&doc, &sel, &content).unwrap();
        assert_eq!(outcome.doc.blocks.len(), 2);
        assert_eq!(outcome.doc.blocks[1].block_type, BlockType::Paragraph);
        assert_eq!(outcome.doc.blocks[1].text, "[Image: a chart -    ]");
    }

    #[test]
    fn selection_lands_at_end_of_last_inserted_block() {
        let (doc, sel) = empty_doc();
        let content = parse_markup("<h2>head</h2><p>tail</p>");
        let outcome = insert_mixed_content(&doc, &sel, &content).unwrap();
        let last = outcome.doc.blocks.last().unwrap();
        assert_eq!(outcome.selection.focus.block, last.key);
        assert_eq!(outcome.selection.focus.offset, last.len());
    }

    #[test]
    fn stale_insertion_point_is_rejected() {
        let (doc, _) = empty_doc();
        let other = Document::new("Other");
        let stale = Selection::caret(Position::new(other.blocks[0].key, 0));
        let content = parse_markup("<p>x</p>");
        assert!(matches!(
            insert_mixed_content(&doc, &stale, &content).unwrap_err(),
            IngestError::InvalidInsertionPoint
        ));
    }

    #[test]
    fn empty_content_is_a_no_op() {
        let (doc, sel) = empty_doc();
        let outcome = insert_mixed_content(&doc, &sel, &ProcessedContent::default()).unwrap();
        assert_eq!(outcome.doc, doc);
        assert_eq!(outcome.selection, sel);
    }
}
