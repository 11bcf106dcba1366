//! Comment subsystem: word-anchored comment threads over the entity table.
//!
//! Comments are entities with replace-whole-payload semantics; appending to
//! a thread replaces the owning entity's comment list rather than patching
//! it. Deleting the last comment of a thread clears the entity's ranges but
//! leaves the entity in the table (no tombstoning, no auto-GC).

use tracing::warn;

use crate::block::{BlockKey, EntityRange};
use crate::document::{Document, EditOutcome};
use crate::entity::{Comment, Entity, EntityKey, EntityPayload};
use crate::error::{ModelError, Result};
use crate::selection::Selection;

/// Byte range of the whitespace-delimited token ending at (or immediately
/// before) `caret`. `None` when nothing but whitespace precedes the caret.
fn word_before(text: &str, caret: usize) -> Option<(usize, usize)> {
    let head = &text[..caret];
    let end = head.trim_end().len();
    if end == 0 {
        return None;
    }
    let start = head[..end]
        .char_indices()
        .rev()
        .take_while(|(_, c)| !c.is_whitespace())
        .last()
        .map(|(i, _)| i)?;
    Some((start, end))
}

impl Document {
    /// Create a comment on the word preceding the caret, or append to the
    /// thread already anchored there.
    ///
    /// When the caret has no preceding non-whitespace token this returns
    /// [`ModelError::NothingToAnnotate`]; callers surface that as a
    /// disabled state, not a failure.
    pub fn create_or_append_comment(
        &self,
        selection: &Selection,
        comment: Comment,
    ) -> Result<EditOutcome> {
        let block_key = selection.focus.block;
        let idx = self
            .index_of(block_key)
            .ok_or(ModelError::BlockNotFound(block_key))?;
        let block = &self.blocks[idx];
        let caret = block.clamp_offset(selection.focus.offset);

        let (start, end) = word_before(&block.text, caret).ok_or(ModelError::NothingToAnnotate)?;

        let mut doc = self.clone();

        // An existing comment entity overlapping the word absorbs the new
        // comment; otherwise a fresh entity is ranged over exactly the word.
        let existing = block
            .entity_ranges
            .iter()
            .filter(|r| r.start < end && r.end > start)
            .find(|r| {
                self.entities
                    .get(&r.entity)
                    .map(|e| e.is_comment())
                    .unwrap_or(false)
            })
            .map(|r| r.entity);

        match existing {
            Some(key) => {
                let entity = doc
                    .entities
                    .get(&key)
                    .ok_or_else(|| ModelError::EntityNotFound(key.to_string()))?;
                let EntityPayload::Comment { comments } = &entity.payload else {
                    return Err(ModelError::EntityNotFound(key.to_string()));
                };
                let mut comments = comments.clone();
                comments.push(comment);
                doc.entities.insert(
                    key,
                    Entity {
                        key,
                        payload: EntityPayload::Comment { comments },
                    },
                );
            }
            None => {
                let entity = Entity::new(EntityPayload::Comment {
                    comments: vec![comment],
                });
                let key = entity.key;
                doc.entities.insert(key, entity);
                doc.blocks[idx].entity_ranges.push(EntityRange {
                    start,
                    end,
                    entity: key,
                });
            }
        }

        let selection = doc.clamp_selection(*selection);
        Ok(EditOutcome { doc, selection })
    }

    /// Delete a top-level comment by id.
    ///
    /// With exactly one comment in the thread the entity's ranges are
    /// cleared (the entity stays in the table, unreferenced); with more the
    /// comment is spliced out of the list. Neither path counts as a
    /// structural edit, so collaborators only see it ride along with the
    /// next snapshot push.
    pub fn delete_comment(&self, comment_id: &str) -> Result<Document> {
        let (key, comments) = self.find_thread(comment_id)?;

        let mut doc = self.clone();
        if comments.len() == 1 {
            for block in &mut doc.blocks {
                block.entity_ranges.retain(|r| r.entity != key);
            }
        } else {
            let comments: Vec<Comment> = comments
                .iter()
                .filter(|c| c.id != comment_id)
                .cloned()
                .collect();
            doc.entities.insert(
                key,
                Entity {
                    key,
                    payload: EntityPayload::Comment { comments },
                },
            );
        }
        Ok(doc)
    }

    /// Append a reply to a top-level comment. Whole-payload replacement,
    /// like every entity mutation.
    pub fn add_reply(&self, comment_id: &str, reply: Comment) -> Result<Document> {
        self.replace_thread(comment_id, |comment| {
            comment.replies.push(reply.clone());
        })
    }

    /// Remove a reply from a top-level comment's reply list.
    pub fn delete_reply(&self, comment_id: &str, reply_id: &str) -> Result<Document> {
        let doc = self.replace_thread(comment_id, |comment| {
            comment.replies.retain(|r| r.id != reply_id);
        })?;
        Ok(doc)
    }

    /// All top-level comments in block order, then intra-block range-start
    /// order; each thread's comments keep insertion order.
    pub fn comments_in_order(&self) -> Vec<(EntityKey, &Comment)> {
        let mut seen: Vec<EntityKey> = Vec::new();
        for block in &self.blocks {
            let mut ranges: Vec<&EntityRange> = block.entity_ranges.iter().collect();
            ranges.sort_by_key(|r| r.start);
            for range in ranges {
                if seen.contains(&range.entity) {
                    continue;
                }
                match self.entities.get(&range.entity) {
                    Some(entity) if entity.is_comment() => seen.push(range.entity),
                    Some(_) => {}
                    None => {
                        warn!(entity = %range.entity, block = %block.key, "dangling entity range");
                    }
                }
            }
        }

        let mut out = Vec::new();
        for key in seen {
            if let Some(Entity {
                payload: EntityPayload::Comment { comments },
                ..
            }) = self.entities.get(&key)
            {
                for comment in comments {
                    out.push((key, comment));
                }
            }
        }
        out
    }

    fn find_thread(&self, comment_id: &str) -> Result<(EntityKey, &Vec<Comment>)> {
        for entity in self.entities.values() {
            if let EntityPayload::Comment { comments } = &entity.payload {
                if comments.iter().any(|c| c.id == comment_id) {
                    return Ok((entity.key, comments));
                }
            }
        }
        Err(ModelError::CommentNotFound(comment_id.to_string()))
    }

    fn replace_thread(
        &self,
        comment_id: &str,
        mut mutate: impl FnMut(&mut Comment),
    ) -> Result<Document> {
        let (key, comments) = self.find_thread(comment_id)?;
        let mut comments = comments.clone();
        for comment in &mut comments {
            if comment.id == comment_id {
                mutate(comment);
            }
        }
        let mut doc = self.clone();
        doc.entities.insert(
            key,
            Entity {
                key,
                payload: EntityPayload::Comment { comments },
            },
        );
        Ok(doc)
    }

    /// Keys of blocks carrying at least one comment range, in order.
    pub fn commented_blocks(&self) -> Vec<BlockKey> {
        self.blocks
            .iter()
            .filter(|b| {
                b.entity_ranges.iter().any(|r| {
                    self.entities
                        .get(&r.entity)
                        .map(|e| e.is_comment())
                        .unwrap_or(false)
                })
            })
            .map(|b| b.key)
            .collect()
    }
}
