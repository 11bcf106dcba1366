//! Snapshots: the full serialized content model, used as the unit of
//! synchronization. There is no per-operation delta format; every publish
//! and receive carries the whole document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::{Entity, EntityKey};
use crate::Block;

/// A full serialized content model. Deep structural equality (`PartialEq`)
/// is what the sync engine uses to decide whether anything changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub blocks: Vec<Block>,
    pub entities: BTreeMap<EntityKey, Entity>,
}

impl Document {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            blocks: self.blocks.clone(),
            entities: self.entities.clone(),
        }
    }

    /// Rebuild a document from a snapshot. An empty snapshot (which a
    /// well-formed peer never produces) falls back to a fresh document
    /// rather than violating the one-block invariant.
    pub fn from_snapshot(snapshot: &Snapshot) -> Document {
        if snapshot.blocks.is_empty() {
            return Document::new("");
        }
        Document {
            blocks: snapshot.blocks.clone(),
            entities: snapshot.entities.clone(),
        }
    }
}
