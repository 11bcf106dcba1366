//! Entity types: range-anchored annotations layered over block content.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for an entity. Identity is immutable; payloads are mutable
/// only by whole replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(pub Uuid);

impl EntityKey {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One comment in a thread. Replies nest through the same type and keep
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            message: message.into(),
            created_at: Utc::now(),
            replies: Vec::new(),
        }
    }
}

/// Typed annotation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EntityPayload {
    /// An ordered comment thread anchored to a word.
    Comment { comments: Vec<Comment> },
    Link {
        url: String,
        target: String,
    },
    Mention {
        kind: String,
        #[serde(default)]
        url: Option<String>,
    },
}

/// An out-of-band annotation record referenced by one or more
/// [`EntityRange`](crate::block::EntityRange)s.
///
/// Entities are never garbage-collected automatically: an entity whose last
/// range disappears stays in the table until an explicit
/// [`compact_entities`](crate::Document::compact_entities) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub payload: EntityPayload,
}

impl Entity {
    pub fn new(payload: EntityPayload) -> Self {
        Self {
            key: EntityKey::fresh(),
            payload,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.payload, EntityPayload::Comment { .. })
    }
}
