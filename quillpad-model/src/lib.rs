//! Content model for quillpad documents.
//!
//! A document is a totally ordered sequence of typed [`Block`]s plus an
//! out-of-band table of [`Entity`] annotations (comment threads, links,
//! mentions) anchored to character ranges inside those blocks. All
//! structural operations are copy-on-write: they take the current
//! [`Document`] and return a new one together with a re-derived
//! [`Selection`], which is what keeps remote-snapshot application and
//! cursor recovery independent of structural sharing.

pub mod block;
pub mod comments;
pub mod document;
pub mod entity;
pub mod error;
pub mod selection;
pub mod snapshot;

pub use block::{Block, BlockKey, BlockType, EntityRange, StyleRange};
pub use document::{BlockSpec, Document, EditOutcome};
pub use entity::{Comment, Entity, EntityKey, EntityPayload};
pub use error::{ModelError, Result};
pub use selection::{Position, Selection};
pub use snapshot::Snapshot;
