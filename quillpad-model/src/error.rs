use crate::block::BlockKey;

/// Errors that can occur while mutating the content model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("block not found: {0}")]
    BlockNotFound(BlockKey),

    #[error("cannot delete the only block in a document")]
    LastBlock,

    #[error("cannot merge the first block backward")]
    NoPredecessor,

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("comment not found: {0}")]
    CommentNotFound(String),

    /// The caret has no preceding non-whitespace token to annotate.
    /// Callers map this to a disabled state, not a user-visible failure.
    #[error("no word before the caret to annotate")]
    NothingToAnnotate,
}

pub type Result<T> = std::result::Result<T, ModelError>;
