/// Errors surfaced by the ingestion pipeline.
///
/// Parse problems never appear here: malformed markup degrades to "no
/// structured content" at the dispatch boundary instead of erroring.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("materialization failed: {0}")]
    Materialize(#[from] quillpad_model::ModelError),

    #[error("selection does not reference a live block")]
    InvalidInsertionPoint,
}

pub type Result<T> = std::result::Result<T, IngestError>;
