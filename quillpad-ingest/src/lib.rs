//! Clipboard ingestion pipeline.
//!
//! Turns arbitrary external markup (or dropped files) into a deterministic
//! sequence of typed elements and materializes them as content-model
//! blocks. The pipeline walks markup in strict document order, never fails
//! on malformed input, and prefers degrading structure over dropping
//! content.

pub mod classify;
pub mod error;
pub mod fallback;
pub mod files;
pub mod lexer;
pub mod materialize;
pub mod tree;

pub use classify::{
    parse_markup, parse_markup_with, ClassifyOptions, ElementData, ElementType, ProcessedContent,
    ProcessedElement,
};
pub use error::{IngestError, Result};
pub use files::{files_to_content, PastedFile, MAX_INLINE_FILE_SIZE};
pub use materialize::insert_mixed_content;

use tracing::debug;

/// Result of the top-level dispatch: either structured content the caller
/// materializes via [`insert_mixed_content`], or a hand-back to the default
/// plain-text insertion path.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Structured(ProcessedContent),
    Fallthrough,
}

/// Tags whose presence makes the pipeline take over a paste. Plain-text and
/// plain-markup pastes stay with the default block-level insertion path.
pub fn should_ingest(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();
    ["<img", "<h1", "<h2", "<h3", "<ol", "<ul", "<table"]
        .iter()
        .any(|tag| lower.contains(tag))
}

/// Top-level dispatch: decide whether the pipeline takes over, run the
/// structural parse, and fall back to regex image extraction when the
/// structural parser produced nothing usable from image-bearing markup.
pub fn ingest_markup(markup: &str) -> IngestOutcome {
    ingest_markup_with(markup, &ClassifyOptions::default())
}

pub fn ingest_markup_with(markup: &str, options: &ClassifyOptions) -> IngestOutcome {
    if !should_ingest(markup) {
        return IngestOutcome::Fallthrough;
    }

    let content = parse_markup_with(markup, options);
    if content.is_structured() {
        return IngestOutcome::Structured(content);
    }

    if fallback::contains_img_tag(markup) {
        if let Some(content) = fallback::extract_images(markup) {
            debug!("structural parse unusable, using regex image fallback");
            return IngestOutcome::Structured(content);
        }
    }

    IngestOutcome::Fallthrough
}
