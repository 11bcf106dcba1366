//! Dropped/pasted files: image files become data-URL image elements fed
//! through the same materialization path as parsed markup.

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::join_all;
use tracing::warn;

use crate::classify::{ElementData, ProcessedContent, ProcessedElement};

/// A file delivered by drag/drop or the OS clipboard.
#[derive(Debug, Clone)]
pub struct PastedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Files above this size are skipped rather than inlined as data-URLs.
pub const MAX_INLINE_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Convert pasted files to a pure-image content set.
///
/// Non-image MIME types are filtered out; conversions run concurrently and
/// the result preserves input order.
pub async fn files_to_content(files: Vec<PastedFile>) -> ProcessedContent {
    let conversions = files
        .into_iter()
        .filter(|file| {
            if file.mime.starts_with("image/") {
                true
            } else {
                warn!(name = %file.name, mime = %file.mime, "skipping non-image file");
                false
            }
        })
        .map(|file| async move { file_to_data_url(file).await });

    let elements: Vec<ProcessedElement> = join_all(conversions)
        .await
        .into_iter()
        .flatten()
        .collect();

    ProcessedContent {
        has_images: !elements.is_empty(),
        elements,
    }
}

async fn file_to_data_url(file: PastedFile) -> Option<ProcessedElement> {
    if file.bytes.len() > MAX_INLINE_FILE_SIZE {
        warn!(name = %file.name, size = file.bytes.len(), "file too large to inline");
        return None;
    }
    let encoded = STANDARD.encode(&file.bytes);
    let url = format!("data:{};base64,{}", file.mime, encoded);
    Some(ProcessedElement::image(
        url,
        ElementData {
            alt: Some(file.name),
            title: None,
        },
    ))
}
