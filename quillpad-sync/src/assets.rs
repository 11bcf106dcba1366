//! Asset persistence: replace inline data-URL image sources with durable
//! URLs from the [`AssetStore`].
//!
//! Pasted and dropped images arrive as `data:` URLs so the paste itself
//! never waits on a network round trip. This pass runs afterwards, uploads
//! every inline payload concurrently, and rewrites the block data in one
//! copy-on-write step. An upload failure leaves that block's data URL in
//! place; nothing is lost, the next pass retries it.

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::join_all;
use tracing::warn;

use quillpad_model::{BlockKey, BlockType, Document};

use crate::traits::AssetStore;

/// Decoded payload of a `data:<mime>;base64,<payload>` URL.
fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

fn inline_src(doc: &Document, key: BlockKey) -> Option<String> {
    let block = doc.block(key)?;
    if block.block_type != BlockType::Image {
        return None;
    }
    block
        .data
        .get("src")
        .and_then(|v| v.as_str())
        .filter(|src| src.starts_with("data:"))
        .map(str::to_string)
}

/// Upload every inline image in the document and rewrite its `src` to the
/// durable URL. Returns the unchanged document when there is nothing to do.
pub async fn persist_inline_images(doc: &Document, store: &dyn AssetStore) -> Document {
    let pending: Vec<(BlockKey, String)> = doc
        .blocks
        .iter()
        .filter_map(|b| inline_src(doc, b.key).map(|src| (b.key, src)))
        .collect();
    if pending.is_empty() {
        return doc.clone();
    }

    let uploads = pending.into_iter().map(|(key, src)| async move {
        let Some((mime, bytes)) = decode_data_url(&src) else {
            warn!(block = %key, "undecodable data URL, leaving inline");
            return None;
        };
        match store.store(bytes, &mime).await {
            Ok(url) => Some((key, url)),
            Err(err) => {
                warn!(block = %key, ?err, "asset upload failed, leaving inline");
                None
            }
        }
    });

    let mut doc = doc.clone();
    for (key, url) in join_all(uploads).await.into_iter().flatten() {
        if let Ok(updated) = doc.set_block_data(key, "src", serde_json::json!(url)) {
            doc = updated;
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MemoryAssetStore;
    use quillpad_model::BlockSpec;

    fn doc_with_image(src: &str) -> (Document, BlockKey) {
        let doc = Document::new("Title");
        let title = doc.blocks[0].key;
        let outcome = doc
            .insert_block_after(
                title,
                BlockSpec::text(BlockType::Image, "").with_data("src", serde_json::json!(src)),
            )
            .unwrap();
        let key = outcome.doc.blocks[1].key;
        (outcome.doc, key)
    }

    #[test]
    fn data_url_decoding() {
        let encoded = STANDARD.encode(b"pixels");
        let url = format!("data:image/png;base64,{encoded}");
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"pixels");
        assert!(decode_data_url("https://a/b.png").is_none());
        assert!(decode_data_url("data:image/png;base64,!!!").is_none());
    }

    #[tokio::test]
    async fn inline_images_get_durable_urls() {
        let encoded = STANDARD.encode(b"img");
        let (doc, key) = doc_with_image(&format!("data:image/png;base64,{encoded}"));
        let store = MemoryAssetStore::new();

        let persisted = persist_inline_images(&doc, &store).await;
        let src = persisted.block(key).unwrap().data["src"].as_str().unwrap();
        assert!(src.starts_with("asset://"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remote_sources_are_left_alone() {
        let (doc, key) = doc_with_image("https://cdn.example/pic.png");
        let store = MemoryAssetStore::new();

        let persisted = persist_inline_images(&doc, &store).await;
        assert_eq!(persisted, doc);
        assert_eq!(
            persisted.block(key).unwrap().data["src"],
            serde_json::json!("https://cdn.example/pic.png")
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn undecodable_payload_stays_inline() {
        let (doc, key) = doc_with_image("data:image/png;base64,***");
        let store = MemoryAssetStore::new();

        let persisted = persist_inline_images(&doc, &store).await;
        assert!(persisted.block(key).unwrap().data["src"]
            .as_str()
            .unwrap()
            .starts_with("data:"));
        assert!(store.is_empty().await);
    }
}
