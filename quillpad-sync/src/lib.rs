//! Snapshot-based document synchronization.
//!
//! A [`DocSession`] owns one document's realtime lifecycle: it loads the
//! latest stored [`Snapshot`], opens a per-document channel through a
//! [`Transport`], debounces local edits into whole-snapshot publishes, and
//! applies remote snapshots while suppressing echoes of its own writes.
//!
//! All collaborators are injected as trait objects, so the same session
//! logic runs against the in-process [`LocalHub`] in tests and against a
//! network transport in production.

pub mod assets;
pub mod error;
pub mod hub;
pub mod session;
pub mod traits;

pub use assets::persist_inline_images;
pub use error::{Result, SyncError};
pub use hub::{FailingTransport, LocalHub, MemoryAssetStore, MemorySnapshotStore};
pub use session::{DocSession, SessionConfig, SessionState, SessionView};
pub use traits::{
    AssetStore, ConnectionToken, DocId, Identity, RemoteChannel, RemoteUpdate, SnapshotStore,
    StaticIdentity, SubscriptionToken, Transport, UserInfo,
};

pub use quillpad_model::Snapshot;
