//! In-process transport and stores.
//!
//! [`LocalHub`] fans every published snapshot out to all subscribers of a
//! document, including the publisher itself, which is exactly the echo
//! behavior sessions must suppress. Useful for tests and for single-process
//! multi-view embedding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use quillpad_model::Snapshot;

use crate::error::{Result, SyncError};
use crate::traits::{
    AssetStore, ConnectionToken, DocId, RemoteChannel, RemoteUpdate, SnapshotStore,
    SubscriptionToken, Transport,
};

const ROOM_CAPACITY: usize = 64;

struct Room {
    tx: broadcast::Sender<RemoteUpdate>,
    latest: RwLock<Option<RemoteUpdate>>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(ROOM_CAPACITY);
        Self {
            tx,
            latest: RwLock::new(None),
        }
    }
}

/// In-process realtime hub keyed by document.
#[derive(Default)]
pub struct LocalHub {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn room(&self, doc: &DocId) -> Arc<Room> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(doc.as_str()) {
                return room.clone();
            }
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(doc.as_str().to_string())
            .or_insert_with(|| Arc::new(Room::new()))
            .clone()
    }

    /// Last update published to a document, if any.
    pub async fn latest(&self, doc: &DocId) -> Option<RemoteUpdate> {
        let room = self.room(doc).await;
        let latest = room.latest.read().await;
        latest.clone()
    }
}

#[async_trait]
impl Transport for LocalHub {
    async fn connection_token(&self) -> Result<ConnectionToken> {
        Ok(ConnectionToken(Uuid::new_v4().to_string()))
    }

    async fn subscription_token(&self, doc: &DocId) -> Result<SubscriptionToken> {
        Ok(SubscriptionToken(format!("{}:{}", doc.as_str(), Uuid::new_v4())))
    }

    async fn connect(
        &self,
        doc: &DocId,
        _connection: &ConnectionToken,
        _subscription: &SubscriptionToken,
    ) -> Result<RemoteChannel> {
        let room = self.room(doc).await;
        let inbound = room.tx.subscribe();
        let (outbound, mut rx) = mpsc::channel::<RemoteUpdate>(ROOM_CAPACITY);

        let doc = doc.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                {
                    let mut latest = room.latest.write().await;
                    *latest = Some(update.clone());
                }
                // send only errs with zero subscribers, which is fine
                let _ = room.tx.send(update);
                debug!(doc = %doc.as_str(), "update fanned out");
            }
        });

        Ok(RemoteChannel { outbound, inbound })
    }
}

/// In-memory snapshot store. Counts pushes so tests can assert debounce
/// coalescing.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
    pushes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn fetch(&self, doc: &DocId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(doc.as_str()).cloned())
    }

    async fn push(&self, doc: &DocId, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(doc.as_str().to_string(), snapshot.clone());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport whose token fetches always fail. Sessions opened against it
/// stay idle but remain fully editable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn connection_token(&self) -> Result<ConnectionToken> {
        Err(SyncError::TokenFetch("connection token unavailable".into()))
    }

    async fn subscription_token(&self, _doc: &DocId) -> Result<SubscriptionToken> {
        Err(SyncError::TokenFetch(
            "subscription token unavailable".into(),
        ))
    }

    async fn connect(
        &self,
        _doc: &DocId,
        _connection: &ConnectionToken,
        _subscription: &SubscriptionToken,
    ) -> Result<RemoteChannel> {
        Err(SyncError::Connect("transport unavailable".into()))
    }
}

/// In-memory asset store handing out stable fake URLs.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn store(&self, bytes: Vec<u8>, mime: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let url = format!("asset://{id}");
        let mut assets = self.assets.write().await;
        assets.insert(id, (bytes, mime.to_string()));
        Ok(url)
    }
}
