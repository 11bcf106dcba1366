//! Collaborator seams: persistence, transport, identity, and assets are
//! injected behind traits so sessions stay explicit instances rather than
//! module-level singletons.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use quillpad_model::Snapshot;

use crate::error::Result;

/// Document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The current user, used for echo suppression and comment authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Identity collaborator.
pub trait Identity: Send + Sync {
    fn current_user(&self) -> UserInfo;
}

/// A fixed identity, handy for tests and single-user embedding.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub UserInfo);

impl Identity for StaticIdentity {
    fn current_user(&self) -> UserInfo {
        self.0.clone()
    }
}

/// Opaque token authorizing the transport connection.
#[derive(Debug, Clone)]
pub struct ConnectionToken(pub String);

/// Opaque token authorizing a per-document subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionToken(pub String);

/// One published snapshot with its publisher's identity.
#[derive(Debug, Clone)]
pub struct RemoteUpdate {
    pub publisher: String,
    pub snapshot: Snapshot,
}

/// A live per-document channel. Updates sent on `outbound` reach every
/// subscriber of the document, including the sender, whose own updates
/// come back as echoes.
pub struct RemoteChannel {
    pub outbound: mpsc::Sender<RemoteUpdate>,
    pub inbound: broadcast::Receiver<RemoteUpdate>,
}

/// Transport collaborator: token issuance plus the realtime channel.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connection_token(&self) -> Result<ConnectionToken>;

    async fn subscription_token(&self, doc: &DocId) -> Result<SubscriptionToken>;

    async fn connect(
        &self,
        doc: &DocId,
        connection: &ConnectionToken,
        subscription: &SubscriptionToken,
    ) -> Result<RemoteChannel>;
}

/// Persistence collaborator. Snapshots are the unit of transmission; there
/// is no delta format.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn fetch(&self, doc: &DocId) -> Result<Option<Snapshot>>;

    async fn push(&self, doc: &DocId, snapshot: &Snapshot) -> Result<()>;
}

/// Asset collaborator: raw bytes in, durable URL out. Must tolerate many
/// concurrent calls.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, mime: &str) -> Result<String>;
}
