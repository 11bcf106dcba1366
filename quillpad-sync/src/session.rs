//! Per-document synchronization session.
//!
//! State machine: `Idle -> Connected -> Closed`. Tokens are fetched
//! independently and the channel only opens once both are present; a
//! failed fetch leaves the session idle, where edits still apply locally
//! and persist but collaboration is not live.
//!
//! Outbound, every local edit restarts a debounce timer; on expiry the
//! snapshot is pushed iff it differs (deep equality) from the last-known
//! server state. Inbound, remote snapshots rebuild the live model while
//! re-forcing the pre-update selection, and echoes of the session's own
//! writes update bookkeeping only.
//!
//! Consistency is last-writer-visible by design: the unit of exchange is
//! whole-document replacement, so concurrent edits within one debounce
//! window overwrite each other rather than merging.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use quillpad_model::{Document, Selection, Snapshot};

use crate::traits::{DocId, Identity, RemoteUpdate, SnapshotStore, Transport, UserInfo};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after the last local edit before a snapshot publish.
    pub debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live channel; edits persist locally only.
    Idle,
    Connected,
    Closed,
}

/// Observable session state, published on every change.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub state: SessionState,
    pub snapshot: Snapshot,
    pub selection: Selection,
    /// Local changes not yet flushed to the store.
    pub dirty: bool,
}

enum SessionCommand {
    LocalEdit {
        snapshot: Snapshot,
        selection: Selection,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to a running document session.
pub struct DocSession {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
}

impl DocSession {
    /// Open a session: load the latest stored snapshot, fetch both tokens,
    /// and connect the realtime channel when both are present.
    pub async fn open(
        doc_id: DocId,
        identity: Arc<dyn Identity>,
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Self> {
        let user = identity.current_user();

        let initial = match store.fetch(&doc_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(doc = %doc_id.as_str(), ?err, "initial snapshot fetch failed, starting empty");
                None
            }
        };
        let document = initial
            .as_ref()
            .map(Document::from_snapshot)
            .unwrap_or_else(|| Document::new(""));
        let snapshot = document.snapshot();
        let selection = document.end_selection();

        let connection = transport.connection_token().await;
        let subscription = transport.subscription_token(&doc_id).await;
        let channel = match (connection, subscription) {
            (Ok(connection), Ok(subscription)) => {
                match transport.connect(&doc_id, &connection, &subscription).await {
                    Ok(channel) => Some(channel),
                    Err(err) => {
                        warn!(doc = %doc_id.as_str(), ?err, "connect failed; collaboration not live");
                        None
                    }
                }
            }
            (connection, subscription) => {
                if let Err(err) = &connection {
                    warn!(doc = %doc_id.as_str(), ?err, "connection token fetch failed");
                }
                if let Err(err) = &subscription {
                    warn!(doc = %doc_id.as_str(), ?err, "subscription token fetch failed");
                }
                None
            }
        };

        let state = if channel.is_some() {
            SessionState::Connected
        } else {
            SessionState::Idle
        };
        info!(doc = %doc_id.as_str(), user = %user.id, ?state, "session opened");

        let (view_tx, view_rx) = watch::channel(SessionView {
            state,
            snapshot: snapshot.clone(),
            selection,
            dirty: false,
        });
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let (outbound, inbound) = match channel {
            Some(channel) => (Some(channel.outbound), Some(channel.inbound)),
            None => (None, None),
        };

        let worker = SessionWorker {
            doc_id,
            user,
            store,
            config,
            outbound,
            state,
            current: snapshot,
            selection,
            server_state: initial.clone(),
            last_saved: initial,
            dirty: false,
            deadline: None,
            view: view_tx,
        };
        tokio::spawn(worker.run(cmd_rx, inbound));

        Ok(Self {
            commands: cmd_tx,
            view: view_rx,
        })
    }

    /// Current observable state.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that resolves whenever the session view changes.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Record a local edit. Restarts the debounce timer.
    pub async fn edit(&self, snapshot: Snapshot, selection: Selection) -> Result<()> {
        self.commands
            .send(SessionCommand::LocalEdit {
                snapshot,
                selection,
            })
            .await
            .map_err(|_| anyhow!("session is closed"))
    }

    /// Close the session: flush unsaved changes, then tear down the
    /// subscription and connection deterministically.
    pub async fn close(self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::Close { ack })
            .await
            .map_err(|_| anyhow!("session already closed"))?;
        done.await.map_err(|_| anyhow!("session worker vanished"))?;
        Ok(())
    }
}

struct SessionWorker {
    doc_id: DocId,
    user: UserInfo,
    store: Arc<dyn SnapshotStore>,
    config: SessionConfig,
    outbound: Option<mpsc::Sender<RemoteUpdate>>,
    state: SessionState,
    /// Live local snapshot.
    current: Snapshot,
    selection: Selection,
    /// Equality-normalized view of what the server last showed us.
    server_state: Option<Snapshot>,
    /// What we last pushed (or loaded) ourselves.
    last_saved: Option<Snapshot>,
    dirty: bool,
    deadline: Option<Instant>,
    view: watch::Sender<SessionView>,
}

impl SessionWorker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut inbound: Option<broadcast::Receiver<RemoteUpdate>>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::LocalEdit { snapshot, selection }) => {
                        self.note_local_edit(snapshot, selection);
                    }
                    Some(SessionCommand::Close { ack }) => {
                        // final flush so the last edit burst is not lost
                        self.flush_if_dirty().await;
                        self.state = SessionState::Closed;
                        self.publish_view();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.flush_if_dirty().await;
                        break;
                    }
                },
                _ = debounce_expiry(self.deadline) => {
                    self.deadline = None;
                    self.flush_if_dirty().await;
                }
                update = next_update(&mut inbound) => match update {
                    Ok(update) => self.apply_remote(update),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(doc = %self.doc_id.as_str(), missed, "inbound stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(doc = %self.doc_id.as_str(), "transport closed; collaboration no longer live");
                        inbound = None;
                        self.state = SessionState::Idle;
                        self.outbound = None;
                        self.publish_view();
                    }
                },
            }
        }
    }

    fn note_local_edit(&mut self, snapshot: Snapshot, selection: Selection) {
        self.current = snapshot;
        self.selection = selection;
        self.dirty = true;
        self.deadline = Some(Instant::now() + self.config.debounce);
        self.publish_view();
    }

    /// Inbound path. Every update refreshes server-state bookkeeping; only
    /// foreign, genuinely different snapshots touch the live model.
    fn apply_remote(&mut self, update: RemoteUpdate) {
        self.server_state = Some(update.snapshot.clone());

        if update.publisher == self.user.id {
            debug!(doc = %self.doc_id.as_str(), "suppressing echo of own publish");
            return;
        }
        if self.last_saved.as_ref() == Some(&update.snapshot) {
            return;
        }

        // Whole-document replacement: any un-pushed local changes are
        // overwritten here. Last-writer-visible, by contract.
        let document = Document::from_snapshot(&update.snapshot);
        self.selection = document.clamp_selection(self.selection);
        self.current = update.snapshot;
        self.dirty = false;
        self.deadline = None;
        self.publish_view();
    }

    async fn flush_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }

        let reference = self.server_state.as_ref().or(self.last_saved.as_ref());
        if reference == Some(&self.current) {
            self.dirty = false;
            self.publish_view();
            return;
        }

        match self.store.push(&self.doc_id, &self.current).await {
            Ok(()) => {
                self.last_saved = Some(self.current.clone());
                self.dirty = false;
                if let Some(outbound) = &self.outbound {
                    let update = RemoteUpdate {
                        publisher: self.user.id.clone(),
                        snapshot: self.current.clone(),
                    };
                    if outbound.send(update).await.is_err() {
                        warn!(doc = %self.doc_id.as_str(), "publish channel closed");
                    }
                }
                self.publish_view();
            }
            Err(err) => {
                // stays dirty; the next edit or close retries
                warn!(doc = %self.doc_id.as_str(), ?err, "snapshot push failed");
            }
        }
    }

    fn publish_view(&self) {
        self.view.send_replace(SessionView {
            state: self.state,
            snapshot: self.current.clone(),
            selection: self.selection,
            dirty: self.dirty,
        });
    }
}

async fn debounce_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}

async fn next_update(
    inbound: &mut Option<broadcast::Receiver<RemoteUpdate>>,
) -> std::result::Result<RemoteUpdate, broadcast::error::RecvError> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
