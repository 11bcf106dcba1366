/// Errors from the synchronization collaborators.
///
/// None of these are retried automatically: a failed token fetch leaves the
/// session idle (collaboration simply not live), and a failed push leaves
/// the snapshot dirty for the next flush attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("token fetch failed: {0}")]
    TokenFetch(String),

    #[error("transport connect failed: {0}")]
    Connect(String),

    #[error("snapshot store failure: {0}")]
    Store(String),

    #[error("session is closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
