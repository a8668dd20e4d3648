use thiserror::Error;

use sift_codec::DecodeError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Write attempted on a store that has transitioned to its packed,
    /// read-only form.
    #[error("store is sealed and rejects writes")]
    Sealed,

    /// Operation that needs the packed form ran on an open store.
    #[error("store is still open")]
    NotSealed,

    /// Stored bytes did not decode; indicates corruption, not user error.
    #[error("corrupt record storage: {0}")]
    Corrupt(#[from] DecodeError),

    /// A record references a template the store no longer knows.
    #[error("record references unknown template {0}")]
    UnknownTemplate(u64),

    /// The writer task is gone; its channel disconnected.
    #[error("record store writer has shut down")]
    WriterGone,
}
