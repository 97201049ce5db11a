use std::sync::Arc;

use thiserror::Error;

use crate::{
    entry::{Entry, EntryDraft},
    StoreError, StoreErrorKind,
};

/// An atomic multi-entry change against one ref.
///
/// `parent_commit_id` must equal the ref's current head, otherwise the
/// adapter must reject the whole batch.
#[derive(Clone, Debug)]
pub struct CommitBatch {
    pub commit_ref: String,
    pub parent_commit_id: String,
    pub entries: Vec<EntryDraft>,
    pub message: String,
}

/// Provider-side failure, carrying the provider's own error code.
#[derive(Error, Clone, Debug)]
#[error("{code}: {message}")]
pub struct AdapterError {
    pub code: String,
    pub message: String,
}

impl AdapterError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<AdapterError> for StoreError {
    fn from(err: AdapterError) -> Self {
        StoreErrorKind::Adapter {
            code: err.code,
            message: err.message,
        }
        .into_error()
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// The remote repository adapter contract.
///
/// Implementations talk to a concrete hosting provider; this crate only
/// consumes the contract. A `commit_ref` may be a branch name or a literal
/// commit id; `get_latest_commit_id` resolves it to the latter.
#[async_trait::async_trait]
pub trait RepoAdapter: Send + Sync {
    async fn get_entries(&self, commit_ref: &str) -> AdapterResult<Vec<Entry>>;

    async fn get_schema(&self, commit_ref: &str) -> AdapterResult<String>;

    async fn get_latest_commit_id(&self, commit_ref: &str) -> AdapterResult<String>;

    /// Apply one atomic commit batch, returning the new commit id.
    async fn create_commit(&self, batch: CommitBatch) -> AdapterResult<String>;
}

/// A [RepoAdapter] in an [Arc].
pub type ArcRepoAdapter = Arc<dyn RepoAdapter>;
