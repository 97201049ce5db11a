#![forbid(unsafe_code)]

//! In-memory fake of the repository adapter, for tests across the
//! workspace. Models commit history, branch heads, atomic parent-checked
//! commit batches and instruments fetch counts.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use fnv::FnvHashMap;
use tokio::sync::Mutex;

use entrygraph_core::{
    adapter::{AdapterError, AdapterResult, CommitBatch, RepoAdapter},
    entry::Entry,
};

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Clone)]
struct CommitContent {
    entries: Vec<Entry>,
    schema: String,
}

struct RepoState {
    commits: FnvHashMap<String, CommitContent>,
    branches: FnvHashMap<String, String>,
    messages: FnvHashMap<String, String>,
    commit_counter: u64,
}

pub struct FakeRepo {
    state: Mutex<RepoState>,
    fetch_latency: Duration,
    entry_fetches: AtomicUsize,
}

impl FakeRepo {
    /// A repository with one seed commit `c0` at branch `main`.
    pub fn seeded(schema: &str, entries: Vec<Entry>) -> Self {
        let mut commits = FnvHashMap::default();
        commits.insert(
            "c0".to_string(),
            CommitContent {
                entries,
                schema: schema.to_string(),
            },
        );
        let mut branches = FnvHashMap::default();
        branches.insert("main".to_string(), "c0".to_string());

        Self {
            state: Mutex::new(RepoState {
                commits,
                branches,
                messages: FnvHashMap::default(),
                commit_counter: 0,
            }),
            fetch_latency: Duration::ZERO,
            entry_fetches: AtomicUsize::new(0),
        }
    }

    /// Make entry fetches take real time, so concurrent callers can race.
    pub fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    pub fn entry_fetch_count(&self) -> usize {
        self.entry_fetches.load(Ordering::SeqCst)
    }

    pub async fn head(&self, branch: &str) -> Option<String> {
        self.state.lock().await.branches.get(branch).cloned()
    }

    pub async fn commit_message(&self, commit_id: &str) -> Option<String> {
        self.state.lock().await.messages.get(commit_id).cloned()
    }

    /// Register an additional commit with arbitrary content, bypassing the
    /// commit protocol. Useful for filling the cache with distinct refs.
    pub async fn put_commit(&self, commit_id: &str, schema: &str, entries: Vec<Entry>) {
        self.state.lock().await.commits.insert(
            commit_id.to_string(),
            CommitContent {
                entries,
                schema: schema.to_string(),
            },
        );
    }
}

impl RepoState {
    fn resolve(&self, commit_ref: &str) -> AdapterResult<String> {
        if let Some(head) = self.branches.get(commit_ref) {
            return Ok(head.clone());
        }
        if self.commits.contains_key(commit_ref) {
            return Ok(commit_ref.to_string());
        }
        Err(AdapterError::new(
            "REF_NOT_FOUND",
            format!("unknown ref `{commit_ref}`"),
        ))
    }

    fn content(&self, commit_ref: &str) -> AdapterResult<&CommitContent> {
        let commit_id = self.resolve(commit_ref)?;
        self.commits.get(&commit_id).ok_or_else(|| {
            AdapterError::new("REF_NOT_FOUND", format!("unknown commit `{commit_id}`"))
        })
    }
}

#[async_trait::async_trait]
impl RepoAdapter for FakeRepo {
    async fn get_entries(&self, commit_ref: &str) -> AdapterResult<Vec<Entry>> {
        self.entry_fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_latency.is_zero() {
            tokio::time::sleep(self.fetch_latency).await;
        }
        let state = self.state.lock().await;
        Ok(state.content(commit_ref)?.entries.clone())
    }

    async fn get_schema(&self, commit_ref: &str) -> AdapterResult<String> {
        let state = self.state.lock().await;
        Ok(state.content(commit_ref)?.schema.clone())
    }

    async fn get_latest_commit_id(&self, commit_ref: &str) -> AdapterResult<String> {
        let state = self.state.lock().await;
        state.resolve(commit_ref)
    }

    async fn create_commit(&self, batch: CommitBatch) -> AdapterResult<String> {
        let mut state = self.state.lock().await;

        let head = state.resolve(&batch.commit_ref)?;
        if head != batch.parent_commit_id {
            return Err(AdapterError::new(
                "MERGE_CONFLICT",
                format!(
                    "ref `{}` is at `{head}`, not `{}`",
                    batch.commit_ref, batch.parent_commit_id
                ),
            ));
        }

        let mut content = state
            .commits
            .get(&head)
            .cloned()
            .ok_or_else(|| AdapterError::new("REF_NOT_FOUND", "head commit vanished"))?;

        for draft in &batch.entries {
            content.entries.retain(|entry| entry.id != draft.entry.id);
            if !draft.deletion {
                content.entries.push(draft.entry.clone());
            }
        }

        state.commit_counter += 1;
        let commit_id = format!("c{}", state.commit_counter);
        state.commits.insert(commit_id.clone(), content);
        state.messages.insert(commit_id.clone(), batch.message);
        if state.branches.contains_key(&batch.commit_ref) {
            state
                .branches
                .insert(batch.commit_ref.clone(), commit_id.clone());
        }

        Ok(commit_id)
    }
}
