use std::sync::{Arc, Mutex};

use fnv::FnvHashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{adapter::ArcRepoAdapter, entry::Entry, StoreError, StoreResult};

pub const DEFAULT_CAPACITY: usize = 50;

/// The parsed content of one commit ref: entries indexed by id and by
/// type (stable input order per type), plus the raw schema text.
///
/// Committed content is immutable, so a record never goes stale while its
/// ref exists.
#[derive(Debug)]
pub struct CacheRecord {
    by_id: FnvHashMap<String, Entry>,
    by_type: FnvHashMap<String, Vec<Entry>>,
    schema: String,
}

impl CacheRecord {
    pub fn from_parts(entries: Vec<Entry>, schema: String) -> Self {
        let mut by_id = FnvHashMap::default();
        let mut by_type: FnvHashMap<String, Vec<Entry>> = FnvHashMap::default();

        for entry in entries {
            by_type
                .entry(entry.metadata.type_name.clone())
                .or_default()
                .push(entry.clone());
            by_id.insert(entry.id.clone(), entry);
        }

        Self {
            by_id,
            by_type,
            schema,
        }
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.by_id.get(id)
    }

    pub fn entries_of_type(&self, type_name: &str) -> &[Entry] {
        self.by_type
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

type SharedFetch = Shared<BoxFuture<'static, StoreResult<Arc<CacheRecord>>>>;

enum Slot {
    /// A fetch is outstanding; all concurrent callers share it.
    Pending(SharedFetch),
    Resolved(Arc<CacheRecord>),
}

/// Per-commit-ref cache of parsed repository content.
///
/// State machine per ref: absent → pending → resolved. Bounded by ref
/// count, evicted least-recently-used. Failed fetches are not cached.
pub struct RepoCache {
    adapter: ArcRepoAdapter,
    capacity: usize,
    /// Recency order: index 0 is least recently used.
    slots: Mutex<IndexMap<String, Slot>>,
}

impl RepoCache {
    pub fn new(adapter: ArcRepoAdapter) -> Self {
        Self::with_capacity(adapter, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(adapter: ArcRepoAdapter, capacity: usize) -> Self {
        Self {
            adapter,
            capacity: capacity.max(1),
            slots: Mutex::new(IndexMap::new()),
        }
    }

    /// Resolve `commit_ref` to its cached record, fetching through the
    /// adapter on miss. Two callers racing on the same absent ref share
    /// one underlying fetch.
    pub async fn get(&self, commit_ref: &str) -> StoreResult<Arc<CacheRecord>> {
        let fetch = {
            let mut slots = self.slots.lock().unwrap();

            if let Some(index) = slots.get_index_of(commit_ref) {
                let last = slots.len() - 1;
                slots.move_index(index, last);

                match slots.get(commit_ref) {
                    Some(Slot::Resolved(record)) => {
                        trace!(%commit_ref, "cache hit");
                        return Ok(record.clone());
                    }
                    Some(Slot::Pending(shared)) => {
                        trace!(%commit_ref, "joining in-flight fetch");
                        shared.clone()
                    }
                    None => {
                        return Err(StoreError::internal("cache slot vanished under lock"));
                    }
                }
            } else {
                debug!(%commit_ref, "cache miss, fetching");
                let shared = spawn_fetch(self.adapter.clone(), commit_ref.to_string());
                slots.insert(commit_ref.to_string(), Slot::Pending(shared.clone()));
                shared
            }
        };

        let result = fetch.await;
        self.settle(commit_ref, &result);
        result
    }

    /// Number of cached (or in-flight) refs.
    pub fn cached_refs(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn contains(&self, commit_ref: &str) -> bool {
        self.slots.lock().unwrap().contains_key(commit_ref)
    }

    fn settle(&self, commit_ref: &str, result: &StoreResult<Arc<CacheRecord>>) {
        let mut slots = self.slots.lock().unwrap();

        match result {
            Ok(record) => {
                if let Some(slot) = slots.get_mut(commit_ref) {
                    if matches!(slot, Slot::Pending(_)) {
                        *slot = Slot::Resolved(record.clone());
                    }
                }

                // Evict by recency, never an in-flight fetch.
                while slots.len() > self.capacity {
                    let Some(index) = slots
                        .values()
                        .position(|slot| matches!(slot, Slot::Resolved(_)))
                    else {
                        break;
                    };
                    if let Some((evicted, _)) = slots.shift_remove_index(index) {
                        debug!(%evicted, "evicting least recently used ref");
                    }
                }
            }
            Err(error) => {
                // Leave the ref absent for the next caller.
                debug!(%commit_ref, %error, "fetch failed, not cached");
                if let Some(Slot::Pending(_)) = slots.get(commit_ref) {
                    slots.shift_remove(commit_ref);
                }
            }
        }
    }
}

fn spawn_fetch(adapter: ArcRepoAdapter, commit_ref: String) -> SharedFetch {
    async move {
        let entries = adapter
            .get_entries(&commit_ref)
            .await
            .map_err(StoreError::from)?;
        let schema = adapter
            .get_schema(&commit_ref)
            .await
            .map_err(StoreError::from)?;

        Ok(Arc::new(CacheRecord::from_parts(entries, schema)))
    }
    .boxed()
    .shared()
}
