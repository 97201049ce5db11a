//! Operation resolvers over the repository: list/count/by-id reads and
//! create/update/delete mutations with transactional back-reference
//! bookkeeping.

use std::{collections::BTreeSet, sync::Arc};

use indexmap::{map::Entry as MapSlot, IndexMap};
use itertools::Itertools;
use serde_json::{Map, Value};
use tracing::debug;

use entrygraph_core::{
    adapter::{ArcRepoAdapter, CommitBatch},
    cache::{CacheRecord, RepoCache},
    entry::{Entry, EntryDraft},
    Resolved, StoreError, StoreResult,
};

use crate::{
    analyzer::{self, AnalyzedSchema},
    operation_gen::Operation,
    refgraph, validate,
};

/// One consistent view of a ref: the concrete commit id it resolved to,
/// the parsed entries, and the analyzed schema at that commit.
pub struct Snapshot {
    pub commit_id: String,
    pub record: Arc<CacheRecord>,
    pub schema: AnalyzedSchema,
}

/// The CRUD resolver surface bound to one repository.
pub struct EntryStore {
    adapter: ArcRepoAdapter,
    cache: Arc<RepoCache>,
}

/// Arguments of one generated operation, as supplied by the execution
/// engine.
#[derive(Clone, Debug, Default)]
pub struct OperationArgs {
    pub id: Option<String>,
    pub data: Option<Value>,
    pub commit_message: Option<String>,
}

impl EntryStore {
    pub fn new(adapter: ArcRepoAdapter, cache: Arc<RepoCache>) -> Self {
        Self { adapter, cache }
    }

    /// Resolve `commit_ref` to a concrete commit and load its content.
    /// All reads of one operation go through the returned snapshot, so the
    /// operation observes a single consistent state even when the ref is a
    /// moving branch name.
    pub async fn snapshot(&self, commit_ref: &str) -> StoreResult<Snapshot> {
        let commit_id = self
            .adapter
            .get_latest_commit_id(commit_ref)
            .await
            .map_err(StoreError::from)?;
        let record = self.cache.get(&commit_id).await?;

        let document = analyzer::parse_sdl(record.schema())?;
        let schema = analyzer::analyze_schema(&document);
        validate::validate_schema(&schema)?;

        Ok(Snapshot {
            commit_id,
            record,
            schema,
        })
    }

    /// Dispatch one generated operation.
    pub async fn execute(
        &self,
        commit_ref: &str,
        operation: &Operation,
        args: OperationArgs,
    ) -> StoreResult<Resolved<Value>> {
        match operation {
            Operation::ListAll { type_name } => {
                let listed = self.all_entries(commit_ref, type_name).await?;
                Ok(listed.map(Value::Array))
            }
            Operation::CountMeta { type_name } => {
                let counted = self.entry_count(commit_ref, type_name).await?;
                Ok(counted.map(|count| {
                    let mut map = Map::new();
                    map.insert("count".to_string(), Value::from(count as u64));
                    Value::Object(map)
                }))
            }
            Operation::ById { type_name } => {
                let id = require_id(&args)?;
                self.entry_by_id(commit_ref, type_name, &id).await
            }
            Operation::TypeName => {
                let id = require_id(&args)?;
                let resolved = self.type_name_of(commit_ref, &id).await?;
                Ok(resolved.map(Value::String))
            }
            Operation::Create { type_name } => {
                let id = require_id(&args)?;
                let data = require_data(args.data)?;
                self.create_entry(commit_ref, type_name, &id, data, args.commit_message)
                    .await
            }
            Operation::Update { type_name } => {
                let id = require_id(&args)?;
                let data = require_data(args.data)?;
                self.update_entry(commit_ref, type_name, &id, data, args.commit_message)
                    .await
            }
            Operation::Delete { type_name } => {
                let id = require_id(&args)?;
                let resolved = self
                    .delete_entry(commit_ref, type_name, &id, args.commit_message)
                    .await?;
                Ok(resolved.map(Value::String))
            }
        }
    }

    pub async fn all_entries(
        &self,
        commit_ref: &str,
        type_name: &str,
    ) -> StoreResult<Resolved<Vec<Value>>> {
        let snapshot = self.snapshot(commit_ref).await?;
        let values = snapshot
            .record
            .entries_of_type(type_name)
            .iter()
            .map(Entry::to_output)
            .collect::<StoreResult<Vec<Value>>>()?;
        Ok(Resolved::new(values, snapshot.commit_id))
    }

    pub async fn entry_count(
        &self,
        commit_ref: &str,
        type_name: &str,
    ) -> StoreResult<Resolved<usize>> {
        let snapshot = self.snapshot(commit_ref).await?;
        let count = snapshot.record.entries_of_type(type_name).len();
        Ok(Resolved::new(count, snapshot.commit_id))
    }

    pub async fn entry_by_id(
        &self,
        commit_ref: &str,
        type_name: &str,
        id: &str,
    ) -> StoreResult<Resolved<Value>> {
        let snapshot = self.snapshot(commit_ref).await?;
        let entry = snapshot
            .record
            .entry(id)
            .filter(|entry| entry.metadata.type_name == type_name)
            .ok_or_else(|| {
                StoreError::not_found(format!("no {type_name} with id `{id}`"))
                    .with_argument("id", id)
                    .with_type(type_name)
            })?;
        Ok(Resolved::new(entry.to_output()?, snapshot.commit_id))
    }

    pub async fn type_name_of(&self, commit_ref: &str, id: &str) -> StoreResult<Resolved<String>> {
        let snapshot = self.snapshot(commit_ref).await?;
        let entry = snapshot.record.entry(id).ok_or_else(|| {
            StoreError::not_found(format!("no entry with id `{id}`")).with_argument("id", id)
        })?;
        Ok(Resolved::new(
            entry.metadata.type_name.clone(),
            snapshot.commit_id,
        ))
    }

    pub async fn create_entry(
        &self,
        commit_ref: &str,
        type_name: &str,
        id: &str,
        data: Value,
        commit_message: Option<String>,
    ) -> StoreResult<Resolved<Value>> {
        let snapshot = self.snapshot(commit_ref).await?;
        require_entry_type(&snapshot.schema, type_name)?;
        validate_entry_id(id)?;

        if snapshot.record.entry(id).is_some() {
            return Err(
                StoreError::bad_user_input(format!("entry `{id}` already exists"))
                    .with_argument("id", id)
                    .with_type(type_name),
            );
        }

        let referenced = refgraph::referenced_ids(
            &snapshot.schema,
            &snapshot.record,
            type_name,
            &data,
            Some((id, type_name)),
        )?;

        let mut drafts = DraftSet::new(&snapshot.record);
        drafts.put(Entry::new(id, type_name, Some(data)));
        for target in &referenced {
            drafts.entry_mut(target)?.add_back_reference(id);
        }

        let message =
            commit_message.unwrap_or_else(|| format!("Create {type_name} {id}"));
        let new_commit = self
            .commit(commit_ref, &snapshot.commit_id, drafts.into_upserts(), message)
            .await?;

        self.read_back(&new_commit, id).await
    }

    pub async fn update_entry(
        &self,
        commit_ref: &str,
        type_name: &str,
        id: &str,
        data: Value,
        commit_message: Option<String>,
    ) -> StoreResult<Resolved<Value>> {
        let snapshot = self.snapshot(commit_ref).await?;
        require_entry_type(&snapshot.schema, type_name)?;
        let existing = existing_entry(&snapshot, type_name, id)?;

        // shallow merge: supplied null clears a field, an omitted field
        // retains its value, nested objects are replaced wholesale
        let mut merged = match &existing.data {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Map::new(),
        };
        let Value::Object(patch) = data else {
            return Err(StoreError::bad_user_input("data must be an object")
                .with_argument("data", data.to_string()));
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }

        let old_referenced = match &existing.data {
            Some(stored) => {
                refgraph::referenced_ids(&snapshot.schema, &snapshot.record, type_name, stored, None)?
            }
            None => BTreeSet::new(),
        };
        let merged_value = Value::Object(merged);
        let new_referenced = refgraph::referenced_ids(
            &snapshot.schema,
            &snapshot.record,
            type_name,
            &merged_value,
            Some((id, type_name)),
        )?;
        let diff = refgraph::diff_reference_sets(&old_referenced, &new_referenced);

        let mut updated = existing.clone();
        updated.data = Some(merged_value);

        let mut drafts = DraftSet::new(&snapshot.record);
        drafts.put(updated);
        for target in &diff.removed {
            drafts.entry_mut(target)?.remove_back_reference(id);
        }
        for target in &diff.added {
            drafts.entry_mut(target)?.add_back_reference(id);
        }

        let message =
            commit_message.unwrap_or_else(|| format!("Update {type_name} {id}"));
        let new_commit = self
            .commit(commit_ref, &snapshot.commit_id, drafts.into_upserts(), message)
            .await?;

        self.read_back(&new_commit, id).await
    }

    pub async fn delete_entry(
        &self,
        commit_ref: &str,
        type_name: &str,
        id: &str,
        commit_message: Option<String>,
    ) -> StoreResult<Resolved<String>> {
        let snapshot = self.snapshot(commit_ref).await?;
        require_entry_type(&snapshot.schema, type_name)?;
        let existing = existing_entry(&snapshot, type_name, id)?;

        if !existing.metadata.referenced_by.is_empty() {
            return Err(StoreError::in_use(format!(
                "entry `{id}` is referenced by: {}",
                existing.metadata.referenced_by.iter().join(", ")
            ))
            .with_argument("id", id)
            .with_type(type_name));
        }

        let referenced = match &existing.data {
            Some(stored) => {
                refgraph::referenced_ids(&snapshot.schema, &snapshot.record, type_name, stored, None)?
            }
            None => BTreeSet::new(),
        };

        let mut drafts = DraftSet::new(&snapshot.record);
        for target in &referenced {
            if target == id {
                // the self back-reference disappears with the entry
                continue;
            }
            drafts.entry_mut(target)?.remove_back_reference(id);
        }

        let mut batch = drafts.into_upserts();
        batch.push(EntryDraft::deletion(existing.clone()));

        let message =
            commit_message.unwrap_or_else(|| format!("Delete {type_name} {id}"));
        let new_commit = self
            .commit(commit_ref, &snapshot.commit_id, batch, message)
            .await?;

        Ok(Resolved::new(id.to_string(), new_commit))
    }

    async fn commit(
        &self,
        commit_ref: &str,
        parent_commit_id: &str,
        entries: Vec<EntryDraft>,
        message: String,
    ) -> StoreResult<String> {
        debug!(
            %commit_ref,
            %parent_commit_id,
            drafts = entries.len(),
            %message,
            "submitting commit batch"
        );
        self.adapter
            .create_commit(CommitBatch {
                commit_ref: commit_ref.to_string(),
                parent_commit_id: parent_commit_id.to_string(),
                entries,
                message,
            })
            .await
            .map_err(StoreError::from)
    }

    /// The cache only ever mirrors adapter reads; after a commit the new
    /// ref is populated by reading back through the adapter, never from
    /// locally computed entries.
    async fn read_back(&self, commit_id: &str, id: &str) -> StoreResult<Resolved<Value>> {
        let record = self.cache.get(commit_id).await?;
        let entry = record.entry(id).ok_or_else(|| {
            StoreError::internal(format!(
                "entry `{id}` missing from commit `{commit_id}` after write"
            ))
        })?;
        Ok(Resolved::new(entry.to_output()?, commit_id))
    }
}

/// Accumulates the entries touched by one mutation, pulling untouched
/// entries from the snapshot on first access so that multiple patches to
/// the same entry compose.
struct DraftSet<'a> {
    record: &'a CacheRecord,
    entries: IndexMap<String, Entry>,
}

impl<'a> DraftSet<'a> {
    fn new(record: &'a CacheRecord) -> Self {
        Self {
            record,
            entries: IndexMap::new(),
        }
    }

    fn put(&mut self, entry: Entry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    fn entry_mut(&mut self, id: &str) -> StoreResult<&mut Entry> {
        match self.entries.entry(id.to_string()) {
            MapSlot::Occupied(slot) => Ok(slot.into_mut()),
            MapSlot::Vacant(slot) => {
                let entry = self.record.entry(id).cloned().ok_or_else(|| {
                    StoreError::internal(format!("referenced entry `{id}` vanished from snapshot"))
                })?;
                Ok(slot.insert(entry))
            }
        }
    }

    fn into_upserts(self) -> Vec<EntryDraft> {
        self.entries
            .into_values()
            .map(EntryDraft::upsert)
            .collect()
    }
}

fn require_id(args: &OperationArgs) -> StoreResult<String> {
    args.id
        .clone()
        .ok_or_else(|| StoreError::bad_user_input("missing `id` argument").with_argument("id", ""))
}

fn require_data(data: Option<Value>) -> StoreResult<Value> {
    data.ok_or_else(|| {
        StoreError::bad_user_input("missing `data` argument").with_argument("data", "")
    })
}

fn require_entry_type(schema: &AnalyzedSchema, type_name: &str) -> StoreResult<()> {
    if schema.entry_types.contains_key(type_name) {
        Ok(())
    } else {
        Err(
            StoreError::internal(format!("`{type_name}` is not an entry type"))
                .with_type(type_name),
        )
    }
}

fn existing_entry<'s>(
    snapshot: &'s Snapshot,
    type_name: &str,
    id: &str,
) -> StoreResult<&'s Entry> {
    snapshot
        .record
        .entry(id)
        .filter(|entry| entry.metadata.type_name == type_name)
        .ok_or_else(|| {
            StoreError::bad_user_input(format!("no {type_name} with id `{id}`"))
                .with_argument("id", id)
                .with_type(type_name)
        })
}

/// Ids become storage path components; restrict them accordingly.
fn validate_entry_id(id: &str) -> StoreResult<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(
            StoreError::bad_user_input(format!("`{id}` is not a valid entry id"))
                .with_argument("id", id),
        )
    }
}
