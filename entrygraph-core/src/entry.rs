use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{StoreError, StoreResult};

/// One independently addressable, versioned content unit.
///
/// `data` is absent for entries committed without a payload (or whose
/// payload predates the current schema entirely).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub metadata: EntryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Ids of all entries whose current data references this entry.
    /// Invariant: sorted, deduplicated.
    #[serde(rename = "referencedBy", default)]
    pub referenced_by: Vec<String>,
}

impl Entry {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: id.into(),
            metadata: EntryMetadata {
                type_name: type_name.into(),
                referenced_by: vec![],
            },
            data,
        }
    }

    /// Reshape to the canonical output form `{...data, id}`.
    pub fn to_output(&self) -> StoreResult<Value> {
        let mut map = match &self.data {
            Some(Value::Object(fields)) => fields.clone(),
            Some(other) => {
                return Err(StoreError::bad_repository_data(format!(
                    "entry `{}` data is not an object: {other}",
                    self.id
                ))
                .with_type(self.metadata.type_name.clone()));
            }
            None => Map::new(),
        };
        map.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(Value::Object(map))
    }

    /// Record that `referrer` now references this entry.
    /// Keeps `referencedBy` sorted and free of duplicates.
    pub fn add_back_reference(&mut self, referrer: &str) {
        let refs = &mut self.metadata.referenced_by;
        if let Err(pos) = refs.binary_search_by(|existing| existing.as_str().cmp(referrer)) {
            refs.insert(pos, referrer.to_string());
        }
    }

    /// Record that `referrer` no longer references this entry.
    pub fn remove_back_reference(&mut self, referrer: &str) {
        self.metadata.referenced_by.retain(|id| id != referrer);
    }
}

/// The unit of change submitted in a commit batch.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryDraft {
    pub entry: Entry,
    pub deletion: bool,
}

impl EntryDraft {
    pub fn upsert(entry: Entry) -> Self {
        Self {
            entry,
            deletion: false,
        }
    }

    pub fn deletion(entry: Entry) -> Self {
        Self {
            entry,
            deletion: true,
        }
    }
}
