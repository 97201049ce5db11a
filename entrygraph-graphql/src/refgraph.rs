//! Reference graph engine: type-directed collection of the entry ids a
//! value references, validation of those references against one commit
//! snapshot, and minimal back-reference diffing for updates.
//!
//! The traversal stops at every bare `{id}` reference and never enters the
//! referenced entry's contents, so reference cycles (including an entry
//! referencing itself) terminate trivially.

use std::collections::BTreeSet;

use graphql_parser::schema::Type;
use serde_json::Value;
use tracing::trace;

use entrygraph_core::{cache::CacheRecord, StoreError, StoreResult};

use crate::analyzer::{union_member_field_name, AnalyzedSchema, ObjectDef, Ty, TypeTerm};

/// What the declared type permits a reference target to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// Exact entry type name match required.
    Exact(String),
    /// Membership in the named union required.
    MemberOf(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectedReference {
    pub id: String,
    pub target: ReferenceTarget,
    pub field_path: String,
}

/// Structurally walk `value` against the entry type `root_type`, returning
/// every bare reference encountered. Purely syntactic; targets are checked
/// against stored entries by [validate_references].
///
/// The root value itself is walked field by field (it is the entry being
/// mutated, not a reference); every nested entry-typed value, including
/// values of the root's own type, is a reference.
pub fn collect_references(
    schema: &AnalyzedSchema,
    root_type: &str,
    value: &Value,
) -> StoreResult<Vec<CollectedReference>> {
    let TypeTerm::Object(object_def) = schema.term(root_type) else {
        return Err(
            StoreError::internal(format!("cannot mutate non-object type `{root_type}`"))
                .with_type(root_type),
        );
    };

    let mut out = vec![];
    walk_object(schema, object_def, "", value, &mut out)?;
    trace!(root_type, count = out.len(), "collected references");
    Ok(out)
}

fn walk_object(
    schema: &AnalyzedSchema,
    object_def: &ObjectDef,
    path: &str,
    value: &Value,
    out: &mut Vec<CollectedReference>,
) -> StoreResult<()> {
    let Value::Object(map) = value else {
        return Err(StoreError::schema_data_mismatch(format!(
            "value for object type `{}` is not an object",
            object_def.name
        ))
        .with_type(object_def.name.clone())
        .with_field(path.to_string()));
    };

    for field in &object_def.fields {
        // fields absent from the value contribute nothing (partial
        // update tolerance)
        let Some(field_value) = map.get(&field.name) else {
            continue;
        };
        if field_value.is_null() {
            continue;
        }

        let field_path = join_path(path, &field.name);
        walk_type(schema, &field_path, &field.field_type, field_value, out)?;
    }

    Ok(())
}

fn walk_type(
    schema: &AnalyzedSchema,
    path: &str,
    ty: &Ty,
    value: &Value,
    out: &mut Vec<CollectedReference>,
) -> StoreResult<()> {
    match ty {
        Type::NonNullType(inner) => walk_type(schema, path, inner, value, out),
        Type::ListType(inner) => {
            let Value::Array(items) = value else {
                return Err(StoreError::schema_data_mismatch(format!(
                    "value at `{path}` is not an array"
                ))
                .with_field(path.to_string()));
            };
            for (index, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                walk_type(schema, &format!("{path}[{index}]"), inner, item, out)?;
            }
            Ok(())
        }
        Type::NamedType(name) => match schema.term(name) {
            TypeTerm::Union(union_def) if schema.union_is_all_entries(union_def) => {
                out.push(CollectedReference {
                    id: expect_reference_id(value, path)?,
                    target: ReferenceTarget::MemberOf(name.clone()),
                    field_path: path.to_string(),
                });
                Ok(())
            }
            TypeTerm::Union(union_def) => {
                // discriminated payload: exactly one member field set
                let Value::Object(map) = value else {
                    return Err(StoreError::schema_data_mismatch(format!(
                        "value at `{path}` is not a union payload object"
                    ))
                    .with_field(path.to_string()));
                };

                let mut present: Vec<&String> = vec![];
                for member in &union_def.types {
                    if map
                        .get(&union_member_field_name(member))
                        .is_some_and(|member_value| !member_value.is_null())
                    {
                        present.push(member);
                    }
                }

                let [member] = present.as_slice() else {
                    return Err(StoreError::bad_user_input(format!(
                        "exactly one member of union `{name}` must be set at `{path}`, got {}",
                        present.len()
                    ))
                    .with_field(path.to_string())
                    .with_type(name.clone()));
                };

                let member_key = union_member_field_name(member);
                let payload = &map[&member_key];
                walk_type(
                    schema,
                    &join_path(path, &member_key),
                    &Type::NamedType((*member).clone()),
                    payload,
                    out,
                )
            }
            TypeTerm::Object(object_def) => {
                if schema.is_entry_type(name) {
                    out.push(CollectedReference {
                        id: expect_reference_id(value, path)?,
                        target: ReferenceTarget::Exact(name.clone()),
                        field_path: path.to_string(),
                    });
                    Ok(())
                } else {
                    walk_object(schema, object_def, path, value, out)
                }
            }
            // interface-typed values are not traversed (references through
            // interfaces are unsupported); scalars and enums carry none
            TypeTerm::Scalar(_) | TypeTerm::Enum(_) | TypeTerm::Interface(_) => Ok(()),
        },
    }
}

fn expect_reference_id(value: &Value, path: &str) -> StoreResult<String> {
    if let Value::Object(map) = value {
        if let Some(Value::String(id)) = map.get("id") {
            if !id.is_empty() {
                return Ok(id.clone());
            }
        }
    }
    Err(
        StoreError::bad_user_input(format!("value at `{path}` is not an {{id}} reference"))
            .with_field(path.to_string()),
    )
}

/// Check every collected reference against the commit snapshot and return
/// the deduplicated id set. `assume` injects an (id, type) pair that is
/// valid even though not committed yet (the entry currently being created).
pub fn validate_references(
    schema: &AnalyzedSchema,
    record: &CacheRecord,
    references: &[CollectedReference],
    assume: Option<(&str, &str)>,
) -> StoreResult<BTreeSet<String>> {
    let mut ids = BTreeSet::new();

    for reference in references {
        let stored_type = match assume {
            Some((assumed_id, assumed_type)) if assumed_id == reference.id => assumed_type,
            _ => record
                .entry(&reference.id)
                .map(|entry| entry.metadata.type_name.as_str())
                .ok_or_else(|| {
                    StoreError::bad_user_input(format!(
                        "reference to unknown entry `{}`",
                        reference.id
                    ))
                    .with_field(reference.field_path.clone())
                    .with_argument("id", reference.id.clone())
                })?,
        };

        match &reference.target {
            ReferenceTarget::Exact(type_name) => {
                if stored_type != type_name {
                    return Err(StoreError::bad_user_input(format!(
                        "entry `{}` has type `{stored_type}`, field requires `{type_name}`",
                        reference.id
                    ))
                    .with_field(reference.field_path.clone())
                    .with_type(type_name.clone()));
                }
            }
            ReferenceTarget::MemberOf(union_name) => {
                let is_member = schema
                    .union_types
                    .get(union_name)
                    .is_some_and(|union_def| {
                        union_def.types.iter().any(|member| member == stored_type)
                    });
                if !is_member {
                    return Err(StoreError::bad_user_input(format!(
                        "entry `{}` has type `{stored_type}`, not a member of union `{union_name}`",
                        reference.id
                    ))
                    .with_field(reference.field_path.clone())
                    .with_type(union_name.clone()));
                }
            }
        }

        ids.insert(reference.id.clone());
    }

    Ok(ids)
}

/// Collect and validate in one step: the full reference set of `value`
/// interpreted as an entry of `root_type`.
pub fn referenced_ids(
    schema: &AnalyzedSchema,
    record: &CacheRecord,
    root_type: &str,
    value: &Value,
    assume: Option<(&str, &str)>,
) -> StoreResult<BTreeSet<String>> {
    let references = collect_references(schema, root_type, value)?;
    validate_references(schema, record, &references, assume)
}

/// The minimal back-reference bookkeeping change between two reference
/// sets of the same entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDiff {
    /// In old but not new: this entry's id must be removed from their
    /// `referencedBy`.
    pub removed: Vec<String>,
    /// In new but not old: this entry's id must be added.
    pub added: Vec<String>,
}

pub fn diff_reference_sets(old: &BTreeSet<String>, new: &BTreeSet<String>) -> ReferenceDiff {
    ReferenceDiff {
        removed: old.difference(new).cloned().collect(),
        added: new.difference(old).cloned().collect(),
    }
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
