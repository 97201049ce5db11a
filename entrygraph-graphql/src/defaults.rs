//! Read-time reconciliation of stored data with the active schema:
//! schema-compliant defaults for absent values, canonical reshaping of
//! entry references, and runtime-type tagging of union values.

use graphql_parser::schema::Type;
use serde_json::{Map, Value};

use entrygraph_core::{cache::CacheRecord, StoreError, StoreResult};

use crate::analyzer::{union_member_field_name, AnalyzedSchema, Ty, TypeTerm};

/// The key carrying the resolved member type name of a union value.
pub const TYPE_TAG_FIELD: &str = "__typename";

/// Whether a field of this declared type needs the custom resolver.
/// Scalar and enum fields rely on the execution engine's native
/// null-defaulting.
pub fn needs_custom_resolution(schema: &AnalyzedSchema, ty: &Ty) -> bool {
    match ty {
        Type::NonNullType(inner) => needs_custom_resolution(schema, inner),
        Type::ListType(_) => true,
        Type::NamedType(name) => matches!(
            schema.term(name),
            TypeTerm::Object(_) | TypeTerm::Union(_)
        ),
    }
}

pub struct OutputResolver<'a> {
    pub schema: &'a AnalyzedSchema,
    pub record: &'a CacheRecord,
}

impl OutputResolver<'_> {
    /// Resolve the output value of one field from its raw stored value
    /// (`None` when absent because the entry predates a schema change).
    pub fn resolve_field(
        &self,
        field_name: &str,
        declared: &Ty,
        stored: Option<&Value>,
    ) -> StoreResult<Value> {
        self.resolve(field_name, declared, stored, false)
    }

    fn resolve(
        &self,
        field_name: &str,
        ty: &Ty,
        stored: Option<&Value>,
        parent_non_null: bool,
    ) -> StoreResult<Value> {
        match ty {
            Type::NonNullType(inner) => self.resolve(field_name, inner, stored, true),
            Type::ListType(inner) => match stored {
                None | Some(Value::Null) => {
                    if parent_non_null {
                        Ok(Value::Array(vec![]))
                    } else {
                        Ok(Value::Null)
                    }
                }
                Some(Value::Array(items)) => {
                    let resolved = items
                        .iter()
                        .map(|item| self.resolve(field_name, inner, Some(item), false))
                        .collect::<StoreResult<Vec<Value>>>()?;
                    Ok(Value::Array(resolved))
                }
                Some(other) => Err(StoreError::schema_data_mismatch(format!(
                    "stored value for list field `{field_name}` is not an array: {other}"
                ))
                .with_field(field_name.to_string())),
            },
            Type::NamedType(name) => {
                let absent = matches!(stored, None | Some(Value::Null));

                match self.schema.term(name) {
                    TypeTerm::Union(union_def) => {
                        if absent {
                            // no sensible default for an unset required union
                            return if parent_non_null {
                                Err(StoreError::bad_repository_data(format!(
                                    "no stored value for required union field `{field_name}`"
                                ))
                                .with_field(field_name.to_string())
                                .with_type(name.clone()))
                            } else {
                                Ok(Value::Null)
                            };
                        }
                        let value = stored.unwrap_or(&Value::Null);

                        if self.schema.union_is_all_entries(union_def) {
                            let mut output = self.resolve_entry_reference(field_name, value)?;
                            self.tag_with_stored_type(field_name, value, &mut output)?;
                            return Ok(output);
                        }

                        // discriminated payload: unwrap and tag with the
                        // resolved member type
                        let Value::Object(map) = value else {
                            return Err(StoreError::schema_data_mismatch(format!(
                                "stored union value for `{field_name}` is not an object"
                            ))
                            .with_field(field_name.to_string())
                            .with_type(name.clone()));
                        };

                        for member in &union_def.types {
                            let Some(payload) = map.get(&union_member_field_name(member)) else {
                                continue;
                            };
                            if payload.is_null() {
                                continue;
                            }

                            let mut output = if self.schema.is_entry_type(member) {
                                self.resolve_entry_reference(field_name, payload)?
                            } else {
                                payload.clone()
                            };
                            if let Value::Object(fields) = &mut output {
                                fields.insert(
                                    TYPE_TAG_FIELD.to_string(),
                                    Value::String(member.clone()),
                                );
                            }
                            return Ok(output);
                        }

                        Err(StoreError::bad_repository_data(format!(
                            "stored union value for `{field_name}` matches no member of `{name}`"
                        ))
                        .with_field(field_name.to_string())
                        .with_type(name.clone()))
                    }
                    TypeTerm::Object(_) => {
                        if absent {
                            return if parent_non_null {
                                Err(StoreError::bad_repository_data(format!(
                                    "no stored value for required object field `{field_name}`"
                                ))
                                .with_field(field_name.to_string())
                                .with_type(name.clone()))
                            } else {
                                Ok(Value::Null)
                            };
                        }
                        let value = stored.unwrap_or(&Value::Null);

                        if self.schema.is_entry_type(name) {
                            self.resolve_entry_reference(field_name, value)
                        } else {
                            // nested nullable scalar/enum fields default to
                            // null through the execution engine
                            Ok(value.clone())
                        }
                    }
                    TypeTerm::Scalar(_) | TypeTerm::Enum(_) | TypeTerm::Interface(_) => {
                        Ok(stored.cloned().unwrap_or(Value::Null))
                    }
                }
            }
        }
    }

    fn resolve_entry_reference(&self, field_name: &str, raw: &Value) -> StoreResult<Value> {
        let id = if let Value::Object(map) = raw {
            match map.get("id") {
                Some(Value::String(id)) => id.clone(),
                _ => {
                    return Err(StoreError::schema_data_mismatch(format!(
                        "stored value for `{field_name}` is not an entry reference"
                    ))
                    .with_field(field_name.to_string()));
                }
            }
        } else {
            return Err(StoreError::schema_data_mismatch(format!(
                "stored value for `{field_name}` is not an entry reference"
            ))
            .with_field(field_name.to_string()));
        };

        let entry = self.record.entry(&id).ok_or_else(|| {
            StoreError::bad_repository_data(format!(
                "field `{field_name}` references entry `{id}` which does not exist"
            ))
            .with_field(field_name.to_string())
        })?;

        entry.to_output()
    }

    fn tag_with_stored_type(
        &self,
        field_name: &str,
        reference: &Value,
        output: &mut Value,
    ) -> StoreResult<()> {
        let (Value::Object(ref_map), Value::Object(out_map)) = (reference, output) else {
            return Ok(());
        };
        let Some(Value::String(id)) = ref_map.get("id") else {
            return Ok(());
        };
        let entry = self.record.entry(id).ok_or_else(|| {
            StoreError::bad_repository_data(format!(
                "field `{field_name}` references entry `{id}` which does not exist"
            ))
            .with_field(field_name.to_string())
        })?;
        out_map.insert(
            TYPE_TAG_FIELD.to_string(),
            Value::String(entry.metadata.type_name.clone()),
        );
        Ok(())
    }
}

/// Resolve the full output object of an entry: every schema field run
/// through the default resolver, plus the id.
pub fn resolve_entry_output(
    schema: &AnalyzedSchema,
    record: &CacheRecord,
    type_name: &str,
    id: &str,
    data: Option<&Value>,
) -> StoreResult<Value> {
    let Some(object_def) = schema.object_types.get(type_name) else {
        return Err(
            StoreError::internal(format!("unknown object type `{type_name}`"))
                .with_type(type_name),
        );
    };

    let stored_fields = match data {
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(StoreError::bad_repository_data(format!(
                "entry `{id}` data is not an object: {other}"
            ))
            .with_type(type_name));
        }
        None => None,
    };

    let resolver = OutputResolver { schema, record };
    let mut output = Map::new();

    for field in &object_def.fields {
        if field.name == "id" {
            continue;
        }
        let stored = stored_fields.and_then(|map| map.get(&field.name));

        let value = if needs_custom_resolution(schema, &field.field_type) {
            resolver.resolve_field(&field.name, &field.field_type, stored)?
        } else {
            stored.cloned().unwrap_or(Value::Null)
        };
        output.insert(field.name.clone(), value);
    }

    output.insert("id".to_string(), Value::String(id.to_string()));
    Ok(Value::Object(output))
}
