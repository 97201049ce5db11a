//! Whole-schema invariant checks, run once per generated schema.

use entrygraph_core::{StoreError, StoreResult};

use crate::analyzer::{AnalyzedSchema, TypeTerm, ENTRY_DIRECTIVE};

pub fn validate_schema(schema: &AnalyzedSchema) -> StoreResult<()> {
    for (name, union_def) in &schema.union_types {
        if union_def
            .directives
            .iter()
            .any(|directive| directive.name == ENTRY_DIRECTIVE)
        {
            return Err(StoreError::bad_schema(format!(
                "union `{name}` cannot carry the @{ENTRY_DIRECTIVE} directive"
            ))
            .with_type(name.clone()));
        }

        let mut entry_members = 0usize;
        let mut plain_members = 0usize;

        for member in &union_def.types {
            match schema.term(member) {
                TypeTerm::Object(_) => {
                    if schema.is_entry_type(member) {
                        entry_members += 1;
                    } else {
                        plain_members += 1;
                    }
                }
                _ => {
                    return Err(StoreError::bad_schema(format!(
                        "union `{name}` member `{member}` is not an object type"
                    ))
                    .with_type(name.clone()));
                }
            }
        }

        // A union either consists purely of entry types (referenced by id)
        // or purely of plain object types (inlined as a oneOf payload).
        if entry_members > 0 && plain_members > 0 {
            return Err(StoreError::bad_schema(format!(
                "union `{name}` mixes entry and non-entry member types"
            ))
            .with_type(name.clone()));
        }
    }

    for (name, interface) in &schema.interface_types {
        if interface
            .directives
            .iter()
            .any(|directive| directive.name == ENTRY_DIRECTIVE)
        {
            return Err(StoreError::bad_schema(format!(
                "interface `{name}` cannot carry the @{ENTRY_DIRECTIVE} directive"
            ))
            .with_type(name.clone()));
        }
    }

    Ok(())
}
