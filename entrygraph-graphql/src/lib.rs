#![forbid(unsafe_code)]

//! Derives a CRUD query/mutation surface from a user-authored schema over
//! a commit-addressed content repository, and resolves those operations
//! with referential integrity between entries.

pub mod analyzer;
pub mod defaults;
pub mod input_gen;
pub mod operation_gen;
pub mod refgraph;
pub mod store;
pub mod validate;

use entrygraph_core::StoreResult;

use analyzer::AnalyzedSchema;
use operation_gen::OperationTable;

/// Schema text to append to the user's base schema, plus the resolver
/// bindings for every generated field. The execution engine parses
/// base + generated SDL and dispatches resolved fields through
/// [store::EntryStore::execute].
pub struct GeneratedSchema {
    pub sdl: String,
    pub operations: OperationTable,
}

pub fn generate_schema(schema: &AnalyzedSchema) -> StoreResult<GeneratedSchema> {
    validate::validate_schema(schema)?;

    let input_sdl = input_gen::generate_input_types(schema)?;
    let (operation_sdl, operations) = operation_gen::generate_operations(schema);

    Ok(GeneratedSchema {
        sdl: format!("{input_sdl}{operation_sdl}"),
        operations,
    })
}
