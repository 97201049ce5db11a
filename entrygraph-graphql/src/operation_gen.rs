//! Synthesizes the CRUD query/mutation surface for every entry type and
//! the resolver binding table the execution engine dispatches on.

use std::fmt::Write;

use indexmap::IndexMap;

use crate::analyzer::AnalyzedSchema;

/// A generated operation, bound to the entry type it operates on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// All entries of the type, each reshaped as `{...data, id}`.
    ListAll { type_name: String },
    /// `{count}` of entries of the type.
    CountMeta { type_name: String },
    /// Single entry by id; a miss is `NOT_FOUND`.
    ById { type_name: String },
    Create { type_name: String },
    Update { type_name: String },
    Delete { type_name: String },
    /// Stored type name of an arbitrary id.
    TypeName,
}

#[derive(Default)]
pub struct OperationTable {
    pub queries: IndexMap<String, Operation>,
    pub mutations: IndexMap<String, Operation>,
}

impl OperationTable {
    pub fn query(&self, field_name: &str) -> Option<&Operation> {
        self.queries.get(field_name)
    }

    pub fn mutation(&self, field_name: &str) -> Option<&Operation> {
        self.mutations.get(field_name)
    }
}

pub fn generate_operations(schema: &AnalyzedSchema) -> (String, OperationTable) {
    let mut table = OperationTable::default();
    let mut sdl = String::new();

    writeln!(sdl, "type ListMetadata {{").ok();
    writeln!(sdl, "  count: Int!").ok();
    writeln!(sdl, "}}").ok();
    sdl.push('\n');

    writeln!(sdl, "type Query {{").ok();
    for name in schema.entry_types.keys() {
        writeln!(sdl, "  all{name}s: [{name}!]").ok();
        table.queries.insert(
            format!("all{name}s"),
            Operation::ListAll {
                type_name: name.clone(),
            },
        );

        writeln!(sdl, "  _all{name}sMeta: ListMetadata").ok();
        table.queries.insert(
            format!("_all{name}sMeta"),
            Operation::CountMeta {
                type_name: name.clone(),
            },
        );

        writeln!(sdl, "  {name}(id: ID!): {name}").ok();
        table.queries.insert(
            name.clone(),
            Operation::ById {
                type_name: name.clone(),
            },
        );
    }
    writeln!(sdl, "  _typeName(id: ID!): String!").ok();
    table
        .queries
        .insert("_typeName".to_string(), Operation::TypeName);
    writeln!(sdl, "}}").ok();

    if !schema.entry_types.is_empty() {
        sdl.push('\n');
        writeln!(sdl, "type Mutation {{").ok();
        for name in schema.entry_types.keys() {
            writeln!(
                sdl,
                "  create{name}(id: ID!, data: {name}Input!, commitMessage: String): {name}"
            )
            .ok();
            table.mutations.insert(
                format!("create{name}"),
                Operation::Create {
                    type_name: name.clone(),
                },
            );

            writeln!(
                sdl,
                "  update{name}(id: ID!, data: {name}Input!, commitMessage: String): {name}"
            )
            .ok();
            table.mutations.insert(
                format!("update{name}"),
                Operation::Update {
                    type_name: name.clone(),
                },
            );

            writeln!(sdl, "  delete{name}(id: ID!, commitMessage: String): ID").ok();
            table.mutations.insert(
                format!("delete{name}"),
                Operation::Delete {
                    type_name: name.clone(),
                },
            );
        }
        writeln!(sdl, "}}").ok();
    }

    (sdl, table)
}
