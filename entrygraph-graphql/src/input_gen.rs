//! Derives mutation input type declarations from the output types:
//! `{id}` reference inputs for entry-targeting fields, nested inputs for
//! plain object types and discriminated ("oneOf") inputs for unions.

use std::fmt::Write;

use graphql_parser::schema::Type;
use indexmap::IndexSet;

use entrygraph_core::StoreResult;

use crate::analyzer::{union_member_field_name, AnalyzedSchema, ObjectDef, Ty, TypeTerm};

pub const ONE_OF_DIRECTIVE_DECL: &str = "directive @oneOf on INPUT_OBJECT";

/// The input type name a field of type `ty` resolves to, preserving list
/// and non-null wrappers.
pub fn input_type_ref(schema: &AnalyzedSchema, ty: &Ty) -> String {
    match ty {
        Type::NamedType(name) => match schema.term(name) {
            TypeTerm::Object(_) if schema.is_entry_type(name) => format!("{name}IdInput"),
            TypeTerm::Object(_) => format!("{name}Input"),
            TypeTerm::Union(union_def) if schema.union_is_all_entries(union_def) => {
                format!("{name}IdInput")
            }
            TypeTerm::Union(_) => format!("{name}Input"),
            TypeTerm::Interface(_) => format!("{name}IdInput"),
            TypeTerm::Scalar(_) | TypeTerm::Enum(_) => name.clone(),
        },
        Type::ListType(inner) => format!("[{}]", input_type_ref(schema, inner)),
        Type::NonNullType(inner) => format!("{}!", input_type_ref(schema, inner)),
    }
}

pub fn generate_input_types(schema: &AnalyzedSchema) -> StoreResult<String> {
    let mut id_inputs: Vec<String> = vec![];

    for name in schema.entry_types.keys() {
        id_inputs.push(name.clone());
    }
    for name in schema.interface_types.keys() {
        id_inputs.push(name.clone());
    }
    for (name, union_def) in &schema.union_types {
        if schema.union_is_all_entries(union_def) {
            id_inputs.push(name.clone());
        }
    }

    let one_of_unions = unions_used_as_input(schema);

    let mut sdl = String::new();

    if !one_of_unions.is_empty() {
        writeln!(sdl, "{ONE_OF_DIRECTIVE_DECL}").ok();
        sdl.push('\n');
    }

    for name in &id_inputs {
        writeln!(sdl, "input {name}IdInput {{").ok();
        writeln!(sdl, "  id: ID!").ok();
        writeln!(sdl, "}}").ok();
        sdl.push('\n');
    }

    for (name, object) in &schema.object_types {
        write_object_input(&mut sdl, schema, name, object);
    }

    for name in &one_of_unions {
        let Some(union_def) = schema.union_types.get(name) else {
            continue;
        };
        writeln!(sdl, "input {name}Input @oneOf {{").ok();
        for member in &union_def.types {
            let member_ref = input_type_ref(schema, &Type::NamedType(member.clone()));
            writeln!(sdl, "  {}: {member_ref}", union_member_field_name(member)).ok();
        }
        writeln!(sdl, "}}").ok();
        sdl.push('\n');
    }

    Ok(sdl)
}

fn write_object_input(sdl: &mut String, schema: &AnalyzedSchema, name: &str, object: &ObjectDef) {
    let is_entry = schema.is_entry_type(name);

    writeln!(sdl, "input {name}Input {{").ok();

    let mut field_count = 0usize;
    for field in &object.fields {
        // The id of an entry is supplied positionally by mutations,
        // never as payload data.
        if is_entry && field.name == "id" {
            continue;
        }
        writeln!(
            sdl,
            "  {}: {}",
            field.name,
            input_type_ref(schema, &field.field_type)
        )
        .ok();
        field_count += 1;
    }

    if field_count == 0 {
        // keep the input shape legally non-empty
        writeln!(sdl, "  _placeholder: Boolean").ok();
    }

    writeln!(sdl, "}}").ok();
    sdl.push('\n');
}

/// Mixed (non-entry) unions only get an input type when some object type
/// actually uses them in a field, anywhere under list/non-null wrappers.
fn unions_used_as_input(schema: &AnalyzedSchema) -> IndexSet<String> {
    let mut used = IndexSet::new();

    for object in schema.object_types.values() {
        for field in &object.fields {
            let name = named_type_of(&field.field_type);
            if let Some(union_def) = schema.union_types.get(name) {
                if !schema.union_is_all_entries(union_def) {
                    used.insert(name.to_string());
                }
            }
        }
    }

    used
}

fn named_type_of(ty: &Ty) -> &str {
    match ty {
        Type::NamedType(name) => name,
        Type::ListType(inner) | Type::NonNullType(inner) => named_type_of(inner),
    }
}
