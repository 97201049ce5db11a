//! Classification of a user-authored schema into entry types, plain object
//! types, interfaces and unions, plus the closed type-term variant every
//! traversal in this crate dispatches on.

use graphql_parser::schema::{
    Definition, Document, EnumType, InterfaceType, ObjectType, Type, TypeDefinition, UnionType,
};
use indexmap::IndexMap;

use entrygraph_core::{StoreError, StoreResult};

/// The directive marking an object type as independently addressable.
pub const ENTRY_DIRECTIVE: &str = "entry";

pub type SchemaDocument = Document<'static, String>;
pub type ObjectDef = ObjectType<'static, String>;
pub type InterfaceDef = InterfaceType<'static, String>;
pub type UnionDef = UnionType<'static, String>;
pub type EnumDef = EnumType<'static, String>;
pub type Ty = Type<'static, String>;

pub fn parse_sdl(text: &str) -> StoreResult<SchemaDocument> {
    // the parser rejects an empty document; a blank schema is legal here
    // and classifies to nothing
    if text.trim().is_empty() {
        return Ok(SchemaDocument {
            definitions: vec![],
        });
    }

    graphql_parser::schema::parse_schema::<String>(text)
        .map(Document::into_static)
        .map_err(|err| StoreError::bad_schema(err.to_string()))
}

/// Derived, per-request classification of the schema text.
///
/// Entry types also appear in `object_types`. Enum declarations are kept
/// so traversals can tell enums apart from custom scalars.
#[derive(Default)]
pub struct AnalyzedSchema {
    pub entry_types: IndexMap<String, ObjectDef>,
    pub object_types: IndexMap<String, ObjectDef>,
    pub interface_types: IndexMap<String, InterfaceDef>,
    pub union_types: IndexMap<String, UnionDef>,
    pub enum_types: IndexMap<String, EnumDef>,
}

/// Resolution of a named type to its declaration kind. List and non-null
/// wrappers live in [Ty]; this covers the leaves.
pub enum TypeTerm<'a> {
    /// Built-in or custom scalar (any name without a matching declaration).
    Scalar(&'a str),
    Enum(&'a EnumDef),
    Object(&'a ObjectDef),
    Interface(&'a InterfaceDef),
    Union(&'a UnionDef),
}

pub fn analyze_schema(document: &SchemaDocument) -> AnalyzedSchema {
    let mut schema = AnalyzedSchema::default();

    for definition in &document.definitions {
        let Definition::TypeDefinition(type_definition) = definition else {
            continue;
        };

        match type_definition {
            TypeDefinition::Object(object) => {
                if object.name.starts_with("__") {
                    continue;
                }
                if object
                    .directives
                    .iter()
                    .any(|directive| directive.name == ENTRY_DIRECTIVE)
                {
                    schema
                        .entry_types
                        .insert(object.name.clone(), object.clone());
                }
                schema
                    .object_types
                    .insert(object.name.clone(), object.clone());
            }
            TypeDefinition::Interface(interface) => {
                if interface.name.starts_with("__") {
                    continue;
                }
                schema
                    .interface_types
                    .insert(interface.name.clone(), interface.clone());
            }
            TypeDefinition::Union(union_def) => {
                if union_def.name.starts_with("__") {
                    continue;
                }
                schema
                    .union_types
                    .insert(union_def.name.clone(), union_def.clone());
            }
            TypeDefinition::Enum(enum_def) => {
                if enum_def.name.starts_with("__") {
                    continue;
                }
                schema
                    .enum_types
                    .insert(enum_def.name.clone(), enum_def.clone());
            }
            TypeDefinition::Scalar(_) | TypeDefinition::InputObject(_) => {}
        }
    }

    schema
}

impl AnalyzedSchema {
    pub fn term<'s>(&'s self, name: &'s str) -> TypeTerm<'s> {
        if let Some(object) = self.object_types.get(name) {
            return TypeTerm::Object(object);
        }
        if let Some(union_def) = self.union_types.get(name) {
            return TypeTerm::Union(union_def);
        }
        if let Some(interface) = self.interface_types.get(name) {
            return TypeTerm::Interface(interface);
        }
        if let Some(enum_def) = self.enum_types.get(name) {
            return TypeTerm::Enum(enum_def);
        }
        TypeTerm::Scalar(name)
    }

    pub fn is_entry_type(&self, name: &str) -> bool {
        self.entry_types.contains_key(name)
    }

    /// A union whose members are all entry types is referenced by bare
    /// `{id}` values; any other union uses the discriminated input shape.
    pub fn union_is_all_entries(&self, union_def: &UnionDef) -> bool {
        !union_def.types.is_empty()
            && union_def
                .types
                .iter()
                .all(|member| self.is_entry_type(member))
    }
}

/// The field name a union member gets in the discriminated ("oneOf")
/// input shape, and the key the stored payload is discriminated by.
pub fn union_member_field_name(member: &str) -> String {
    let mut chars = member.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
