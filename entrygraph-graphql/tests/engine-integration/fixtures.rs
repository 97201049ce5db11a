use std::sync::Arc;

use entrygraph_core::{cache::RepoCache, entry::Entry};
use entrygraph_graphql::{
    analyzer::{analyze_schema, parse_sdl, AnalyzedSchema, Ty},
    store::EntryStore,
};
use entrygraph_test_utils::{init_tracing, FakeRepo};
use serde_json::Value;

/// Schema used by the mutation scenarios.
pub const BLOG_SCHEMA: &str = r#"
directive @entry on OBJECT

type Author @entry {
    id: ID!
    name: String!
    friend: Author
}

type Meta {
    subtitle: String
    keywords: [String!]
}

type Post @entry {
    id: ID!
    title: String!
    rating: Int
    summary: String
    note: String
    tags: [String!]!
    keywords: [String]
    meta: Meta
    extraMeta: Meta
    author: Author
    extra: Author
    reviewers: [Author!]
    credit: Credit
}

union Credit = Author | Post
"#;

pub fn analyzed(sdl: &str) -> AnalyzedSchema {
    analyze_schema(&parse_sdl(sdl).unwrap())
}

pub fn field_ty<'a>(schema: &'a AnalyzedSchema, type_name: &str, field_name: &str) -> &'a Ty {
    let object = schema
        .object_types
        .get(type_name)
        .unwrap_or_else(|| panic!("no object type {type_name}"));
    &object
        .fields
        .iter()
        .find(|field| field.name == field_name)
        .unwrap_or_else(|| panic!("no field {type_name}.{field_name}"))
        .field_type
}

pub fn entry(id: &str, type_name: &str, data: Value) -> Entry {
    Entry::new(id, type_name, Some(data))
}

pub struct TestStore {
    pub repo: Arc<FakeRepo>,
    pub store: EntryStore,
}

pub fn store_with(schema: &str, entries: Vec<Entry>) -> TestStore {
    init_tracing();
    let repo = Arc::new(FakeRepo::seeded(schema, entries));
    let cache = Arc::new(RepoCache::new(repo.clone()));
    TestStore {
        repo: repo.clone(),
        store: EntryStore::new(repo, cache),
    }
}
