use entrygraph_graphql::{
    operation_gen::Operation,
    store::OperationArgs,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::fixtures::{entry, store_with, BLOG_SCHEMA, TestStore};

fn blog_store() -> TestStore {
    store_with(
        BLOG_SCHEMA,
        vec![
            entry("a1", "Author", json!({"name": "Ada"})),
            entry("a2", "Author", json!({"name": "Bob"})),
        ],
    )
}

async fn referenced_by(test: &TestStore, id: &str) -> Vec<String> {
    let snapshot = test.store.snapshot("main").await.unwrap();
    snapshot
        .record
        .entry(id)
        .unwrap_or_else(|| panic!("no entry {id}"))
        .metadata
        .referenced_by
        .clone()
}

#[tokio::test]
async fn create_round_trips_and_advances_the_branch() {
    let test = blog_store();

    let created = test
        .store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "On caching", "tags": ["t"]}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        created.value,
        json!({"title": "On caching", "tags": ["t"], "id": "p1"})
    );
    assert_eq!(created.resolved_ref, "c1");
    assert_eq!(test.repo.head("main").await.as_deref(), Some("c1"));
    assert_eq!(
        test.repo.commit_message("c1").await.as_deref(),
        Some("Create Post p1")
    );

    let read = test.store.entry_by_id("main", "Post", "p1").await.unwrap();
    assert_eq!(read.value, created.value);
}

#[tokio::test]
async fn explicit_commit_message_is_used_verbatim() {
    let test = blog_store();

    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": []}),
            Some("publish the caching post".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(
        test.repo.commit_message("c1").await.as_deref(),
        Some("publish the caching post")
    );
}

#[tokio::test]
async fn create_records_back_references_once_per_target() {
    let test = blog_store();

    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({
                "title": "t",
                "tags": [],
                "author": { "id": "a1" },
                "extra": { "id": "a1" },
                "reviewers": [{ "id": "a2" }],
            }),
            None,
        )
        .await
        .unwrap();

    // a1 is referenced twice by p1 but bookkept once
    assert_eq!(referenced_by(&test, "a1").await, vec!["p1".to_string()]);
    assert_eq!(referenced_by(&test, "a2").await, vec!["p1".to_string()]);
}

#[tokio::test]
async fn create_rejects_duplicate_and_malformed_ids_without_committing() {
    let test = blog_store();

    let err = test
        .store
        .create_entry("main", "Author", "a1", json!({"name": "x"}), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BAD_USER_INPUT");

    let err = test
        .store
        .create_entry("main", "Author", "a/b", json!({"name": "x"}), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BAD_USER_INPUT");

    assert_eq!(test.repo.head("main").await.as_deref(), Some("c0"));
}

#[tokio::test]
async fn create_with_dangling_reference_leaves_no_commit() {
    let test = blog_store();

    let err = test
        .store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": [], "author": {"id": "ghost"}}),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "BAD_USER_INPUT");
    assert_eq!(test.repo.head("main").await.as_deref(), Some("c0"));
}

#[tokio::test]
async fn update_merges_shallowly() {
    let test = blog_store();
    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({
                "title": "old",
                "rating": 4,
                "summary": "keep me",
                "tags": ["t"],
                "meta": { "subtitle": "s", "keywords": ["k"] },
            }),
            None,
        )
        .await
        .unwrap();

    let updated = test
        .store
        .update_entry(
            "main",
            "Post",
            "p1",
            json!({
                "title": "new",
                "rating": null,
                "meta": { "subtitle": "s2" },
            }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        updated.value,
        json!({
            "title": "new",
            "rating": null,
            "summary": "keep me",
            "tags": ["t"],
            // nested objects replace wholesale, no deep merge
            "meta": { "subtitle": "s2" },
            "id": "p1",
        })
    );
    assert_eq!(
        test.repo.commit_message("c2").await.as_deref(),
        Some("Update Post p1")
    );
}

#[tokio::test]
async fn update_replaces_and_clears_array_and_object_fields() {
    let test = blog_store();
    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({
                "title": "t",
                "tags": ["old"],
                "keywords": ["k1", "k2"],
                "meta": { "subtitle": "s" },
                "extraMeta": { "subtitle": "keep" },
            }),
            None,
        )
        .await
        .unwrap();

    let updated = test
        .store
        .update_entry(
            "main",
            "Post",
            "p1",
            json!({
                "tags": ["new-a", "new-b"],
                "keywords": null,
                "meta": null,
            }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        updated.value,
        json!({
            "title": "t",
            "tags": ["new-a", "new-b"],
            "keywords": null,
            "meta": null,
            "extraMeta": { "subtitle": "keep" },
            "id": "p1",
        })
    );
}

#[tokio::test]
async fn update_rebalances_back_references() {
    let test = blog_store();
    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": [], "author": {"id": "a1"}}),
            None,
        )
        .await
        .unwrap();

    test.store
        .update_entry("main", "Post", "p1", json!({"author": {"id": "a2"}}), None)
        .await
        .unwrap();

    assert_eq!(referenced_by(&test, "a1").await, Vec::<String>::new());
    assert_eq!(referenced_by(&test, "a2").await, vec!["p1".to_string()]);
}

#[tokio::test]
async fn update_of_missing_entry_is_rejected() {
    let test = blog_store();

    let err = test
        .store
        .update_entry("main", "Post", "nope", json!({"title": "t"}), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BAD_USER_INPUT");
}

#[tokio::test]
async fn delete_is_guarded_while_referenced() {
    let test = blog_store();
    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": [], "author": {"id": "a1"}}),
            None,
        )
        .await
        .unwrap();

    let err = test
        .store
        .delete_entry("main", "Author", "a1", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "IN_USE");
    assert_eq!(test.repo.head("main").await.as_deref(), Some("c1"));

    // removing the referencing entry unblocks the delete
    test.store
        .delete_entry("main", "Post", "p1", None)
        .await
        .unwrap();
    let deleted = test
        .store
        .delete_entry("main", "Author", "a1", None)
        .await
        .unwrap();
    assert_eq!(deleted.value, "a1");
    assert_eq!(
        test.repo.commit_message("c3").await.as_deref(),
        Some("Delete Author a1")
    );

    let err = test
        .store
        .entry_by_id("main", "Author", "a1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn delete_withdraws_back_references_it_held() {
    let test = blog_store();
    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": [], "author": {"id": "a1"}}),
            None,
        )
        .await
        .unwrap();

    test.store
        .delete_entry("main", "Post", "p1", None)
        .await
        .unwrap();

    assert_eq!(referenced_by(&test, "a1").await, Vec::<String>::new());
}

#[tokio::test]
async fn self_reference_is_created_and_cleared() {
    let test = store_with(BLOG_SCHEMA, vec![]);

    test.store
        .create_entry(
            "main",
            "Author",
            "a1",
            json!({"name": "Ada", "friend": {"id": "a1"}}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(referenced_by(&test, "a1").await, vec!["a1".to_string()]);

    test.store
        .update_entry("main", "Author", "a1", json!({"friend": null}), None)
        .await
        .unwrap();
    assert_eq!(referenced_by(&test, "a1").await, Vec::<String>::new());

    // no longer self-referenced, so deletable
    test.store
        .delete_entry("main", "Author", "a1", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn union_reference_is_bookkept_like_any_other() {
    let test = blog_store();

    test.store
        .create_entry(
            "main",
            "Post",
            "p1",
            json!({"title": "t", "tags": [], "credit": {"id": "a1"}}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(referenced_by(&test, "a1").await, vec!["p1".to_string()]);
}

#[tokio::test]
async fn list_count_and_type_name_operations() {
    let test = blog_store();

    let listed = test
        .store
        .execute(
            "main",
            &Operation::ListAll {
                type_name: "Author".to_string(),
            },
            OperationArgs::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        listed.value,
        json!([
            {"name": "Ada", "id": "a1"},
            {"name": "Bob", "id": "a2"},
        ])
    );
    assert_eq!(listed.resolved_ref, "c0");

    let counted = test
        .store
        .execute(
            "main",
            &Operation::CountMeta {
                type_name: "Author".to_string(),
            },
            OperationArgs::default(),
        )
        .await
        .unwrap();
    assert_eq!(counted.value, json!({"count": 2}));

    let named = test
        .store
        .execute(
            "main",
            &Operation::TypeName,
            OperationArgs {
                id: Some("a2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(named.value, Value::String("Author".to_string()));

    let err = test
        .store
        .execute("main", &Operation::TypeName, OperationArgs::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BAD_USER_INPUT");
}

#[tokio::test]
async fn reads_pin_the_commit_they_resolved() {
    let test = blog_store();

    let before = test.store.entry_count("main", "Author").await.unwrap();
    assert_eq!(before.resolved_ref, "c0");

    test.store
        .create_entry("main", "Author", "a3", json!({"name": "Eve"}), None)
        .await
        .unwrap();

    let after = test.store.entry_count("main", "Author").await.unwrap();
    assert_eq!(after.resolved_ref, "c1");
    assert_eq!(after.value, 3);
}
