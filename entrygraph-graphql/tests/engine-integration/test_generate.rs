use entrygraph_graphql::{
    generate_schema,
    operation_gen::{generate_operations, Operation},
};
use pretty_assertions::assert_eq;

use crate::fixtures::analyzed;

#[test]
fn generated_schema_for_plain_entry_types() {
    let schema = analyzed(
        r#"
        type Author @entry {
            id: ID!
            name: String!
        }

        type Post @entry {
            id: ID!
            title: String!
            author: Author
            tags: [String!]!
        }
        "#,
    );

    let generated = generate_schema(&schema).unwrap();

    let expected = "\
input AuthorIdInput {
  id: ID!
}

input PostIdInput {
  id: ID!
}

input AuthorInput {
  name: String!
}

input PostInput {
  title: String!
  author: AuthorIdInput
  tags: [String!]!
}

type ListMetadata {
  count: Int!
}

type Query {
  allAuthors: [Author!]
  _allAuthorsMeta: ListMetadata
  Author(id: ID!): Author
  allPosts: [Post!]
  _allPostsMeta: ListMetadata
  Post(id: ID!): Post
  _typeName(id: ID!): String!
}

type Mutation {
  createAuthor(id: ID!, data: AuthorInput!, commitMessage: String): Author
  updateAuthor(id: ID!, data: AuthorInput!, commitMessage: String): Author
  deleteAuthor(id: ID!, commitMessage: String): ID
  createPost(id: ID!, data: PostInput!, commitMessage: String): Post
  updatePost(id: ID!, data: PostInput!, commitMessage: String): Post
  deletePost(id: ID!, commitMessage: String): ID
}
";
    assert_eq!(generated.sdl, expected);
}

#[test]
fn one_of_input_for_mixed_union() {
    let schema = analyzed(
        r#"
        type Page @entry {
            id: ID!
            body: Block
        }

        type Quote {
            text: String
        }

        type Aside {
            note: String
        }

        union Block = Quote | Aside
        "#,
    );

    let generated = generate_schema(&schema).unwrap();

    let expected = "\
directive @oneOf on INPUT_OBJECT

input PageIdInput {
  id: ID!
}

input PageInput {
  body: BlockInput
}

input QuoteInput {
  text: String
}

input AsideInput {
  note: String
}

input BlockInput @oneOf {
  quote: QuoteInput
  aside: AsideInput
}

type ListMetadata {
  count: Int!
}

type Query {
  allPages: [Page!]
  _allPagesMeta: ListMetadata
  Page(id: ID!): Page
  _typeName(id: ID!): String!
}

type Mutation {
  createPage(id: ID!, data: PageInput!, commitMessage: String): Page
  updatePage(id: ID!, data: PageInput!, commitMessage: String): Page
  deletePage(id: ID!, commitMessage: String): ID
}
";
    assert_eq!(generated.sdl, expected);
}

#[test]
fn id_input_for_all_entry_union_and_interface() {
    let schema = analyzed(
        r#"
        type Author @entry {
            id: ID!
            name: String
        }

        type Post @entry {
            id: ID!
            credit: Credit
            named: Named
        }

        interface Named {
            name: String
        }

        union Credit = Author | Post
        "#,
    );

    let generated = generate_schema(&schema).unwrap();

    assert!(generated.sdl.contains("input NamedIdInput {"));
    assert!(generated.sdl.contains("input CreditIdInput {"));
    assert!(generated.sdl.contains("  credit: CreditIdInput\n"));
    assert!(generated.sdl.contains("  named: NamedIdInput\n"));
    // all-entry unions never get a oneOf input
    assert!(!generated.sdl.contains("@oneOf"));
}

#[test]
fn entry_type_with_only_an_id_gets_a_placeholder_field() {
    let schema = analyzed(
        r#"
        type Tag @entry {
            id: ID!
        }
        "#,
    );

    let generated = generate_schema(&schema).unwrap();
    assert!(generated
        .sdl
        .contains("input TagInput {\n  _placeholder: Boolean\n}"));
}

#[test]
fn operation_table_binds_fields_to_type_names() {
    let schema = analyzed(
        r#"
        type Author @entry {
            id: ID!
            name: String
        }
        "#,
    );

    let (_, table) = generate_operations(&schema);

    assert_eq!(
        table.query("allAuthors"),
        Some(&Operation::ListAll {
            type_name: "Author".to_string()
        })
    );
    assert_eq!(
        table.query("_allAuthorsMeta"),
        Some(&Operation::CountMeta {
            type_name: "Author".to_string()
        })
    );
    assert_eq!(
        table.query("Author"),
        Some(&Operation::ById {
            type_name: "Author".to_string()
        })
    );
    assert_eq!(table.query("_typeName"), Some(&Operation::TypeName));
    assert_eq!(
        table.mutation("createAuthor"),
        Some(&Operation::Create {
            type_name: "Author".to_string()
        })
    );
    assert_eq!(
        table.mutation("deleteAuthor"),
        Some(&Operation::Delete {
            type_name: "Author".to_string()
        })
    );
    assert!(table.query("allPosts").is_none());
}

#[test]
fn no_mutation_type_without_entry_types() {
    let schema = analyzed(
        r#"
        type Fragment {
            text: String
        }
        "#,
    );

    let generated = generate_schema(&schema).unwrap();
    assert!(generated.sdl.contains("type Query {"));
    assert!(!generated.sdl.contains("type Mutation"));
    assert!(generated.operations.mutations.is_empty());
}
