//! Integration tests for structural tree operations: sibling-chain integrity
//! across create/indent/outdent/move/combine/delete, visible-node traversal,
//! and bulk initialization.

use nodespace_document_model::models::{Node, NodeType};
use nodespace_document_model::storage::MemoryNodeSource;
use nodespace_document_model::store::{
    CreateNodeParams, DeletePolicy, DocumentError, DocumentStore,
};
use nodespace_document_model::ChangeOperation;
use serde_json::json;

/// Opt-in operation logging for test debugging: `RUST_LOG=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn store() -> DocumentStore {
    init_tracing();
    DocumentStore::with_default_patterns()
}

fn create(store: &mut DocumentStore, content: &str, parent: Option<&str>) -> String {
    store
        .create_node(CreateNodeParams {
            id: None,
            node_type: NodeType::Text,
            content: content.to_string(),
            parent_id: parent.map(str::to_string),
            insert_after_node_id: None,
            properties: json!({}),
        })
        .unwrap()
}

fn contents(store: &DocumentStore, parent: Option<&str>) -> Vec<String> {
    store
        .children(parent)
        .into_iter()
        .map(|n| n.content.clone())
        .collect()
}

/// Walks every parent's chain and asserts it is a single well-formed sequence.
fn assert_chain_integrity(store: &DocumentStore, parent: Option<&str>) {
    let children = store.children(parent);
    for (index, node) in children.iter().enumerate() {
        let expected_before = if index == 0 {
            None
        } else {
            Some(children[index - 1].id.clone())
        };
        assert_eq!(
            node.before_sibling_id, expected_before,
            "chain broken at '{}'",
            node.content
        );
    }
}

#[test]
fn indent_makes_node_last_child_of_preceding_sibling() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let _a1 = create(&mut store, "a1", Some(&a));

    store.indent_node(&b).unwrap();

    assert_eq!(contents(&store, None), vec!["a"]);
    assert_eq!(contents(&store, Some(&a)), vec!["a1", "b"]);
    assert_chain_integrity(&store, Some(&a));
}

#[test]
fn outdent_makes_node_next_sibling_of_parent() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let a1 = create(&mut store, "a1", Some(&a));

    store.outdent_node(&a1).unwrap();

    assert_eq!(contents(&store, None), vec!["a", "a1", "b"]);
    assert_eq!(store.find_node(&b).unwrap().before_sibling_id, Some(a1));
    assert_chain_integrity(&store, None);
}

#[test]
fn indent_then_outdent_restores_original_shape() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let c = create(&mut store, "c", None);
    let b1 = create(&mut store, "b1", Some(&b));

    store.indent_node(&b).unwrap();
    // b is now a's child; its own child and the trailing sibling are intact
    assert_eq!(contents(&store, None), vec!["a", "c"]);
    assert_eq!(contents(&store, Some(&a)), vec!["b"]);
    assert_eq!(contents(&store, Some(&b)), vec!["b1"]);

    store.outdent_node(&b).unwrap();
    assert_eq!(contents(&store, None), vec!["a", "b", "c"]);
    assert_eq!(contents(&store, Some(&b)), vec!["b1"]);
    assert_eq!(store.find_node(&c).unwrap().before_sibling_id, Some(b));
    assert_eq!(store.find_node(&b1).unwrap().parent_id, Some(store.children(None)[1].id.clone()));
    assert_chain_integrity(&store, None);
}

#[test]
fn outdented_node_keeps_its_own_children() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let a1 = create(&mut store, "a1", Some(&a));
    let _a1x = create(&mut store, "a1x", Some(&a1));
    let _a2 = create(&mut store, "a2", Some(&a));

    store.outdent_node(&a1).unwrap();

    assert_eq!(contents(&store, None), vec!["a", "a1"]);
    // a1's subtree moved with it; a2 stayed behind under a
    assert_eq!(contents(&store, Some(&a1)), vec!["a1x"]);
    assert_eq!(contents(&store, Some(&a)), vec!["a2"]);
    assert_chain_integrity(&store, Some(&a));
}

#[test]
fn delete_promotes_children_at_the_deletion_point() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let c = create(&mut store, "c", None);
    let _b1 = create(&mut store, "b1", Some(&b));
    let _b2 = create(&mut store, "b2", Some(&b));

    store.delete_node(&b).unwrap();

    // Children splice in exactly where b was, order preserved
    assert_eq!(contents(&store, None), vec!["a", "b1", "b2", "c"]);
    assert!(store.find_node(&b).is_none());
    assert_chain_integrity(&store, None);
    let _ = (a, c);
}

#[test]
fn delete_head_without_children_relinks_successor() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);

    store.delete_node(&a).unwrap();
    assert_eq!(contents(&store, None), vec!["b"]);
    assert_eq!(store.find_node(&b).unwrap().before_sibling_id, None);
}

#[test]
fn combine_merges_content_children_and_reports_cursor_offset() {
    let mut store = store();
    let prev = create(&mut store, "hello", None);
    let current = create(&mut store, " world", None);
    let _p1 = create(&mut store, "p1", Some(&prev));
    let _c1 = create(&mut store, "c1", Some(&current));
    let _c2 = create(&mut store, "c2", Some(&current));

    let offset = store.combine_nodes(&current, &prev).unwrap();

    assert_eq!(offset, 5);
    let merged = store.find_node(&prev).unwrap();
    assert_eq!(merged.content, "hello world");
    assert!(store.find_node(&current).is_none());
    // Current's children append after previous's existing children
    assert_eq!(contents(&store, Some(&prev)), vec!["p1", "c1", "c2"]);
    assert_chain_integrity(&store, Some(&prev));
}

#[test]
fn combine_offset_counts_characters_not_bytes() {
    let mut store = store();
    let prev = create(&mut store, "héllo", None);
    let current = create(&mut store, "!", None);

    let offset = store.combine_nodes(&current, &prev).unwrap();
    assert_eq!(offset, 5);
    assert_eq!(store.find_node(&prev).unwrap().content, "héllo!");
}

#[test]
fn move_node_between_parents_preserves_both_chains() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let a1 = create(&mut store, "a1", Some(&a));
    let a2 = create(&mut store, "a2", Some(&a));
    let _a3 = create(&mut store, "a3", Some(&a));
    let b1 = create(&mut store, "b1", Some(&b));

    store.move_node(&a2, Some(&b), Some(&b1)).unwrap();

    assert_eq!(contents(&store, Some(&a)), vec!["a1", "a3"]);
    assert_eq!(contents(&store, Some(&b)), vec!["b1", "a2"]);
    assert_chain_integrity(&store, Some(&a));
    assert_chain_integrity(&store, Some(&b));
    let _ = a1;
}

#[test]
fn reordering_a_node_onto_its_current_position_is_a_noop() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let _c = create(&mut store, "c", None);

    // Same predecessor as before: replayed remote moves often land here
    store.move_node(&b, None, Some(&a)).unwrap();
    assert_eq!(contents(&store, None), vec!["a", "b", "c"]);
    assert_chain_integrity(&store, None);

    // Already head of its parent
    store.move_node(&a, None, None).unwrap();
    assert_eq!(contents(&store, None), vec!["a", "b", "c"]);
    assert_chain_integrity(&store, None);
}

#[test]
fn combine_into_own_parent_absorbs_the_child() {
    let mut store = store();
    let parent = create(&mut store, "intro", None);
    let child = create(&mut store, " detail", Some(&parent));
    let _grandchild = create(&mut store, "g", Some(&child));

    let offset = store.combine_nodes(&child, &parent).unwrap();

    assert_eq!(offset, 5);
    assert_eq!(store.find_node(&parent).unwrap().content, "intro detail");
    assert!(store.find_node(&child).is_none());
    assert_eq!(contents(&store, Some(&parent)), vec!["g"]);
    assert_chain_integrity(&store, Some(&parent));
}

#[test]
fn split_places_new_node_before_old_successor() {
    let mut store = store();
    let a = create(&mut store, "hello world", None);
    let b = create(&mut store, "next", None);

    let (new_id, cursor) = store.split_node(&a, 5).unwrap();

    assert_eq!(cursor, 0);
    assert_eq!(store.find_node(&a).unwrap().content, "hello");
    assert_eq!(store.find_node(&new_id).unwrap().content, " world");
    assert_eq!(contents(&store, None), vec!["hello", " world", "next"]);
    assert_eq!(
        store.find_node(&b).unwrap().before_sibling_id,
        Some(new_id)
    );
}

#[test]
fn visible_nodes_is_depth_first_and_respects_collapse() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let a1 = create(&mut store, "a1", Some(&a));
    let _a1x = create(&mut store, "a1x", Some(&a1));
    let b = create(&mut store, "b", None);
    let _b1 = create(&mut store, "b1", Some(&b));

    let visible: Vec<&str> = store.visible_nodes().iter().map(|n| n.content.as_str()).collect();
    assert_eq!(visible, vec!["a", "a1", "a1x", "b", "b1"]);

    store.set_expanded(&a1, false).unwrap();
    let visible: Vec<&str> = store.visible_nodes().iter().map(|n| n.content.as_str()).collect();
    assert_eq!(visible, vec!["a", "a1", "b", "b1"]);

    // A collapsed node's subtree stays intact and reappears on expand
    store.set_expanded(&a1, true).unwrap();
    let visible: Vec<&str> = store.visible_nodes().iter().map(|n| n.content.as_str()).collect();
    assert_eq!(visible, vec!["a", "a1", "a1x", "b", "b1"]);
}

#[test]
fn repeated_reads_between_mutations_stay_consistent() {
    let mut store = store();
    let a = create(&mut store, "a", None);
    let _b = create(&mut store, "b", None);

    // Cached order is served for repeated reads and refreshed after mutation
    assert_eq!(contents(&store, None), vec!["a", "b"]);
    assert_eq!(contents(&store, None), vec!["a", "b"]);

    let c = create(&mut store, "c", Some(&a));
    assert_eq!(contents(&store, None), vec!["a", "b"]);
    assert_eq!(contents(&store, Some(&a)), vec!["c"]);

    store.move_node(&c, None, Some(&a)).unwrap();
    assert_eq!(contents(&store, None), vec!["a", "c", "b"]);
    assert_eq!(contents(&store, Some(&a)), Vec::<String>::new());
}

#[test]
fn initialize_seeds_a_full_tree_without_events() {
    let mut seeded = Vec::new();
    let root = Node::new(NodeType::Text, "root".to_string(), None);
    let mut first = Node::new(NodeType::Text, "first".to_string(), Some(root.id.clone()));
    let mut second = Node::new(NodeType::Text, "second".to_string(), Some(root.id.clone()));
    second.before_sibling_id = Some(first.id.clone());
    first.before_sibling_id = None;
    let root_id = root.id.clone();
    seeded.extend([root, first, second]);

    let mut store = store();
    let mut rx = store.subscribe();
    store.initialize_nodes(seeded).unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(contents(&store, Some(&root_id)), vec!["first", "second"]);
    // Seeding is not an edit
    assert!(rx.try_recv().is_err());
}

#[test]
fn initialize_rederives_pattern_state_from_content() {
    let mut header = Node::new(NodeType::Header, "# Loaded".to_string(), None);
    header.properties = json!({ "level": 1 });
    let id = header.id.clone();

    let mut store = store();
    store.initialize_nodes(vec![header]).unwrap();

    // The reloaded header reverts exactly like a live-converted one
    store.update_content(&id, "#").unwrap();
    assert_eq!(store.find_node(&id).unwrap().node_type, NodeType::Text);
}

#[tokio::test]
async fn load_from_source_seeds_the_store() {
    let nodes = vec![
        Node::new(NodeType::Text, "a".to_string(), None),
        Node::new(NodeType::Text, "b".to_string(), None),
    ];
    // Unlinked siblings are invalid input, so give them a chain
    let mut nodes = nodes;
    nodes[1].before_sibling_id = Some(nodes[0].id.clone());
    let source = MemoryNodeSource::with_nodes(nodes);

    let mut store = store();
    store.load_from(&source).await.unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(contents(&store, None), vec!["a", "b"]);
}

#[tokio::test]
async fn structural_operations_publish_expected_event_sequence() {
    let mut store = DocumentStore::with_default_patterns().with_source("client-a");
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", None);
    let _b1 = create(&mut store, "b1", Some(&b));

    let mut rx = store.subscribe();
    store.delete_node(&b).unwrap();

    // Deleted first, then one update per promoted child
    let deleted = rx.recv().await.unwrap();
    assert_eq!(deleted.operation, ChangeOperation::Deleted);
    assert_eq!(deleted.node_id, b);
    let promoted = rx.recv().await.unwrap();
    assert_eq!(promoted.operation, ChangeOperation::Updated);
    assert_eq!(promoted.content.as_deref(), Some("b1"));
    assert_eq!(promoted.parent_id, None);
    let _ = a;
}

#[test]
fn subtree_delete_retires_every_descendant_id() {
    let mut store =
        DocumentStore::with_default_patterns().with_delete_policy(DeletePolicy::RemoveSubtree);
    let a = create(&mut store, "a", None);
    let b = create(&mut store, "b", Some(&a));
    let b_id = b.clone();

    store.delete_node(&a).unwrap();

    // Descendant ids are retired too, never reusable
    let reuse = store.create_node(CreateNodeParams {
        id: Some(b_id),
        ..CreateNodeParams::new(NodeType::Text, "reborn")
    });
    assert!(matches!(reuse, Err(DocumentError::DuplicateId { .. })));
}

#[test]
fn thousand_node_document_stays_consistent() {
    let mut store = store();
    let mut ids = Vec::with_capacity(1000);
    for i in 0..200 {
        let parent = create(&mut store, &format!("section {i}"), None);
        for j in 0..4 {
            ids.push(create(&mut store, &format!("item {i}.{j}"), Some(&parent)));
        }
        ids.push(parent);
    }
    assert_eq!(store.len(), 1000);
    assert_eq!(store.visible_nodes().len(), 1000);

    // Structural churn in the middle of the document
    let target = &ids[501];
    assert!(store.find_node(target).unwrap().before_sibling_id.is_some());
    store.indent_node(target).unwrap();
    store.outdent_node(target).unwrap();
    assert_eq!(store.len(), 1000);
    assert_chain_integrity(&store, None);
}
