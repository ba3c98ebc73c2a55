//! Document Tree Store
//!
//! The authoritative in-memory structure of all nodes in one editing session:
//! identity, parent/child and sibling relationships, expansion state, and the
//! mutating operations (create, delete, indent, outdent, combine, split,
//! move). The store owns every `Node` exclusively; collaborators receive
//! read-only views or change events, never mutable references.
//!
//! # Architecture
//!
//! - **Linked sibling chains**: children of a parent are ordered by
//!   `before_sibling_id` pointers, so a single insert or move is an O(1)
//!   splice. Producing an ordered sequence requires a chain walk, which is
//!   cached per parent and invalidated only on structural mutation of that
//!   parent's children.
//! - **Single-threaded-cooperative**: all operations execute synchronously and
//!   atomically with respect to each other; there is no internal locking.
//! - **Events out, operations in**: every mutation publishes a source-tagged
//!   [`NodeChange`]. Other clients never touch this store directly; they
//!   replay the same operations against their own instance.
//!
//! Structural preconditions that fail (indent without a preceding sibling,
//! outdent at root, a move that would create a cycle) come back as
//! [`DocumentError`] values and leave the tree unchanged. A corrupted sibling
//! chain discovered during traversal is a bug in the store itself and panics.

pub mod error;

pub use error::DocumentError;

use crate::events::{ChangeBroadcaster, NodeChange};
use crate::models::{Node, NodeType};
use crate::patterns::{PatternRegistry, PatternState};
use crate::split::split_content;
use crate::storage::NodeSource;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for creating a node
///
/// The `id` field supports two scenarios: a frontend that pre-generates UUIDs
/// for optimistic UI updates passes its own id, while server-side callers
/// leave it `None` for auto-generation. Ids are unique for the session either
/// way; a collision is rejected with [`DocumentError::DuplicateId`].
#[derive(Debug, Clone)]
pub struct CreateNodeParams {
    /// Optional pre-generated id; auto-generated UUID when `None`
    pub id: Option<String>,
    /// Type of the node
    pub node_type: NodeType,
    /// Content of the node
    pub content: String,
    /// Optional parent node id (`None` = root level)
    pub parent_id: Option<String>,
    /// Optional sibling to insert after (appends to end when `None`)
    pub insert_after_node_id: Option<String>,
    /// Additional node properties as JSON
    pub properties: Value,
}

impl CreateNodeParams {
    /// Convenience constructor for the common case: type and content, no
    /// explicit id, appended at root level.
    pub fn new(node_type: NodeType, content: impl Into<String>) -> Self {
        Self {
            id: None,
            node_type,
            content: content.into(),
            parent_id: None,
            insert_after_node_id: None,
            properties: json!({}),
        }
    }
}

/// What happens to a deleted node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Children are promoted to the deleted node's parent, spliced in at the
    /// deletion point with relative order preserved (the default)
    #[default]
    PromoteChildren,
    /// The whole subtree is removed
    RemoveSubtree,
}

/// The in-memory document tree for one editing session.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use nodespace_document_model::models::NodeType;
/// use nodespace_document_model::patterns::PatternRegistry;
/// use nodespace_document_model::store::{CreateNodeParams, DocumentStore};
///
/// let registry = Arc::new(PatternRegistry::with_defaults());
/// let mut store = DocumentStore::new(registry).with_source("client-a");
///
/// let id = store
///     .create_node(CreateNodeParams::new(NodeType::Text, "hello"))
///     .unwrap();
/// assert_eq!(store.find_node(&id).unwrap().content, "hello");
/// ```
pub struct DocumentStore {
    nodes: HashMap<String, Node>,
    /// Resolved child order per parent (`None` = root level), invalidated
    /// only on structural mutation of that parent's children
    children_cache: RefCell<HashMap<Option<String>, Vec<String>>>,
    /// Ids of deleted nodes; never reused within the session
    retired_ids: HashSet<String>,
    registry: Arc<PatternRegistry>,
    broadcaster: ChangeBroadcaster,
    source: Option<String>,
    delete_policy: DeletePolicy,
}

impl DocumentStore {
    /// Create an empty store using the given pattern registry.
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            nodes: HashMap::new(),
            children_cache: RefCell::new(HashMap::new()),
            retired_ids: HashSet::new(),
            registry,
            broadcaster: ChangeBroadcaster::new(),
            source: None,
            delete_policy: DeletePolicy::default(),
        }
    }

    /// Create an empty store with the built-in pattern set.
    pub fn with_default_patterns() -> Self {
        Self::new(Arc::new(PatternRegistry::with_defaults()))
    }

    /// Tag all events published by this store with a client identity, so
    /// consumers can suppress echoes of their own writes.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the child-handling policy for deletions.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Subscribe to the change stream of this store.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NodeChange> {
        self.broadcaster.subscribe()
    }

    /// The broadcaster publishing this store's changes.
    pub fn broadcaster(&self) -> &ChangeBroadcaster {
        &self.broadcaster
    }

    /// Number of nodes in the store.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// O(1) lookup of a node by id.
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Ordered children of a parent (`None` = root level).
    pub fn children(&self, parent: Option<&str>) -> Vec<&Node> {
        let key = parent.map(str::to_string);
        self.ordered_children(&key)
            .iter()
            .map(|id| self.existing(id))
            .collect()
    }

    /// Ordered root-level nodes.
    pub fn root_nodes(&self) -> Vec<&Node> {
        self.children(None)
    }

    /// Depth-first sequence of nodes whose ancestors are all expanded.
    ///
    /// Re-entrant-safe to call at any time; each level's order comes from the
    /// per-parent cache, so repeated reads between mutations are cheap.
    pub fn visible_nodes(&self) -> Vec<&Node> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<String> = self.ordered_children(&None).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let node = self.existing(&id);
            result.push(node);
            if node.expanded {
                let children = self.ordered_children(&Some(id));
                stack.extend(children.into_iter().rev());
            }
        }
        result
    }

    /// Bulk-seed the store from the persistence layer.
    ///
    /// Validates referential integrity (parents exist, no parent cycles) and
    /// sibling-chain integrity per parent before inserting anything, so a bad
    /// batch leaves the store untouched. Pattern state is re-derived from
    /// content plus type. No events are published; seeding is not an edit.
    pub fn initialize_nodes(&mut self, nodes: Vec<Node>) -> Result<(), DocumentError> {
        if !self.nodes.is_empty() {
            return Err(DocumentError::AlreadyInitialized {
                node_count: self.nodes.len(),
            });
        }

        let mut ids = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !ids.insert(node.id.as_str()) || self.retired_ids.contains(&node.id) {
                return Err(DocumentError::duplicate_id(node.id.clone()));
            }
        }
        for node in &nodes {
            if let Some(parent) = &node.parent_id {
                if !ids.contains(parent.as_str()) {
                    return Err(DocumentError::dangling_parent(
                        node.id.clone(),
                        parent.clone(),
                    ));
                }
            }
        }

        // Parent-chain cycles: every node must reach root level within the
        // batch size in hops
        let parent_of: HashMap<&str, Option<&str>> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.parent_id.as_deref()))
            .collect();
        for node in &nodes {
            let mut hops = 0;
            let mut current = node.parent_id.as_deref();
            while let Some(id) = current {
                hops += 1;
                if hops > nodes.len() {
                    return Err(DocumentError::cycle_detected(
                        node.id.clone(),
                        id.to_string(),
                    ));
                }
                current = parent_of.get(id).copied().flatten();
            }
        }

        // Sibling chains per parent
        let mut groups: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();
        for node in &nodes {
            groups
                .entry(node.parent_id.as_deref())
                .or_default()
                .push(node);
        }
        for members in groups.values() {
            resolve_chain(members).map_err(DocumentError::invalid_sibling_chain)?;
        }

        tracing::debug!(count = nodes.len(), "initializing document store");
        for mut node in nodes {
            node.pattern_state = self.derive_pattern_state(&node);
            self.nodes.insert(node.id.clone(), node);
        }
        self.children_cache.borrow_mut().clear();
        Ok(())
    }

    /// Seed the store from a [`NodeSource`].
    pub async fn load_from(&mut self, source: &dyn NodeSource) -> anyhow::Result<()> {
        let nodes = source.load_nodes().await?;
        self.initialize_nodes(nodes)?;
        Ok(())
    }

    /// Create a node, spliced into the sibling chain after
    /// `insert_after_node_id` (or as the new tail when omitted).
    pub fn create_node(&mut self, params: CreateNodeParams) -> Result<String, DocumentError> {
        let id = params
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.nodes.contains_key(&id) || self.retired_ids.contains(&id) {
            return Err(DocumentError::duplicate_id(id));
        }
        if let Some(parent) = &params.parent_id {
            if !self.nodes.contains_key(parent) {
                return Err(DocumentError::dangling_parent(id, parent.clone()));
            }
        }
        if let Some(after) = &params.insert_after_node_id {
            let anchor = self
                .nodes
                .get(after)
                .ok_or_else(|| DocumentError::node_not_found(after.clone()))?;
            if anchor.parent_id != params.parent_id {
                return Err(DocumentError::invalid_sibling_chain(format!(
                    "anchor '{after}' is not a child of the target parent"
                )));
            }
        }

        let before_link = match &params.insert_after_node_id {
            Some(after) => Some(after.clone()),
            None => self.ordered_children(&params.parent_id).last().cloned(),
        };
        // Splicing mid-chain: the anchor's old successor now follows the new node
        if let Some(after) = &params.insert_after_node_id {
            if let Some(successor) = self.successor_of(&params.parent_id, after) {
                self.existing_mut(&successor).before_sibling_id = Some(id.clone());
            }
        }

        let matched = if params.node_type.is_plain_text() {
            None
        } else {
            self.registry
                .detect(&params.content)
                .filter(|m| m.target == params.node_type)
        };
        let mut node = Node::new_with_id(
            id.clone(),
            params.node_type,
            params.content,
            params.parent_id.clone(),
        );
        node.properties = params.properties;
        if let Some(m) = &matched {
            merge_properties(&mut node.properties, &m.metadata);
        }
        node.pattern_state = PatternState::for_created_node(
            !params.node_type.is_plain_text(),
            false,
            params.node_type,
            matched,
        );
        node.before_sibling_id = before_link;

        let change = NodeChange::created(&node, self.source.clone());
        self.nodes.insert(id.clone(), node);
        self.invalidate_children(&params.parent_id);
        tracing::debug!(node_id = %id, node_type = %params.node_type, "created node");
        self.broadcaster.publish(change);
        Ok(id)
    }

    /// Replace a node's content and run the pattern lifecycle: detection while
    /// the node is user-sourced, the reversion check otherwise. May change the
    /// node's type and properties as a result.
    pub fn update_content(
        &mut self,
        id: &str,
        content: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let content = content.into();
        let should_detect = self.get_required(id)?.pattern_state.should_detect_patterns();
        let detection = if should_detect {
            self.registry.detect(&content)
        } else {
            None
        };
        let source = self.source.clone();

        let node = self.existing_mut(id);
        if let Some(matched) = detection {
            tracing::debug!(
                node_id = %node.id,
                pattern = %matched.descriptor.name,
                target = %matched.target,
                "pattern detected, converting node type"
            );
            node.node_type = matched.target;
            node.content = matched.converted_content(&content);
            merge_properties(&mut node.properties, &matched.metadata);
            node.pattern_state.record_match(matched);
        } else {
            node.content = content;
            if node.pattern_state.attempt_revert(&node.content) {
                tracing::debug!(node_id = %node.id, "marker removed, reverting to plain text");
                node.node_type = NodeType::Text;
                node.properties = json!({});
            }
        }
        node.touch();
        let change = NodeChange::updated(node, source);
        self.broadcaster.publish(change);
        Ok(())
    }

    /// Toggle whether a node's children are visible. View state only: no
    /// change event is published and sibling caches are untouched.
    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> Result<(), DocumentError> {
        self.get_required(id)?;
        self.existing_mut(id).expanded = expanded;
        Ok(())
    }

    /// Delete a node. Children are handled per the configured
    /// [`DeletePolicy`]; the surrounding sibling chain is relinked either way.
    pub fn delete_node(&mut self, id: &str) -> Result<(), DocumentError> {
        self.get_required(id)?;
        match self.delete_policy {
            DeletePolicy::PromoteChildren => self.delete_promoting_children(id),
            DeletePolicy::RemoveSubtree => self.delete_subtree(id),
        }
        Ok(())
    }

    /// Re-parent a node under its immediately preceding sibling, as that
    /// sibling's last child.
    pub fn indent_node(&mut self, id: &str) -> Result<(), DocumentError> {
        let node = self.get_required(id)?;
        let old_parent = node.parent_id.clone();
        let previous = node
            .before_sibling_id
            .clone()
            .ok_or_else(|| DocumentError::no_preceding_sibling(id.to_string()))?;

        let new_parent = Some(previous);
        let tail = self.ordered_children(&new_parent).last().cloned();

        self.unlink(id);
        let source = self.source.clone();
        let node = self.existing_mut(id);
        node.parent_id = new_parent.clone();
        node.before_sibling_id = tail;
        node.touch();
        let change = NodeChange::updated(node, source);

        self.invalidate_children(&new_parent);
        tracing::debug!(node_id = %id, ?old_parent, ?new_parent, "indented node");
        self.broadcaster.publish(change);
        Ok(())
    }

    /// Re-parent a node to be the next sibling of its current parent.
    pub fn outdent_node(&mut self, id: &str) -> Result<(), DocumentError> {
        let node = self.get_required(id)?;
        let parent_id = node
            .parent_id
            .clone()
            .ok_or_else(|| DocumentError::no_parent(id.to_string()))?;
        let grandparent = self.existing(&parent_id).parent_id.clone();

        // The parent's old successor now follows the outdented node
        let parent_successor = self.successor_of(&grandparent, &parent_id);

        self.unlink(id);
        if let Some(successor) = parent_successor {
            self.existing_mut(&successor).before_sibling_id = Some(id.to_string());
        }
        let source = self.source.clone();
        let node = self.existing_mut(id);
        node.parent_id = grandparent.clone();
        node.before_sibling_id = Some(parent_id.clone());
        node.touch();
        let change = NodeChange::updated(node, source);

        self.invalidate_children(&grandparent);
        tracing::debug!(node_id = %id, old_parent = %parent_id, "outdented node");
        self.broadcaster.publish(change);
        Ok(())
    }

    /// Merge `current` onto the end of `previous`: content is concatenated,
    /// `current`'s children are appended to `previous`'s children in order,
    /// and `current` is deleted. Returns the merge point as a character
    /// offset into the combined content, for cursor placement.
    pub fn combine_nodes(
        &mut self,
        current_id: &str,
        previous_id: &str,
    ) -> Result<usize, DocumentError> {
        if current_id == previous_id {
            return Err(DocumentError::invalid_sibling_chain(
                "cannot combine a node with itself".to_string(),
            ));
        }
        self.get_required(previous_id)?;
        let current_content = self.get_required(current_id)?.content.clone();
        if self.is_ancestor(current_id, previous_id) {
            return Err(DocumentError::cycle_detected(
                previous_id.to_string(),
                current_id.to_string(),
            ));
        }

        let merge_offset = self.existing(previous_id).content.chars().count();
        let current_key = Some(current_id.to_string());
        let previous_key = Some(previous_id.to_string());

        let moved = self.ordered_children(&current_key);

        // Detach current before rehoming its children, so the chains stay
        // resolvable even when previous is current's own parent
        self.unlink(current_id);
        self.nodes.remove(current_id);
        self.retired_ids.insert(current_id.to_string());
        self.children_cache.borrow_mut().remove(&current_key);

        // Transfer children: current's chain is appended after previous's tail
        let previous_tail = self.ordered_children(&previous_key).last().cloned();
        if let Some(first) = moved.first() {
            self.existing_mut(first).before_sibling_id = previous_tail;
        }
        for child_id in &moved {
            let child = self.existing_mut(child_id);
            child.parent_id = previous_key.clone();
            child.touch();
        }
        self.invalidate_children(&previous_key);

        let source = self.source.clone();
        let previous = self.existing_mut(previous_id);
        previous.content.push_str(&current_content);
        previous.touch();
        let updated = NodeChange::updated(previous, source.clone());

        tracing::debug!(
            merged = %current_id,
            into = %previous_id,
            children = moved.len(),
            "combined nodes"
        );
        self.broadcaster.publish(updated);
        for child_id in &moved {
            let change = NodeChange::updated(self.existing(child_id), source.clone());
            self.broadcaster.publish(change);
        }
        self.broadcaster
            .publish(NodeChange::deleted(current_id.to_string(), source));
        Ok(merge_offset)
    }

    /// Split a node at a cursor offset ("new block" / Enter). The original
    /// node keeps the `before` fragment; a new node carrying the `after`
    /// fragment and the inherited type is spliced in as the next sibling.
    /// Returns the new node's id and the cursor offset within it.
    pub fn split_node(
        &mut self,
        id: &str,
        cursor_offset: usize,
    ) -> Result<(String, usize), DocumentError> {
        let node = self.get_required(id)?;
        let node_type = node.node_type;
        let parent = node.parent_id.clone();
        let result = split_content(&node.content, cursor_offset, node_type);

        let matched = if node_type.is_plain_text() {
            None
        } else {
            self.registry
                .detect(&result.after)
                .filter(|m| m.target == node_type)
        };
        let mut new_node = Node::new(node_type, result.after.clone(), parent.clone());
        if let Some(m) = &matched {
            merge_properties(&mut new_node.properties, &m.metadata);
        }
        new_node.pattern_state = PatternState::for_created_node(false, true, node_type, matched);
        new_node.before_sibling_id = Some(id.to_string());
        let new_id = new_node.id.clone();

        if let Some(successor) = self.successor_of(&parent, id) {
            self.existing_mut(&successor).before_sibling_id = Some(new_id.clone());
        }
        let source = self.source.clone();
        let original = self.existing_mut(id);
        original.content = result.before;
        original.touch();
        let updated = NodeChange::updated(original, source.clone());
        let created = NodeChange::created(&new_node, source);

        self.nodes.insert(new_id.clone(), new_node);
        self.invalidate_children(&parent);
        tracing::debug!(node_id = %id, new_node_id = %new_id, cursor_offset, "split node");
        self.broadcaster.publish(updated);
        self.broadcaster.publish(created);
        Ok((new_id, result.cursor_offset))
    }

    /// Move a node to a new parent and chain position. `insert_after = None`
    /// makes the node the first child; naming the last child appends.
    pub fn move_node(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        insert_after: Option<&str>,
    ) -> Result<(), DocumentError> {
        self.get_required(id)?;
        if let Some(parent) = new_parent {
            if parent == id {
                return Err(DocumentError::cycle_detected(
                    id.to_string(),
                    parent.to_string(),
                ));
            }
            if !self.nodes.contains_key(parent) {
                return Err(DocumentError::dangling_parent(
                    id.to_string(),
                    parent.to_string(),
                ));
            }
            if self.is_ancestor(id, parent) {
                return Err(DocumentError::cycle_detected(
                    id.to_string(),
                    parent.to_string(),
                ));
            }
        }
        let new_parent_key = new_parent.map(str::to_string);
        if let Some(after) = insert_after {
            if after == id {
                return Err(DocumentError::invalid_sibling_chain(
                    "node cannot anchor after itself".to_string(),
                ));
            }
            let anchor = self.get_required(after)?;
            if anchor.parent_id != new_parent_key {
                return Err(DocumentError::invalid_sibling_chain(format!(
                    "anchor '{after}' is not a child of the target parent"
                )));
            }
        }

        let new_before = insert_after.map(str::to_string);
        {
            let node = self.existing(id);
            // Already in the requested position (e.g. a replayed remote move):
            // nothing to splice, no event
            if node.parent_id == new_parent_key && node.before_sibling_id == new_before {
                return Ok(());
            }
        }
        // Resolve target-chain anchors before any mutation; with the no-op
        // case gone, the anchor's follower is never the moving node itself
        let relink_target = match insert_after {
            Some(after) => self.successor_of(&new_parent_key, after),
            None => self
                .ordered_children(&new_parent_key)
                .into_iter()
                .find(|child| child != id),
        };

        self.unlink(id);
        if let Some(target) = relink_target {
            self.existing_mut(&target).before_sibling_id = Some(id.to_string());
        }
        let source = self.source.clone();
        let node = self.existing_mut(id);
        node.parent_id = new_parent_key.clone();
        node.before_sibling_id = new_before;
        node.touch();
        let change = NodeChange::updated(node, source);

        self.invalidate_children(&new_parent_key);
        tracing::debug!(node_id = %id, ?new_parent_key, "moved node");
        self.broadcaster.publish(change);
        Ok(())
    }

    /// Whether `maybe_ancestor` appears on `id`'s parent chain.
    fn is_ancestor(&self, maybe_ancestor: &str, id: &str) -> bool {
        let mut hops = 0;
        let mut current = self.nodes.get(id).and_then(|n| n.parent_id.as_deref());
        while let Some(parent) = current {
            if parent == maybe_ancestor {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                panic!("store invariant violated: parent chain of '{id}' is cyclic");
            }
            current = self.nodes.get(parent).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    fn delete_promoting_children(&mut self, id: &str) {
        let parent = self.existing(id).parent_id.clone();
        let before = self.existing(id).before_sibling_id.clone();
        let own_key = Some(id.to_string());
        let children = self.ordered_children(&own_key);
        let successor = self.successor_of(&parent, id);

        if children.is_empty() {
            if let Some(succ) = &successor {
                self.existing_mut(succ).before_sibling_id = before;
            }
        } else {
            // Children take the deleted node's place in its parent's chain
            if let Some(first) = children.first() {
                self.existing_mut(first).before_sibling_id = before;
            }
            if let (Some(succ), Some(last)) = (&successor, children.last()) {
                self.existing_mut(succ).before_sibling_id = Some(last.clone());
            }
            for child_id in &children {
                let child = self.existing_mut(child_id);
                child.parent_id = parent.clone();
                child.touch();
            }
        }

        self.nodes.remove(id);
        self.retired_ids.insert(id.to_string());
        self.children_cache.borrow_mut().remove(&own_key);
        self.invalidate_children(&parent);

        let source = self.source.clone();
        tracing::debug!(node_id = %id, promoted = children.len(), "deleted node");
        self.broadcaster
            .publish(NodeChange::deleted(id.to_string(), source.clone()));
        for child_id in &children {
            let change = NodeChange::updated(self.existing(child_id), source.clone());
            self.broadcaster.publish(change);
        }
    }

    fn delete_subtree(&mut self, id: &str) {
        let parent = self.existing(id).parent_id.clone();
        let before = self.existing(id).before_sibling_id.clone();
        if let Some(succ) = self.successor_of(&parent, id) {
            self.existing_mut(&succ).before_sibling_id = before;
        }

        // Depth-first collection, node itself first
        let mut removed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            stack.extend(self.ordered_children(&Some(current.clone())));
            removed.push(current);
        }
        for node_id in &removed {
            self.nodes.remove(node_id);
            self.retired_ids.insert(node_id.clone());
            self.children_cache.borrow_mut().remove(&Some(node_id.clone()));
        }
        self.invalidate_children(&parent);

        let source = self.source.clone();
        tracing::debug!(node_id = %id, subtree = removed.len(), "deleted subtree");
        for node_id in removed {
            self.broadcaster
                .publish(NodeChange::deleted(node_id, source.clone()));
        }
    }

    /// Remove a node from its sibling chain, relinking its successor to its
    /// predecessor. The node's own pointers are left for the caller to set.
    fn unlink(&mut self, id: &str) {
        let parent = self.existing(id).parent_id.clone();
        let before = self.existing(id).before_sibling_id.clone();
        if let Some(successor) = self.successor_of(&parent, id) {
            self.existing_mut(&successor).before_sibling_id = before;
        }
        self.invalidate_children(&parent);
    }

    /// The node that currently follows `id` under `parent`, if any.
    ///
    /// Resolved from the cached chain order, so the cost is bounded by one
    /// parent's child count rather than the document size.
    fn successor_of(&self, parent: &Option<String>, id: &str) -> Option<String> {
        let children = self.ordered_children(parent);
        children
            .iter()
            .position(|child| child == id)
            .and_then(|index| children.get(index + 1).cloned())
    }

    /// Resolve the ordered child ids of a parent, from cache when possible.
    ///
    /// Panics if the chain is corrupt; that indicates a bug in the store, not
    /// invalid input.
    fn ordered_children(&self, parent: &Option<String>) -> Vec<String> {
        if let Some(cached) = self.children_cache.borrow().get(parent) {
            return cached.clone();
        }
        let members: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == *parent)
            .collect();
        let ordered = resolve_chain(&members).unwrap_or_else(|reason| {
            panic!("store invariant violated: sibling chain under {parent:?} corrupt: {reason}")
        });
        self.children_cache
            .borrow_mut()
            .insert(parent.clone(), ordered.clone());
        ordered
    }

    fn invalidate_children(&self, parent: &Option<String>) {
        self.children_cache.borrow_mut().remove(parent);
    }

    fn get_required(&self, id: &str) -> Result<&Node, DocumentError> {
        self.nodes
            .get(id)
            .ok_or_else(|| DocumentError::node_not_found(id.to_string()))
    }

    /// Internal accessor for nodes the store has already validated to exist.
    fn existing(&self, id: &str) -> &Node {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("store invariant violated: node '{id}' missing"))
    }

    fn existing_mut(&mut self, id: &str) -> &mut Node {
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|| panic!("store invariant violated: node '{id}' missing"))
    }

    /// Pattern state for a freshly loaded node, derived from content and type.
    fn derive_pattern_state(&self, node: &Node) -> PatternState {
        if node.node_type.is_plain_text() {
            PatternState::user()
        } else {
            let matched = self
                .registry
                .detect(&node.content)
                .filter(|m| m.target == node.node_type);
            PatternState::from_pattern(matched)
        }
    }
}

/// Merge extracted pattern metadata into a node's properties object.
fn merge_properties(properties: &mut Value, metadata: &Value) {
    if !properties.is_object() {
        *properties = json!({});
    }
    if let (Some(target), Some(extra)) = (properties.as_object_mut(), metadata.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Resolve a set of siblings into chain order.
///
/// Valid chains have exactly one head (no predecessor), every
/// `before_sibling_id` pointing at another member, no two nodes sharing a
/// predecessor, and no loops.
fn resolve_chain(members: &[&Node]) -> Result<Vec<String>, String> {
    if members.is_empty() {
        return Ok(Vec::new());
    }
    let ids: HashSet<&str> = members.iter().map(|n| n.id.as_str()).collect();
    let mut successor: HashMap<&str, &str> = HashMap::new();
    let mut heads: Vec<&str> = Vec::new();
    for node in members {
        match node.before_sibling_id.as_deref() {
            None => heads.push(node.id.as_str()),
            Some(before) => {
                if !ids.contains(before) {
                    return Err(format!(
                        "node '{}' points at '{before}' which is not a sibling",
                        node.id
                    ));
                }
                if successor.insert(before, node.id.as_str()).is_some() {
                    return Err(format!("two nodes follow '{before}'"));
                }
            }
        }
    }
    if heads.len() != 1 {
        return Err(format!("expected exactly one head, found {}", heads.len()));
    }
    let mut ordered = Vec::with_capacity(members.len());
    let mut current = Some(heads[0]);
    while let Some(id) = current {
        ordered.push(id.to_string());
        if ordered.len() > members.len() {
            return Err("chain loops".to_string());
        }
        current = successor.get(id).copied();
    }
    if ordered.len() != members.len() {
        return Err(format!(
            "chain reaches {} of {} siblings",
            ordered.len(),
            members.len()
        ));
    }
    Ok(ordered)
}
