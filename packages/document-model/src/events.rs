//! Change Events
//!
//! This module defines the typed, source-tagged stream of structural and
//! content mutations published by the document store. Consumers (the local
//! renderer, the persistence layer, remote clients relayed over a transport)
//! react to these events instead of re-deriving state from scratch.
//!
//! # Architecture
//!
//! Events are fanned out over a tokio broadcast channel: publishing is
//! fire-and-forget and never blocks the publisher, delivery is ordered per
//! subscriber, and dropping a receiver unsubscribes it. No ordering is
//! guaranteed across independently-sourced clients beyond eventual delivery.
//!
//! # Echo suppression
//!
//! Every event carries an optional `source` tag identifying the originating
//! client. A consumer that writes into its own store must ignore events whose
//! source matches its own identity, otherwise its writes round-trip back as
//! phantom remote changes.

use crate::models::{Node, NodeType};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity of the broadcast channel backing a [`ChangeBroadcaster`].
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// The kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeOperation {
    Created,
    Updated,
    Deleted,
}

/// A single document mutation, in the shape relayed to other clients:
/// `{ operation, nodeId, nodeType, content, parentId, source }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChange {
    /// What happened
    pub operation: ChangeOperation,

    /// The affected node
    pub node_id: String,

    /// Resulting node type (absent for deletions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Resulting content (absent for deletions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Resulting parent (absent for deletions and root-level nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Identity of the client that produced the change, for echo suppression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl NodeChange {
    /// Event for a newly created node.
    pub fn created(node: &Node, source: Option<String>) -> Self {
        Self::for_node(ChangeOperation::Created, node, source)
    }

    /// Event for an updated node (content, type, or parent changed).
    pub fn updated(node: &Node, source: Option<String>) -> Self {
        Self::for_node(ChangeOperation::Updated, node, source)
    }

    /// Event for a deleted node. Only the id survives deletion.
    pub fn deleted(node_id: String, source: Option<String>) -> Self {
        Self {
            operation: ChangeOperation::Deleted,
            node_id,
            node_type: None,
            content: None,
            parent_id: None,
            source,
        }
    }

    fn for_node(operation: ChangeOperation, node: &Node, source: Option<String>) -> Self {
        Self {
            operation,
            node_id: node.id.clone(),
            node_type: Some(node.node_type),
            content: Some(node.content.clone()),
            parent_id: node.parent_id.clone(),
            source,
        }
    }

    /// Whether this event originated from the given client identity.
    ///
    /// Consumers call this with their own identity and skip matching events.
    pub fn is_echo_of(&self, client_id: &str) -> bool {
        self.source.as_deref() == Some(client_id)
    }
}

/// Fan-out point for [`NodeChange`] events.
///
/// # Examples
///
/// ```rust
/// use nodespace_document_model::events::{ChangeBroadcaster, NodeChange};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let broadcaster = ChangeBroadcaster::new();
/// let mut rx = broadcaster.subscribe();
///
/// broadcaster.publish(NodeChange::deleted("node-1".to_string(), None));
/// let event = rx.recv().await.unwrap();
/// assert_eq!(event.node_id, "node-1");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<NodeChange>,
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBroadcaster {
    /// Create a broadcaster with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a broadcaster with an explicit channel capacity. Slow
    /// subscribers that fall more than `capacity` events behind observe a
    /// `Lagged` error and skip ahead.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events. Dropping the receiver unsubscribes;
    /// dropping it twice is naturally a no-op.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeChange> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers, fire-and-forget.
    ///
    /// A send with zero subscribers is not an error; the event is simply
    /// dropped (expected in tests and headless sessions).
    pub fn publish(&self, change: NodeChange) {
        let _ = self.tx.send(change);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
