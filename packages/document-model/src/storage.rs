//! Persistence seam
//!
//! The document store is purely in-memory; durability lives behind the
//! [`NodeSource`] trait. A session seeds itself from a source at startup via
//! [`crate::store::DocumentStore::load_from`] and a persistence consumer
//! subscribed to the change stream writes mutations back.
//!
//! [`MemoryNodeSource`] is the in-process implementation used by tests and
//! headless sessions.

use crate::models::Node;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Backing storage for document nodes.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Load every node of the document.
    async fn load_nodes(&self) -> Result<Vec<Node>>;

    /// Persist a created or updated node.
    async fn save_node(&self, node: &Node) -> Result<()>;

    /// Remove a node from storage.
    async fn delete_node(&self, node_id: &str) -> Result<()>;
}

/// In-memory [`NodeSource`] holding nodes behind an async lock.
#[derive(Debug, Default)]
pub struct MemoryNodeSource {
    nodes: RwLock<Vec<Node>>,
}

impl MemoryNodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the source with nodes.
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Number of stored nodes.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Whether the source holds no nodes.
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[async_trait]
impl NodeSource for MemoryNodeSource {
    async fn load_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.read().await.clone())
    }

    async fn save_node(&self, node: &Node) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node.clone(),
            None => nodes.push(node.clone()),
        }
        Ok(())
    }

    async fn delete_node(&self, node_id: &str) -> Result<()> {
        self.nodes.write().await.retain(|n| n.id != node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    #[tokio::test]
    async fn test_save_inserts_then_updates() {
        let source = MemoryNodeSource::new();
        let mut node = Node::new(NodeType::Text, "first".to_string(), None);

        source.save_node(&node).await.unwrap();
        assert_eq!(source.len().await, 1);

        node.content = "second".to_string();
        source.save_node(&node).await.unwrap();

        let loaded = source.load_nodes().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "second");
    }

    #[tokio::test]
    async fn test_delete_removes_node() {
        let node = Node::new(NodeType::Text, "x".to_string(), None);
        let id = node.id.clone();
        let source = MemoryNodeSource::with_nodes(vec![node]);

        source.delete_node(&id).await.unwrap();
        assert!(source.is_empty().await);
    }
}
