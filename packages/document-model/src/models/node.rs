//! Node Data Structures
//!
//! This module defines the core `Node` struct: one content block in the
//! document tree.
//!
//! # Architecture
//!
//! - **Linked sibling ordering**: nodes sharing a parent form a singly-linked
//!   list through `before_sibling_id`, so insertion and moves are O(1) splices
//!   instead of array shifts
//! - **Typed content**: `node_type` is a closed enum; type-specific metadata
//!   (header level, task completion) lives in the JSON `properties` field
//! - **Derived pattern state**: `pattern_state` is in-memory only, re-derivable
//!   from content plus type, and never persisted
//!
//! # Examples
//!
//! ```rust
//! use nodespace_document_model::models::{Node, NodeType};
//!
//! // A root-level plain text node
//! let note = Node::new(NodeType::Text, "My first note".to_string(), None);
//! assert!(note.parent_id.is_none());
//! assert!(note.expanded);
//!
//! // A child header node
//! let heading = Node::new(
//!     NodeType::Header,
//!     "# Weekly plan".to_string(),
//!     Some(note.id.clone()),
//! );
//! ```

use crate::models::NodeType;
use crate::patterns::PatternState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Default expansion state for serde deserialization (children visible)
fn default_expanded() -> bool {
    true
}

/// Default properties value for serde deserialization (empty object)
fn default_properties() -> serde_json::Value {
    json!({})
}

/// A single content block in the document tree.
///
/// # Fields
///
/// - `id`: unique identifier, immutable for the node's lifetime and never
///   reused within a session
/// - `node_type`: content type tag (text, header, task, ...)
/// - `content`: the editable text payload
/// - `parent_id`: owning node (`None` = root level)
/// - `before_sibling_id`: the sibling that precedes this node under the same
///   parent; `None` means head of the chain
/// - `expanded`: whether children are currently visible
/// - `properties`: pattern-extracted metadata as a JSON object
/// - `pattern_state`: in-memory pattern lifecycle state (not serialized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Content type of this node
    pub node_type: NodeType,

    /// Primary content/text of the node
    pub content: String,

    /// Parent node ID (`None` = root level)
    pub parent_id: Option<String>,

    /// Sibling ordering reference (single-pointer linked list)
    pub before_sibling_id: Option<String>,

    /// Whether children are currently visible
    #[serde(default = "default_expanded")]
    pub expanded: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,

    /// Type-specific metadata extracted by patterns (header level, task
    /// completion, code language)
    #[serde(default = "default_properties")]
    pub properties: serde_json::Value,

    /// Pattern lifecycle state; derived from content plus type, never persisted
    #[serde(skip, default)]
    pub pattern_state: PatternState,
}

impl Node {
    /// Create a new node with an auto-generated UUID.
    ///
    /// The node starts as head of no chain (`before_sibling_id = None`),
    /// expanded, with empty properties and user-sourced pattern state; the
    /// store assigns chain position and pattern state on insertion.
    pub fn new(node_type: NodeType, content: String, parent_id: Option<String>) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, content, parent_id)
    }

    /// Create a new node with an explicit ID.
    ///
    /// Used when the frontend pre-generates UUIDs for optimistic UI updates,
    /// and when replaying remote changes that carry their own ids.
    pub fn new_with_id(
        id: String,
        node_type: NodeType,
        content: String,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            node_type,
            content,
            parent_id,
            before_sibling_id: None,
            expanded: true,
            created_at: now,
            modified_at: now,
            properties: json!({}),
            pattern_state: PatternState::user(),
        }
    }

    /// Update the modification timestamp to now.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}
