//! Error types for document tree operations
//!
//! Structural-precondition failures are returned to the caller as typed
//! errors; the operation is rejected and the tree is left unchanged. Invariant
//! violations discovered internally (a corrupted sibling chain, for example)
//! are programming errors in the store itself and panic instead of returning
//! one of these.

use thiserror::Error;

/// Errors that can occur during document tree operations
///
/// # Examples
///
/// ```rust
/// use nodespace_document_model::store::DocumentError;
///
/// let err = DocumentError::no_preceding_sibling("node-123".to_string());
/// assert_eq!(
///     format!("{}", err),
///     "Node 'node-123' has no preceding sibling to indent under"
/// );
/// ```
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Referenced node does not exist
    #[error("Node '{node_id}' does not exist")]
    NodeNotFound { node_id: String },

    /// Node ids are unique for the lifetime of a session and never reused
    #[error("Node id '{node_id}' already exists or was used earlier in this session")]
    DuplicateId { node_id: String },

    /// Indent requires a preceding sibling to become the new parent
    #[error("Node '{node_id}' has no preceding sibling to indent under")]
    NoPrecedingSibling { node_id: String },

    /// Outdent is impossible at root level
    #[error("Node '{node_id}' is at root level and cannot be outdented")]
    NoParent { node_id: String },

    /// Reparenting would make a node its own ancestor
    #[error("Moving node '{node_id}' under '{ancestor_id}' would create a cycle")]
    CycleDetected {
        node_id: String,
        ancestor_id: String,
    },

    /// A node references a parent that does not exist
    #[error("Node '{node_id}' references missing parent '{parent_id}'")]
    DanglingParentReference { node_id: String, parent_id: String },

    /// The requested sibling placement is invalid
    #[error("Invalid sibling chain: {reason}")]
    InvalidSiblingChain { reason: String },

    /// Bulk initialization is only valid on an empty store
    #[error("Store already holds {node_count} nodes; bulk initialization requires an empty store")]
    AlreadyInitialized { node_count: usize },
}

impl DocumentError {
    /// Create a NodeNotFound error
    pub fn node_not_found(node_id: String) -> Self {
        Self::NodeNotFound { node_id }
    }

    /// Create a DuplicateId error
    pub fn duplicate_id(node_id: String) -> Self {
        Self::DuplicateId { node_id }
    }

    /// Create a NoPrecedingSibling error
    pub fn no_preceding_sibling(node_id: String) -> Self {
        Self::NoPrecedingSibling { node_id }
    }

    /// Create a NoParent error
    pub fn no_parent(node_id: String) -> Self {
        Self::NoParent { node_id }
    }

    /// Create a CycleDetected error
    pub fn cycle_detected(node_id: String, ancestor_id: String) -> Self {
        Self::CycleDetected {
            node_id,
            ancestor_id,
        }
    }

    /// Create a DanglingParentReference error
    pub fn dangling_parent(node_id: String, parent_id: String) -> Self {
        Self::DanglingParentReference { node_id, parent_id }
    }

    /// Create an InvalidSiblingChain error
    pub fn invalid_sibling_chain(reason: String) -> Self {
        Self::InvalidSiblingChain { reason }
    }
}
