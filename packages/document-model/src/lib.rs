//! NodeSpace Document Model
//!
//! In-memory document model for the NodeSpace outliner: a tree of typed
//! content nodes with markdown-style pattern conversion, keyboard-driven
//! structural editing, and a source-tagged change stream for multi-client
//! sync.
//!
//! # Architecture
//!
//! - **Linked sibling chains**: child order is a chain of `before_sibling_id`
//!   pointers, so inserts and moves are O(1) splices
//! - **Pattern lifecycle**: typing `# ` converts a node to a header; deleting
//!   the marker reverts it; explicit type choices never auto-revert
//! - **Events out, operations in**: every mutation publishes a [`NodeChange`]
//!   tagged with the originating client for echo suppression
//! - **Persistence behind a trait**: the store is memory-only; durability is
//!   a [`storage::NodeSource`] implementation plus a change-stream consumer
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeType)
//! - [`patterns`] - Pattern registry and per-node pattern state
//! - [`split`] - Content splitting for Enter-key handling
//! - [`store`] - The document tree store and its operations
//! - [`events`] - Change events and the broadcast channel
//! - [`storage`] - The persistence seam

pub mod events;
pub mod models;
pub mod patterns;
pub mod split;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use events::{ChangeBroadcaster, ChangeOperation, NodeChange};
pub use models::{Node, NodeType, SplitStrategy};
pub use patterns::{PatternMatch, PatternRegistry, PatternState};
pub use split::{split_content, SplitResult};
pub use store::{CreateNodeParams, DeletePolicy, DocumentError, DocumentStore};
