//! Data Models
//!
//! Core data structures for the document model:
//!
//! - [`Node`] - a single content block in the document tree
//! - [`NodeType`] - the closed set of content types with per-type policy data

pub mod node;
pub mod node_type;

pub use node::Node;
pub use node_type::{NodeType, SplitStrategy};
