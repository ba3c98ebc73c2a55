//! Content Pattern System
//!
//! Typed-syntax detection and the per-node lifecycle around it:
//!
//! - [`PatternRegistry`] - registered patterns, priority-ordered detection
//! - [`PatternState`] - how a node acquired its type and whether it can revert

pub mod registry;
pub mod state;

pub use registry::{
    CursorPlacement, MetadataExtractor, PatternDescriptor, PatternMatch, PatternRegistry,
};
pub use state::{CreationSource, PatternState};
