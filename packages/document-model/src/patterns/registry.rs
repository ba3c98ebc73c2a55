//! Pattern Registry
//!
//! Holds the set of recognized content patterns and resolves which pattern, if
//! any, matches a block's content. Each pattern pairs a detection regex with a
//! target node type, a priority, and the conversion policy (cursor placement,
//! whether the marker is stripped from content, optional metadata extraction).
//!
//! The registry is an explicitly constructed value that gets injected into the
//! document store at construction time; there is no ambient global state.
//! Detection is a pure function: it scans patterns in descending priority order
//! (ties broken by registration order) and returns the first match. Absence of
//! a match is a normal outcome, not an error.

use crate::models::NodeType;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::sync::Arc;

/// Where the cursor lands after a pattern converts a node's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPlacement {
    /// Keep the cursor where the user was typing
    Preserve,
    /// Jump to the start of the converted content (stripped-marker types)
    ContentStart,
}

/// Extracts type-specific metadata from a detection match (header level, task
/// completion, code language). Stored into the node's `properties`.
pub type MetadataExtractor = fn(&Captures<'_>) -> Value;

/// A single registered content pattern.
///
/// The `revert` expression is deliberately distinct from (and usually shorter
/// than) `detect`: detection fires on `^# ` but reversion fires on `^#$`, so
/// deleting the trailing space of the marker reverts the node while normal
/// typing does not. Patterns whose marker is stripped from content on
/// conversion have no revert expression at all.
#[derive(Debug)]
pub struct PatternDescriptor {
    /// Unique name; re-registering an existing name is a no-op
    pub name: String,
    /// Detection expression, matched against the full content
    pub detect: Regex,
    /// Reversion expression for the "almost deleted the marker" state
    pub revert: Option<Regex>,
    /// Node type the content converts to on match
    pub target: NodeType,
    /// Higher priority patterns are tried first
    pub priority: i32,
    /// Cursor rule applied by the UI after conversion
    pub cursor: CursorPlacement,
    /// Whether the matched marker text is removed from content on conversion
    pub strips_marker: bool,
    /// Optional extractor for type-specific properties
    pub metadata: Option<MetadataExtractor>,
}

/// A detected pattern: the source descriptor, the matched marker text, the
/// resulting type, and any extracted metadata.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Descriptor that produced this match
    pub descriptor: Arc<PatternDescriptor>,
    /// The text matched by the detection expression (the marker)
    pub marker: String,
    /// Node type the content converts to
    pub target: NodeType,
    /// Extracted type-specific properties (empty object when none)
    pub metadata: Value,
}

impl PatternMatch {
    /// Content of the node after conversion: the marker is removed for
    /// stripped-marker patterns, kept verbatim otherwise.
    pub fn converted_content(&self, content: &str) -> String {
        if self.descriptor.strips_marker {
            self.descriptor.detect.replace(content, "").into_owned()
        } else {
            content.to_string()
        }
    }

    /// Whether nodes converted by this pattern are eligible for reversion.
    pub fn supports_revert(&self) -> bool {
        self.descriptor.revert.is_some()
    }

    /// Check the dedicated reversion expression against current content.
    pub fn revert_matches(&self, content: &str) -> bool {
        self.descriptor
            .revert
            .as_ref()
            .is_some_and(|re| re.is_match(content))
    }
}

/// Registry of content patterns, sorted by descending priority.
///
/// # Examples
///
/// ```rust
/// use nodespace_document_model::patterns::PatternRegistry;
/// use nodespace_document_model::models::NodeType;
///
/// let registry = PatternRegistry::with_defaults();
///
/// let m = registry.detect("# Title").expect("header should match");
/// assert_eq!(m.target, NodeType::Header);
///
/// assert!(registry.detect("hello").is_none());
/// ```
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<Arc<PatternDescriptor>>,
}

impl PatternRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-loaded with the built-in pattern set
    /// (header, task, quote, code fence, ordered list).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_patterns() {
            registry.register(descriptor);
        }
        registry
    }

    /// Register a pattern, keeping the set sorted by descending priority with
    /// ties broken by registration order.
    ///
    /// Returns `false` (and leaves the registry unchanged) if a pattern with
    /// the same name is already registered, making startup registration
    /// idempotent.
    pub fn register(&mut self, descriptor: PatternDescriptor) -> bool {
        if self.patterns.iter().any(|p| p.name == descriptor.name) {
            tracing::debug!(name = %descriptor.name, "pattern already registered, skipping");
            return false;
        }
        let position = self
            .patterns
            .iter()
            .position(|p| p.priority < descriptor.priority)
            .unwrap_or(self.patterns.len());
        self.patterns.insert(position, Arc::new(descriptor));
        true
    }

    /// Scan registered patterns in priority order and return the first match.
    ///
    /// Pure function: no side effects, and no match is `None`, never an error.
    pub fn detect(&self, content: &str) -> Option<PatternMatch> {
        for descriptor in &self.patterns {
            if let Some(captures) = descriptor.detect.captures(content) {
                let marker = captures
                    .get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let metadata = match descriptor.metadata {
                    Some(extract) => extract(&captures),
                    None => json!({}),
                };
                return Some(PatternMatch {
                    descriptor: Arc::clone(descriptor),
                    marker,
                    target: descriptor.target,
                    metadata,
                });
            }
        }
        None
    }

    /// Look up a registered pattern by name.
    pub fn get(&self, name: &str) -> Option<&Arc<PatternDescriptor>> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the registry has no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn header_metadata(captures: &Captures<'_>) -> Value {
    let level = captures.get(1).map(|m| m.as_str().len()).unwrap_or(1);
    json!({ "level": level })
}

fn task_metadata(captures: &Captures<'_>) -> Value {
    let completed = captures
        .get(1)
        .map(|m| m.as_str().eq_ignore_ascii_case("x"))
        .unwrap_or(false);
    json!({ "completed": completed })
}

fn code_metadata(captures: &Captures<'_>) -> Value {
    let language = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    json!({ "language": language })
}

/// The built-in pattern set.
///
/// Task and code-fence markers are stripped from content on conversion, so
/// those patterns carry no revert expression; the remaining patterns revert
/// when all but the marker's trailing space has been deleted.
fn builtin_patterns() -> Vec<PatternDescriptor> {
    vec![
        PatternDescriptor {
            name: "header".to_string(),
            detect: Regex::new(r"^(#{1,6}) ").expect("valid header pattern"),
            revert: Some(Regex::new(r"^(#{1,6})$").expect("valid header revert pattern")),
            target: NodeType::Header,
            priority: 100,
            cursor: CursorPlacement::Preserve,
            strips_marker: false,
            metadata: Some(header_metadata),
        },
        PatternDescriptor {
            name: "task".to_string(),
            detect: Regex::new(r"^\[([xX ]?)\] ").expect("valid task pattern"),
            revert: None,
            target: NodeType::Task,
            priority: 90,
            cursor: CursorPlacement::ContentStart,
            strips_marker: true,
            metadata: Some(task_metadata),
        },
        PatternDescriptor {
            name: "code-block".to_string(),
            detect: Regex::new(r"^```(\w*)$").expect("valid code fence pattern"),
            revert: None,
            target: NodeType::CodeBlock,
            priority: 80,
            cursor: CursorPlacement::ContentStart,
            strips_marker: true,
            metadata: Some(code_metadata),
        },
        PatternDescriptor {
            name: "quote-block".to_string(),
            detect: Regex::new(r"^> ").expect("valid quote pattern"),
            revert: Some(Regex::new(r"^>$").expect("valid quote revert pattern")),
            target: NodeType::QuoteBlock,
            priority: 70,
            cursor: CursorPlacement::Preserve,
            strips_marker: false,
            metadata: None,
        },
        PatternDescriptor {
            name: "ordered-list".to_string(),
            detect: Regex::new(r"^(\d+)\. ").expect("valid ordered list pattern"),
            revert: Some(Regex::new(r"^(\d+)\.$").expect("valid ordered list revert pattern")),
            target: NodeType::OrderedList,
            priority: 60,
            cursor: CursorPlacement::Preserve,
            strips_marker: false,
            metadata: None,
        },
    ]
}
