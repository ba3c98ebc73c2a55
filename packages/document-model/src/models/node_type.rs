//! Node Type System
//!
//! This module defines the closed set of content types a node can take, together
//! with the per-type policy data the rest of the document model consults:
//!
//! - which splitting strategy the Enter key uses for the type
//! - what the type's persistent leading marker looks like, if it has one
//! - whether a node that inherited the type from a split is allowed to revert
//!   back to plain text
//!
//! The set is fixed and known at compile time, so the type system is a tagged
//! enum rather than open-ended runtime polymorphism. The serialized tags match
//! the frontend's node type strings (`"text"`, `"quote-block"`, ...).

use serde::{Deserialize, Serialize};

/// Content type of a node.
///
/// # Examples
///
/// ```rust
/// use nodespace_document_model::models::NodeType;
///
/// assert_eq!(NodeType::QuoteBlock.as_str(), "quote-block");
/// assert!(NodeType::Text.is_plain_text());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// Plain text, the default type; pattern detection is active only here
    Text,
    /// Markdown-style header (`# ` through `###### `)
    Header,
    /// Task with a checkbox; the `[ ] ` trigger syntax is stripped on conversion
    Task,
    /// Block quote (`> `)
    QuoteBlock,
    /// Fenced code block; the ``` trigger syntax is stripped on conversion
    CodeBlock,
    /// Ordered list item (`1. `)
    OrderedList,
}

/// How the content splitter divides a node of a given type on Enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// The type's leading marker is carried onto the new node
    PrefixInheritance,
    /// Plain split at the cursor with inline-delimiter balancing
    Simple,
}

impl NodeType {
    /// The serialized tag for this type, as used in events and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Text => "text",
            NodeType::Header => "header",
            NodeType::Task => "task",
            NodeType::QuoteBlock => "quote-block",
            NodeType::CodeBlock => "code-block",
            NodeType::OrderedList => "ordered-list",
        }
    }

    /// Whether this is the plain-text type.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, NodeType::Text)
    }

    /// Splitting strategy the Enter key uses for this type.
    ///
    /// Types whose marker lives in the content (header, quote, ordered list)
    /// carry the marker onto the new node; everything else splits plainly.
    pub fn split_strategy(&self) -> SplitStrategy {
        match self {
            NodeType::Header | NodeType::QuoteBlock | NodeType::OrderedList => {
                SplitStrategy::PrefixInheritance
            }
            NodeType::Text | NodeType::Task | NodeType::CodeBlock => SplitStrategy::Simple,
        }
    }

    /// Whether a node that inherited this type from a split may revert to
    /// plain text when its marker is nearly deleted.
    ///
    /// Task and code-block nodes strip their trigger syntax from content on
    /// conversion, so there is no marker left to delete and reversion by
    /// retyping makes no sense for them.
    pub fn revertible_when_inherited(&self) -> bool {
        !matches!(self, NodeType::Task | NodeType::CodeBlock)
    }

    /// Extract this type's leading marker from `content`, if present.
    ///
    /// The marker is content-dependent: headers carry their level (`"## "`),
    /// ordered list items carry their number (`"12. "`). Returns `None` when
    /// the content does not start with a well-formed marker, or for types that
    /// have no persistent marker at all.
    pub fn leading_marker(&self, content: &str) -> Option<String> {
        match self {
            NodeType::Header => {
                let hashes = content.chars().take_while(|c| *c == '#').count();
                if (1..=6).contains(&hashes) && content[hashes..].starts_with(' ') {
                    Some(content[..hashes + 1].to_string())
                } else {
                    None
                }
            }
            NodeType::QuoteBlock => {
                if content.starts_with("> ") {
                    Some("> ".to_string())
                } else {
                    None
                }
            }
            NodeType::OrderedList => {
                let digits = content.chars().take_while(|c| c.is_ascii_digit()).count();
                if digits > 0 && content[digits..].starts_with(". ") {
                    Some(content[..digits + 2].to_string())
                } else {
                    None
                }
            }
            NodeType::Text | NodeType::Task | NodeType::CodeBlock => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tags_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&NodeType::QuoteBlock).unwrap(),
            "\"quote-block\""
        );
        assert_eq!(
            serde_json::to_string(&NodeType::OrderedList).unwrap(),
            "\"ordered-list\""
        );
        assert_eq!(serde_json::to_string(&NodeType::Text).unwrap(), "\"text\"");

        let parsed: NodeType = serde_json::from_str("\"code-block\"").unwrap();
        assert_eq!(parsed, NodeType::CodeBlock);
    }

    #[test]
    fn test_split_strategy_per_type() {
        assert_eq!(
            NodeType::Header.split_strategy(),
            SplitStrategy::PrefixInheritance
        );
        assert_eq!(
            NodeType::OrderedList.split_strategy(),
            SplitStrategy::PrefixInheritance
        );
        assert_eq!(NodeType::Text.split_strategy(), SplitStrategy::Simple);
        assert_eq!(NodeType::Task.split_strategy(), SplitStrategy::Simple);
    }

    #[test]
    fn test_header_marker_extraction() {
        assert_eq!(
            NodeType::Header.leading_marker("## Title"),
            Some("## ".to_string())
        );
        assert_eq!(NodeType::Header.leading_marker("####### too deep"), None);
        assert_eq!(NodeType::Header.leading_marker("#nospace"), None);
        assert_eq!(NodeType::Header.leading_marker("plain"), None);
    }

    #[test]
    fn test_ordered_list_marker_keeps_number() {
        assert_eq!(
            NodeType::OrderedList.leading_marker("12. step"),
            Some("12. ".to_string())
        );
        assert_eq!(NodeType::OrderedList.leading_marker("12) step"), None);
    }

    #[test]
    fn test_stripped_marker_types_never_revert_when_inherited() {
        assert!(!NodeType::Task.revertible_when_inherited());
        assert!(!NodeType::CodeBlock.revertible_when_inherited());
        assert!(NodeType::Header.revertible_when_inherited());
        assert!(NodeType::QuoteBlock.revertible_when_inherited());
    }
}
