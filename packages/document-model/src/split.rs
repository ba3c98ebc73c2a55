//! Content Splitter
//!
//! Given a node's content and a cursor offset, computes the two content
//! fragments produced by pressing Enter, plus the cursor position in the new
//! node. Pure and synchronous; the document store applies the resulting
//! structural mutation.
//!
//! Two strategies exist, selected by node type:
//!
//! - **Prefix inheritance** (header, quote, ordered list): the type's leading
//!   marker is carried onto the new node, so pressing Enter inside a heading
//!   produces another heading rather than splitting mid-marker
//! - **Simple split** (everything else): content divides at the cursor; inline
//!   emphasis delimiters that would be left unbalanced are closed at the end
//!   of `before` and reopened at the start of `after`
//!
//! Cursor offsets are character offsets and are clamped to the content length,
//! so offset 0 and offset >= len are both valid inputs.

use crate::models::{NodeType, SplitStrategy};

/// Result of splitting a node's content at a cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    /// Content remaining on the original node
    pub before: String,
    /// Content of the new node
    pub after: String,
    /// Cursor position within the new node, in characters
    pub cursor_offset: usize,
}

/// Inline delimiters the simple strategy balances across the boundary.
/// Two-character delimiters come first so `**` is never read as `*` twice.
const INLINE_DELIMITERS: [&str; 5] = ["**", "__", "`", "*", "_"];

/// Split `content` at `cursor_offset` (characters) for a node of `node_type`.
///
/// # Examples
///
/// ```rust
/// use nodespace_document_model::models::NodeType;
/// use nodespace_document_model::split::split_content;
///
/// // Enter inside the heading marker: new empty heading below
/// let result = split_content("# Title", 2, NodeType::Header);
/// assert_eq!(result.before, "# Title");
/// assert_eq!(result.after, "# ");
/// assert_eq!(result.cursor_offset, 2);
///
/// // Plain split
/// let result = split_content("hello world", 5, NodeType::Text);
/// assert_eq!(result.before, "hello");
/// assert_eq!(result.after, " world");
/// ```
pub fn split_content(content: &str, cursor_offset: usize, node_type: NodeType) -> SplitResult {
    let cursor = cursor_offset.min(content.chars().count());
    match node_type.split_strategy() {
        SplitStrategy::PrefixInheritance => match node_type.leading_marker(content) {
            Some(marker) => prefix_split(content, cursor, &marker),
            // Marker missing from content (e.g. mid-conversion): fall back
            None => simple_split(content, cursor),
        },
        SplitStrategy::Simple => simple_split(content, cursor),
    }
}

fn prefix_split(content: &str, cursor: usize, marker: &str) -> SplitResult {
    let marker_chars = marker.chars().count();
    if cursor <= marker_chars {
        // Cursor at or within the marker: keep the original node whole and
        // open an empty node of the same type below it
        return SplitResult {
            before: content.to_string(),
            after: marker.to_string(),
            cursor_offset: marker_chars,
        };
    }
    let split_at = byte_offset(content, cursor);
    SplitResult {
        before: content[..split_at].to_string(),
        after: format!("{marker}{}", &content[split_at..]),
        cursor_offset: marker_chars,
    }
}

fn simple_split(content: &str, cursor: usize) -> SplitResult {
    let split_at = byte_offset(content, cursor);
    let before_raw = &content[..split_at];
    let after_raw = &content[split_at..];

    let mut open = open_delimiters(before_raw);
    // Only balance pairs that actually cross the boundary; a stray delimiter
    // that never closes stays as the user typed it
    open.retain(|d| after_raw.contains(d));

    if open.is_empty() {
        return SplitResult {
            before: before_raw.to_string(),
            after: after_raw.to_string(),
            cursor_offset: 0,
        };
    }

    let mut before = before_raw.to_string();
    for delimiter in open.iter().rev() {
        before.push_str(delimiter);
    }
    let reopen = open.concat();
    let cursor_offset = reopen.chars().count();
    SplitResult {
        before,
        after: format!("{reopen}{after_raw}"),
        cursor_offset,
    }
}

/// Byte index of the given character offset (content length if past the end).
fn byte_offset(content: &str, char_offset: usize) -> usize {
    content
        .char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(content.len())
}

/// Scan text and return the inline delimiters left open at its end, in
/// opening order. Content inside a code span is literal until the span closes.
fn open_delimiters(text: &str) -> Vec<&'static str> {
    let mut open: Vec<&'static str> = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if open.last() == Some(&"`") {
            if bytes[i] == b'`' {
                open.pop();
            }
            i += 1;
            continue;
        }
        let rest = &bytes[i..];
        match INLINE_DELIMITERS
            .iter()
            .find(|d| rest.starts_with(d.as_bytes()))
        {
            Some(&delimiter) => {
                if let Some(position) = open.iter().rposition(|o| *o == delimiter) {
                    open.remove(position);
                } else {
                    open.push(delimiter);
                }
                i += delimiter.len();
            }
            None => i += 1,
        }
    }
    open
}
