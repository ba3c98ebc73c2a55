//! Pattern State Machine
//!
//! Every node carries a `PatternState` recording how it acquired its current
//! type and whether it may automatically revert to plain text. Three creation
//! sources exist:
//!
//! - `User` - the node is plain text and live pattern detection is active
//! - `Pattern` - the type was set by a detected pattern; the match is kept so
//!   the dedicated revert expression can be checked on every edit
//! - `Inherited` - the type was copied from the previous node on a split;
//!   revert-eligibility follows the type's own policy
//!
//! Once a node is pattern- or inherited-typed, ongoing detection is suspended
//! (the state only watches for reversion). This prevents a node from being
//! redetected into a different type mid-edit.
//!
//! The state is derived from content plus type and lives only as long as the
//! node itself; it is never persisted.

use crate::models::NodeType;
use crate::patterns::PatternMatch;

/// How a node acquired its current type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationSource {
    /// Typed by the user; pattern detection active
    User,
    /// Set by a detected pattern
    Pattern,
    /// Copied from the previous node on split/Enter
    Inherited,
}

/// Per-node pattern lifecycle state.
#[derive(Debug, Clone)]
pub struct PatternState {
    source: CreationSource,
    matched: Option<PatternMatch>,
    can_revert: bool,
}

impl Default for PatternState {
    fn default() -> Self {
        Self::user()
    }
}

impl PartialEq for PatternState {
    fn eq(&self, other: &Self) -> bool {
        // Matches compare by descriptor name; the descriptor itself holds
        // compiled regexes with no meaningful equality
        let matched_name = |s: &Self| s.matched.as_ref().map(|m| m.descriptor.name.clone());
        self.source == other.source
            && self.can_revert == other.can_revert
            && matched_name(self) == matched_name(other)
    }
}

impl PatternState {
    /// Plain user-typed state; detection active, nothing to revert.
    pub fn user() -> Self {
        Self {
            source: CreationSource::User,
            matched: None,
            can_revert: false,
        }
    }

    /// State for a node whose type was set by an explicit pattern conversion.
    ///
    /// Revert-eligible only when a match with a revert expression is supplied;
    /// a conversion without one (e.g. a task whose marker was stripped) cannot
    /// be undone character-by-character.
    pub fn from_pattern(matched: Option<PatternMatch>) -> Self {
        let can_revert = matched.as_ref().is_some_and(|m| m.supports_revert());
        Self {
            source: CreationSource::Pattern,
            matched,
            can_revert,
        }
    }

    /// State for a node whose type was inherited from a split.
    ///
    /// Revert-eligibility requires both the type's own policy to allow it and
    /// a match with a revert expression to watch.
    pub fn inherited(target: NodeType, matched: Option<PatternMatch>) -> Self {
        let can_revert = target.revertible_when_inherited()
            && matched.as_ref().is_some_and(|m| m.supports_revert());
        Self {
            source: CreationSource::Inherited,
            matched,
            can_revert,
        }
    }

    /// Factory for newly created nodes.
    ///
    /// Decision table:
    /// - plain-text target always yields `User`
    /// - an explicit type conversion yields `Pattern`
    /// - a split-inherited type yields `Inherited`
    pub fn for_created_node(
        is_pattern_conversion: bool,
        is_inherited_from_split: bool,
        target: NodeType,
        matched: Option<PatternMatch>,
    ) -> Self {
        if target.is_plain_text() {
            Self::user()
        } else if is_inherited_from_split {
            Self::inherited(target, matched)
        } else if is_pattern_conversion {
            Self::from_pattern(matched)
        } else {
            Self::user()
        }
    }

    /// How the node acquired its current type.
    pub fn source(&self) -> CreationSource {
        self.source
    }

    /// Whether the node may automatically revert to plain text.
    pub fn can_revert(&self) -> bool {
        self.can_revert
    }

    /// The match that set the node's type, if any.
    pub fn matched(&self) -> Option<&PatternMatch> {
        self.matched.as_ref()
    }

    /// Live pattern detection runs only while the node is user-sourced.
    pub fn should_detect_patterns(&self) -> bool {
        self.source == CreationSource::User
    }

    /// Record a successful detection on a user-sourced node (`User -> Pattern`).
    pub fn record_match(&mut self, matched: PatternMatch) {
        self.can_revert = matched.supports_revert();
        self.matched = Some(matched);
        self.source = CreationSource::Pattern;
    }

    /// Check the attached revert expression against current content and, when
    /// it fires, transition back to `User` (`Pattern/Inherited -> User`).
    ///
    /// Returns whether a reversion happened. Idempotent: a second call with
    /// unchanged content leaves the state exactly as the first call did.
    pub fn attempt_revert(&mut self, content: &str) -> bool {
        if !self.can_revert {
            return false;
        }
        let reverts = self
            .matched
            .as_ref()
            .is_some_and(|m| m.revert_matches(content));
        if reverts {
            *self = Self::user();
        }
        reverts
    }
}
