//! Span types: token ranges and the annotations hung on them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ExtValue;

/// A half-open token range `[start, end)` within an [`LLDoc`](crate::LLDoc).
///
/// Indices refer to token positions (not character positions) and are only
/// stable until the next merge; see [`IndexRemap`](crate::IndexRemap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanRef {
    /// Inclusive start token index
    pub start: usize,
    /// Exclusive end token index
    pub end: usize,
}

impl SpanRef {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {} after end {}", start, end);
        Self { start, end }
    }

    /// Number of tokens covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains_token(&self, idx: usize) -> bool {
        self.start <= idx && idx < self.end
    }

    /// True when the two ranges share at least one token.
    pub fn overlaps(&self, other: &SpanRef) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely inside `self` (equal ranges included).
    pub fn contains(&self, other: &SpanRef) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Symmetric full containment: either range contains the other.
    ///
    /// Partial overlap is not enough.
    pub fn is_within_either(&self, other: &SpanRef) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for SpanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A labeled span promoted to the document's entity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub label: String,
    pub span: SpanRef,
    /// Extracted value, when the registering component produced one.
    pub value: Option<ExtValue>,
}

impl Entity {
    pub fn new(label: impl Into<String>, span: SpanRef) -> Self {
        Self {
            label: label.into(),
            span,
            value: None,
        }
    }

    pub fn with_value(mut self, value: ExtValue) -> Self {
        self.value = Some(value);
        self
    }
}

/// A member of a named span group, optionally labeled and carrying a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledSpan {
    pub span: SpanRef,
    pub label: Option<String>,
    pub value: Option<ExtValue>,
}

impl LabeledSpan {
    pub fn new(span: SpanRef) -> Self {
        Self {
            span,
            label: None,
            value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: ExtValue) -> Self {
        self.value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn span_ref_equality_and_hashing() {
        let span1 = SpanRef::new(0, 5);
        let span2 = SpanRef::new(0, 5);
        let span3 = SpanRef::new(1, 5);

        assert_eq!(span1, span2);
        assert_ne!(span1, span3);

        let mut set = HashSet::new();
        set.insert(span1);
        assert!(set.contains(&span2));
        assert!(!set.contains(&span3));
    }

    #[test]
    fn overlap_is_half_open() {
        let a = SpanRef::new(0, 3);
        assert!(a.overlaps(&SpanRef::new(2, 5)));
        assert!(!a.overlaps(&SpanRef::new(3, 5)));
        assert!(!a.contains_token(3));
    }

    #[test]
    fn containment_either_direction() {
        let candidate = SpanRef::new(2, 5);

        assert!(candidate.is_within_either(&SpanRef::new(3, 4)));
        assert!(candidate.is_within_either(&SpanRef::new(1, 6)));
        assert!(candidate.is_within_either(&SpanRef::new(2, 5)));
        assert!(!candidate.is_within_either(&SpanRef::new(4, 7)));
    }

    #[test]
    fn display_uses_range_syntax() {
        assert_eq!(SpanRef::new(10, 12).to_string(), "10..12");
    }
}
