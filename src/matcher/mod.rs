//! Token-sequence matching.
//!
//! Every component consumes matches through the [`Matcher`] trait; the
//! bundled [`PatternMatcher`] compiles declarative JSON token patterns.

mod pattern;

use serde::Serialize;

pub use pattern::{CompareOp, PatternMatcher, Predicate, Quantifier, TokenAttr, TokenPattern, TokenSpec, ValueTest};

use crate::{LLDoc, SpanRef};

/// A raw match; several may overlap or repeat a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Match {
    /// Index of the label the matching pattern was registered under.
    pub pattern_id: usize,
    pub start: usize,
    pub end: usize,
}

impl Match {
    pub fn new(pattern_id: usize, start: usize, end: usize) -> Self {
        Self {
            pattern_id,
            start,
            end,
        }
    }

    pub fn span(&self) -> SpanRef {
        SpanRef::new(self.start, self.end)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Given a document and a token range, return every match inside the range.
///
/// Match indices are absolute document positions.
pub trait Matcher: Send + Sync {
    fn find(&self, doc: &LLDoc, within: SpanRef) -> Vec<Match>;

    fn find_all(&self, doc: &LLDoc) -> Vec<Match> {
        self.find(doc, doc.full_span())
    }
}
