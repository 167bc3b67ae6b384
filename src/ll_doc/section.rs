use chrono::NaiveDate;
use serde::Serialize;

use crate::SpanRef;

/// A resolved document section.
///
/// `parent` indexes into the same resolved list the section lives in, so a
/// section list is an arena linked by indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// `None` for the implicit preamble before the first header.
    pub category: Option<String>,
    /// The header tokens.
    pub title: SpanRef,
    /// Exclusive end of the section body: the next section's start or the document end.
    pub body_end: usize,
    pub parent: Option<usize>,
    pub top_level: bool,
    /// Resolved date: parsed from the title or inherited from the parent.
    pub date: Option<NaiveDate>,
}

impl Section {
    pub fn new(category: Option<String>, title: SpanRef, body_end: usize) -> Self {
        Self {
            category,
            title,
            body_end,
            parent: None,
            top_level: false,
            date: None,
        }
    }

    pub fn start(&self) -> usize {
        self.title.start
    }

    pub fn end(&self) -> usize {
        self.body_end
    }

    /// Title and body together.
    pub fn span(&self) -> SpanRef {
        SpanRef::new(self.title.start, self.body_end)
    }

    pub fn body(&self) -> SpanRef {
        SpanRef::new(self.title.end, self.body_end)
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}
