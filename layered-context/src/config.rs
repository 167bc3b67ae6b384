//! Category to attribute mapping.

use std::collections::{BTreeMap, BTreeSet};

use layered_clinical::ExtValue;
use serde::Deserialize;

/// Attributes set on a target for each modifier category.
pub type SpanAttrMap = BTreeMap<String, BTreeMap<String, ExtValue>>;

/// Penalty added to the distance of a modifier in another sentence.
pub const DEFAULT_SENTENCE_PENALTY: usize = 50;

/// Resolver configuration, owned by the component that uses it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextConfig {
    /// Category (e.g. `NEGATED_EXISTENCE`) to the attributes it sets.
    #[serde(default = "default_span_attrs")]
    pub span_attrs: SpanAttrMap,
    #[serde(default = "default_sentence_penalty")]
    pub sentence_penalty: usize,
}

fn default_sentence_penalty() -> usize {
    DEFAULT_SENTENCE_PENALTY
}

fn default_span_attrs() -> SpanAttrMap {
    [
        ("NEGATED_EXISTENCE", "is_negated"),
        ("POSSIBLE_EXISTENCE", "is_uncertain"),
        ("HISTORICAL", "is_historical"),
        ("HYPOTHETICAL", "is_hypothetical"),
        ("FAMILY", "is_family"),
        ("CURRENT", "is_current"),
        ("DATEOF", "date_of"),
    ]
    .into_iter()
    .map(|(category, attr)| {
        let attrs = BTreeMap::from([(attr.to_string(), ExtValue::Bool(true))]);
        (category.to_string(), attrs)
    })
    .collect()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            span_attrs: default_span_attrs(),
            sentence_penalty: DEFAULT_SENTENCE_PENALTY,
        }
    }
}

impl ContextConfig {
    pub fn with_sentence_penalty(mut self, penalty: usize) -> Self {
        self.sentence_penalty = penalty;
        self
    }

    /// Add or replace the attributes of a category.
    pub fn with_category<'a>(
        mut self,
        category: &str,
        attrs: impl IntoIterator<Item = (&'a str, ExtValue)>,
    ) -> Self {
        self.span_attrs.insert(
            category.to_string(),
            attrs.into_iter().map(|(name, value)| (name.to_string(), value)).collect(),
        );
        self
    }

    /// Every attribute name any category can set.
    pub fn attribute_names(&self) -> BTreeSet<&str> {
        self.span_attrs
            .values()
            .flat_map(|attrs| attrs.keys().map(String::as_str))
            .collect()
    }

    pub fn attrs_for(&self, category: &str) -> Option<&BTreeMap<String, ExtValue>> {
        self.span_attrs.get(category)
    }
}
