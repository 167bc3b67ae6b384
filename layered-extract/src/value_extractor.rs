use std::collections::BTreeSet;

use layered_clinical::conflict::filter_matches;
use layered_clinical::{
    Component, DocError, ExtValue, ExtensionDecl, LLDoc, Matcher, MergeSpec, PatternError,
    PatternMatcher, SpanRef,
};
use serde::Deserialize;
use serde_json::Value;

use crate::label_matcher::{non_empty, optional_matcher};
use crate::{LabelMatcher, ValueCandidates, NO_VALUE};

/// Value and norm sub-patterns applied inside an accepted span.
#[derive(Debug, Clone)]
pub struct SpanValuePatterns {
    value: Option<PatternMatcher>,
    norm: Option<PatternMatcher>,
}

impl SpanValuePatterns {
    pub fn new(value: Option<PatternMatcher>, norm: Option<PatternMatcher>) -> Self {
        Self { value, norm }
    }

    pub fn has_value_patterns(&self) -> bool {
        self.value.is_some()
    }

    /// Candidate value from every value match inside `span`, in match order.
    pub fn value(&self, doc: &LLDoc, span: SpanRef) -> ExtValue {
        self.matched_value(doc, span).unwrap_or(ExtValue::Int(NO_VALUE))
    }

    /// Like [`value`](Self::value), but `None` when no value pattern matches
    /// inside `span`.
    pub fn matched_value(&self, doc: &LLDoc, span: SpanRef) -> Option<ExtValue> {
        let matches = self.value.as_ref()?.find(doc, span);
        if matches.is_empty() {
            return None;
        }
        let mut candidates = ValueCandidates::new();
        for m in &matches {
            candidates.push_text(&doc.text_of(m.span()));
        }
        Some(candidates.select())
    }

    /// Concatenated norm-match texts, or the whole span's text; lowercased.
    pub fn norm(&self, doc: &LLDoc, span: SpanRef) -> String {
        match &self.norm {
            Some(matcher) => matcher
                .find(doc, span)
                .iter()
                .map(|m| doc.text_of(m.span()))
                .collect::<String>()
                .to_lowercase(),
            None => doc.text_of(span).to_lowercase(),
        }
    }

    pub(crate) fn extension_refs(&self) -> BTreeSet<String> {
        self.value
            .iter()
            .chain(self.norm.iter())
            .flat_map(PatternMatcher::extension_refs)
            .collect()
    }
}

/// Declarative form of a [`ValueExtractor`].
#[derive(Debug, Clone, Deserialize)]
pub struct ValueExtractorConfig {
    pub token_label: String,
    pub value_label: String,
    pub token_patterns: Value,
    /// Each match inside an accepted span is one value candidate. The
    /// tokenizer splits `1,234` into three tokens, so thousands-grouped
    /// numbers need a multi-token pattern such as
    /// `[{"LIKE_NUM": true}, {"ORTH": ",", "OP": "?"}, {"LIKE_NUM": true, "OP": "?"}]`.
    pub value_patterns: Value,
    #[serde(default)]
    pub norm_patterns: Option<Value>,
    #[serde(default, alias = "exclusion_patterns")]
    pub exclusions: Option<Value>,
    #[serde(default)]
    pub entity_label: Option<String>,
}

/// A [`LabelMatcher`] that also extracts a value and a normalized form for
/// each accepted span, then merges the span into one token.
///
/// The merged token carries `token_label = true`, `value_label = value` and
/// the normalized form as its norm. Entities carry the value too.
#[derive(Debug, Clone)]
pub struct ValueExtractor {
    label: LabelMatcher,
    value_label: String,
    patterns: SpanValuePatterns,
}

impl ValueExtractor {
    pub fn new(label: LabelMatcher, value_label: impl Into<String>, patterns: SpanValuePatterns) -> Self {
        Self {
            label: label.with_merge_ents(true),
            value_label: value_label.into(),
            patterns,
        }
    }

    pub fn from_config(name: &str, config: &ValueExtractorConfig) -> Result<Self, PatternError> {
        let mut label = LabelMatcher::new(
            name,
            config.token_label.as_str(),
            PatternMatcher::from_json(&config.token_label, &config.token_patterns)?,
        );
        if let Some(entity_label) = non_empty(&config.entity_label) {
            label = label.with_entity_label(entity_label);
        }
        if let Some(exclusions) = optional_matcher("exclude", &config.exclusions)? {
            label = label.with_exclusions(exclusions);
        }
        let patterns = SpanValuePatterns::new(
            Some(PatternMatcher::from_json(&config.value_label, &config.value_patterns)?),
            optional_matcher("norm", &config.norm_patterns)?,
        );
        Ok(Self::new(label, config.value_label.as_str(), patterns))
    }

    pub fn value_label(&self) -> &str {
        &self.value_label
    }
}

impl Component for ValueExtractor {
    fn name(&self) -> &str {
        self.label.name()
    }

    fn extensions(&self) -> Vec<ExtensionDecl> {
        let mut decls = self.label.extensions();
        decls.push(ExtensionDecl::value(self.value_label.as_str(), ExtValue::Int(NO_VALUE)));
        decls
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        let mut refs = self.label.pattern_refs();
        refs.extend(self.patterns.extension_refs());
        refs
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let accepted = self.label.accepted_matches(doc);
        self.label.register_entities(doc, &accepted, |doc, m| {
            Some(self.patterns.value(doc, m.span()))
        })?;

        let specs: Vec<MergeSpec> = filter_matches(&accepted)
            .iter()
            .map(|m| {
                let span = m.span();
                let value = self.patterns.value(doc, span);
                tracing::trace!(span = %span, value = %value, "extracted value");
                MergeSpec::new(span)
                    .with_norm(self.patterns.norm(doc, span))
                    .with_ext(self.label.token_label(), ExtValue::Bool(true))
                    .with_ext(self.value_label.as_str(), value)
            })
            .collect();
        doc.merge_spans(specs)?;
        Ok(())
    }
}
