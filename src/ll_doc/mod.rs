mod display;
mod extension;
mod retokenize;
mod section;
mod span;
mod token;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

pub use display::LLDocDisplay;
pub use extension::{ExtKind, ExtValue, ExtensionDecl, ExtensionSchema, ExtensionSchemaBuilder};
pub use retokenize::{IndexRemap, MergeSpec};
pub use section::Section;
pub use span::{Entity, LabeledSpan, SpanRef};
pub use token::{LLToken, TokenFlags};

use crate::{Component, DocError};

/// Token text as produced by a tokenizer, before the document attaches flags
/// and extension defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub text: String,
    pub whitespace_after: bool,
    pub is_sent_start: bool,
}

impl RawToken {
    pub fn new(text: impl Into<String>, whitespace_after: bool, is_sent_start: bool) -> Self {
        Self {
            text: text.into(),
            whitespace_after,
            is_sent_start,
        }
    }
}

/// A tokenized document and every annotation attached to it.
#[derive(Debug, Clone)]
pub struct LLDoc {
    pub(crate) tokens: Vec<LLToken>,
    pub(crate) schema: Arc<ExtensionSchema>,
    pub(crate) entities: Vec<Entity>,
    pub(crate) span_groups: BTreeMap<String, Vec<LabeledSpan>>,
    pub(crate) span_attrs: BTreeMap<SpanRef, BTreeMap<String, ExtValue>>,
    pub(crate) sections: Vec<Section>,
}

impl LLDoc {
    pub fn new(schema: Arc<ExtensionSchema>, raw: Vec<RawToken>) -> Self {
        let defaults = schema.defaults();
        let mut tokens: Vec<LLToken> = raw
            .into_iter()
            .map(|raw| LLToken::new(raw.text, raw.whitespace_after, raw.is_sent_start, defaults.clone()))
            .collect();
        if let Some(first) = tokens.first_mut() {
            first.is_sent_start = true;
        }

        LLDoc {
            tokens,
            schema,
            entities: Vec::new(),
            span_groups: BTreeMap::new(),
            span_attrs: BTreeMap::new(),
            sections: Vec::new(),
        }
    }

    /// Single-sentence document of space separated words.
    pub fn from_words(schema: Arc<ExtensionSchema>, words: &[&str]) -> Self {
        let last = words.len().saturating_sub(1);
        let raw = words
            .iter()
            .enumerate()
            .map(|(idx, word)| RawToken::new(*word, idx != last, idx == 0))
            .collect();
        Self::new(schema, raw)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[LLToken] {
        &self.tokens
    }

    pub fn token(&self, idx: usize) -> Option<&LLToken> {
        self.tokens.get(idx)
    }

    pub fn schema(&self) -> &Arc<ExtensionSchema> {
        &self.schema
    }

    /// Span covering the whole document.
    pub fn full_span(&self) -> SpanRef {
        SpanRef::new(0, self.tokens.len())
    }

    pub fn text(&self) -> String {
        self.text_of(self.full_span())
    }

    /// Surface text of the span; the trailing whitespace of its last token is dropped.
    pub fn text_of(&self, span: SpanRef) -> String {
        let end = span.end.min(self.tokens.len());
        let start = span.start.min(end);
        let mut out = String::new();
        for (offset, token) in self.tokens[start..end].iter().enumerate() {
            out.push_str(&token.text);
            if token.whitespace_after && start + offset + 1 < end {
                out.push(' ');
            }
        }
        out
    }

    /// Sentence number of every token, counted from the sentence-start flags.
    pub fn sentence_ids(&self) -> Vec<usize> {
        let mut current = 0;
        self.tokens
            .iter()
            .enumerate()
            .map(|(idx, token)| {
                if idx > 0 && token.is_sent_start {
                    current += 1;
                }
                current
            })
            .collect()
    }

    /// Token spans of every sentence in order.
    pub fn sentences(&self) -> Vec<SpanRef> {
        let mut spans = Vec::new();
        let mut start = 0;
        for (idx, token) in self.tokens.iter().enumerate().skip(1) {
            if token.is_sent_start {
                spans.push(SpanRef::new(start, idx));
                start = idx;
            }
        }
        if start < self.tokens.len() {
            spans.push(SpanRef::new(start, self.tokens.len()));
        }
        spans
    }

    pub fn check_span(&self, span: SpanRef) -> Result<(), DocError> {
        if span.start > span.end || span.end > self.tokens.len() {
            return Err(DocError::SpanOutOfBounds {
                span,
                len: self.tokens.len(),
            });
        }
        Ok(())
    }

    fn check_token(&self, idx: usize) -> Result<(), DocError> {
        self.check_span(SpanRef::new(idx, idx + 1))
    }

    pub fn ext(&self, idx: usize, name: &str) -> Result<&ExtValue, DocError> {
        let slot = self.schema.lookup(name)?;
        self.check_token(idx)?;
        Ok(&self.tokens[idx].ext[slot])
    }

    pub fn set_ext(&mut self, idx: usize, name: &str, value: ExtValue) -> Result<(), DocError> {
        let slot = self.schema.validate(name, &value)?;
        self.check_token(idx)?;
        self.tokens[idx].ext[slot] = value;
        Ok(())
    }

    /// Write the same value to every token of the span.
    pub fn set_ext_span(&mut self, span: SpanRef, name: &str, value: ExtValue) -> Result<(), DocError> {
        let slot = self.schema.validate(name, &value)?;
        self.check_span(span)?;
        for token in &mut self.tokens[span.start..span.end] {
            token.ext[slot] = value.clone();
        }
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Add an entity unless one with the same label and span exists.
    ///
    /// A value carried by the new entity fills a missing value on the
    /// existing one; entities are never removed. Returns whether the entity
    /// list grew.
    pub fn add_entity(&mut self, entity: Entity) -> Result<bool, DocError> {
        self.check_span(entity.span)?;
        if let Some(existing) = self
            .entities
            .iter_mut()
            .find(|e| e.label == entity.label && e.span == entity.span)
        {
            if existing.value.is_none() {
                existing.value = entity.value;
            }
            return Ok(false);
        }
        self.entities.push(entity);
        Ok(true)
    }

    pub fn span_group(&self, name: &str) -> &[LabeledSpan] {
        self.span_groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn span_groups(&self) -> &BTreeMap<String, Vec<LabeledSpan>> {
        &self.span_groups
    }

    pub fn push_span(&mut self, group: &str, span: LabeledSpan) -> Result<(), DocError> {
        self.check_span(span.span)?;
        self.span_groups
            .entry(group.to_string())
            .or_default()
            .push(span);
        Ok(())
    }

    pub fn span_attrs(&self, span: SpanRef) -> Option<&BTreeMap<String, ExtValue>> {
        self.span_attrs.get(&span)
    }

    pub fn span_attr(&self, span: SpanRef, name: &str) -> Option<&ExtValue> {
        self.span_attrs.get(&span).and_then(|attrs| attrs.get(name))
    }

    pub fn set_span_attr(&mut self, span: SpanRef, name: &str, value: ExtValue) -> Result<(), DocError> {
        self.check_span(span)?;
        self.span_attrs
            .entry(span)
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn set_sections(&mut self, sections: Vec<Section>) -> Result<(), DocError> {
        for section in &sections {
            self.check_span(section.span())?;
        }
        self.sections = sections;
        Ok(())
    }

    /// Apply a component and hand the document back, for chaining.
    pub fn run<C: Component + ?Sized>(mut self, component: &C) -> Result<Self, DocError> {
        component.apply(&mut self)?;
        Ok(self)
    }

    pub fn summary(&self) -> DocSummary {
        DocSummary {
            text: self.text(),
            entities: self
                .entities
                .iter()
                .map(|entity| EntitySummary {
                    label: entity.label.clone(),
                    span: entity.span,
                    text: self.text_of(entity.span),
                    value: entity.value.clone(),
                })
                .collect(),
            span_groups: self.span_groups.clone(),
            span_attrs: self
                .span_attrs
                .iter()
                .map(|(span, attrs)| SpanAttrSummary {
                    span: *span,
                    attrs: attrs.clone(),
                })
                .collect(),
            sections: self.sections.clone(),
        }
    }
}

/// Serializable view of a processed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocSummary {
    pub text: String,
    pub entities: Vec<EntitySummary>,
    pub span_groups: BTreeMap<String, Vec<LabeledSpan>>,
    pub span_attrs: Vec<SpanAttrSummary>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub label: String,
    pub span: SpanRef,
    pub text: String,
    pub value: Option<ExtValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanAttrSummary {
    pub span: SpanRef,
    pub attrs: BTreeMap<String, ExtValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<ExtensionSchema> {
        let mut builder = ExtensionSchema::builder();
        builder
            .declare(ExtensionDecl::flag("ecog_status"))
            .unwrap()
            .declare(ExtensionDecl::value("ecog_status_value", ExtValue::Int(-1)))
            .unwrap();
        Arc::new(builder.build())
    }

    #[test]
    fn extension_defaults_and_writes() {
        let mut doc = LLDoc::from_words(schema(), &["ECOG", "2"]);
        assert_eq!(doc.ext(1, "ecog_status_value").unwrap(), &ExtValue::Int(-1));

        doc.set_ext(1, "ecog_status", ExtValue::Bool(true)).unwrap();
        assert_eq!(doc.ext(1, "ecog_status").unwrap(), &ExtValue::Bool(true));

        assert_eq!(
            doc.set_ext(0, "weight", ExtValue::Bool(true)),
            Err(DocError::UnknownExtension {
                name: "weight".to_string()
            })
        );
        assert!(matches!(
            doc.set_ext(0, "ecog_status", ExtValue::Int(1)),
            Err(DocError::KindMismatch { .. })
        ));
        assert!(matches!(
            doc.set_ext(5, "ecog_status", ExtValue::Bool(true)),
            Err(DocError::SpanOutOfBounds { .. })
        ));
    }

    #[test]
    fn entities_are_an_idempotent_union() {
        let mut doc = LLDoc::from_words(schema(), &["ECOG", "2"]);
        let span = SpanRef::new(0, 2);

        assert!(doc.add_entity(Entity::new("ECOG_STATUS", span)).unwrap());
        assert!(!doc
            .add_entity(Entity::new("ECOG_STATUS", span).with_value(ExtValue::Int(2)))
            .unwrap());
        assert!(doc.add_entity(Entity::new("OTHER", span)).unwrap());

        assert_eq!(doc.entities().len(), 2);
        assert_eq!(doc.entities()[0].value, Some(ExtValue::Int(2)));
    }

    #[test]
    fn sentences_follow_start_flags() {
        let raw = vec![
            RawToken::new("No", true, true),
            RawToken::new("pain", false, false),
            RawToken::new(".", true, false),
            RawToken::new("Stable", false, true),
            RawToken::new(".", false, false),
        ];
        let doc = LLDoc::new(Arc::new(ExtensionSchema::empty()), raw);

        assert_eq!(doc.sentence_ids(), vec![0, 0, 0, 1, 1]);
        assert_eq!(doc.sentences(), vec![SpanRef::new(0, 3), SpanRef::new(3, 5)]);
        assert_eq!(doc.text(), "No pain. Stable.");
        assert_eq!(doc.text_of(SpanRef::new(0, 2)), "No pain");
    }
}
