//! Collapsing token ranges into single tokens.
//!
//! A merge rewrites token indices, so every span the document holds is
//! carried through an [`IndexRemap`]. Callers holding their own spans must
//! remap them with the returned value.

use std::collections::BTreeMap;

use super::{LLDoc, LLToken};
use crate::{DocError, ExtValue, SpanRef};

/// One range to collapse, with the values stamped onto the merged token.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSpec {
    pub span: SpanRef,
    /// Canonical form of the merged token; the lowercase merged text when `None`.
    pub norm: Option<String>,
    pub ext: Vec<(String, ExtValue)>,
}

impl MergeSpec {
    pub fn new(span: SpanRef) -> Self {
        Self {
            span,
            norm: None,
            ext: Vec::new(),
        }
    }

    pub fn with_norm(mut self, norm: impl Into<String>) -> Self {
        self.norm = Some(norm.into());
        self
    }

    pub fn with_ext(mut self, name: impl Into<String>, value: ExtValue) -> Self {
        self.ext.push((name.into(), value));
        self
    }
}

/// Mapping from token indices before a merge to indices after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRemap {
    map: Vec<usize>,
    new_len: usize,
}

impl IndexRemap {
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..len).collect(),
            new_len: len,
        }
    }

    pub fn old_len(&self) -> usize {
        self.map.len()
    }

    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// New index of the token that was at `old`.
    ///
    /// `old == old_len` is the end boundary and maps to `new_len`.
    pub fn token(&self, old: usize) -> usize {
        self.map.get(old).copied().unwrap_or(self.new_len)
    }

    /// Carry a span through the merge. A span touching a merged range grows
    /// to cover the whole merged token.
    pub fn span(&self, span: SpanRef) -> SpanRef {
        if span.is_empty() {
            let at = self.token(span.start);
            return SpanRef::new(at, at);
        }
        SpanRef::new(self.token(span.start), self.token(span.end - 1) + 1)
    }

    fn boundary(&self, old_end: usize) -> usize {
        if old_end == 0 {
            0
        } else {
            self.token(old_end - 1) + 1
        }
    }
}

impl LLDoc {
    /// Collapse every span into a single token.
    ///
    /// All specs are validated before anything changes: bounds, overlap
    /// between specs and the extension values to stamp.
    pub fn merge_spans(&mut self, mut specs: Vec<MergeSpec>) -> Result<IndexRemap, DocError> {
        specs.retain(|spec| !spec.span.is_empty());
        specs.sort_by_key(|spec| (spec.span.start, spec.span.end));

        let mut stamped = Vec::with_capacity(specs.len());
        for spec in &specs {
            self.check_span(spec.span)?;
            let mut slots = Vec::with_capacity(spec.ext.len());
            for (name, value) in &spec.ext {
                slots.push((self.schema.validate(name, value)?, value.clone()));
            }
            stamped.push(slots);
        }
        for pair in specs.windows(2) {
            if pair[0].span.overlaps(&pair[1].span) {
                return Err(DocError::OverlappingMerge {
                    first: pair[0].span,
                    second: pair[1].span,
                });
            }
        }

        if specs.is_empty() {
            return Ok(IndexRemap::identity(self.tokens.len()));
        }

        let old_tokens = std::mem::take(&mut self.tokens);
        let mut map = Vec::with_capacity(old_tokens.len());
        let mut tokens = Vec::with_capacity(old_tokens.len());
        let mut pending = specs.iter().zip(stamped).peekable();
        let mut idx = 0;

        while idx < old_tokens.len() {
            if let Some((spec, slots)) = pending.next_if(|(spec, _)| spec.span.start == idx) {
                let parts = &old_tokens[spec.span.start..spec.span.end];
                let new_idx = tokens.len();
                tokens.push(merged_token(parts, spec.norm.as_deref(), slots));
                map.extend(std::iter::repeat(new_idx).take(parts.len()));
                idx = spec.span.end;
            } else {
                map.push(tokens.len());
                tokens.push(old_tokens[idx].clone());
                idx += 1;
            }
        }

        self.tokens = tokens;
        let remap = IndexRemap {
            map,
            new_len: self.tokens.len(),
        };
        self.apply_remap(&remap);

        tracing::debug!(
            merged = specs.len(),
            old_len = remap.old_len(),
            new_len = remap.new_len(),
            "merged token spans"
        );
        Ok(remap)
    }

    fn apply_remap(&mut self, remap: &IndexRemap) {
        let mut entities = Vec::with_capacity(self.entities.len());
        for mut entity in std::mem::take(&mut self.entities) {
            entity.span = remap.span(entity.span);
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        }
        self.entities = entities;

        for spans in self.span_groups.values_mut() {
            for labeled in spans.iter_mut() {
                labeled.span = remap.span(labeled.span);
            }
        }

        let mut span_attrs: BTreeMap<SpanRef, BTreeMap<String, ExtValue>> = BTreeMap::new();
        for (span, attrs) in std::mem::take(&mut self.span_attrs) {
            span_attrs.entry(remap.span(span)).or_default().extend(attrs);
        }
        self.span_attrs = span_attrs;

        for section in &mut self.sections {
            section.title = remap.span(section.title);
            section.body_end = remap.boundary(section.body_end);
        }
    }
}

fn merged_token(parts: &[LLToken], norm: Option<&str>, slots: Vec<(usize, ExtValue)>) -> LLToken {
    let first = &parts[0];
    let last = &parts[parts.len() - 1];

    let mut text = String::new();
    for (pos, part) in parts.iter().enumerate() {
        text.push_str(&part.text);
        if part.whitespace_after && pos + 1 < parts.len() {
            text.push(' ');
        }
    }

    let mut token = first.clone();
    token.norm = norm.map(str::to_string).unwrap_or_else(|| text.to_lowercase());
    token.text = text;
    token.whitespace_after = last.whitespace_after;
    for (slot, value) in slots {
        token.ext[slot] = value;
    }
    token
}
