use std::fmt::Write;

use unicode_width::UnicodeWidthStr;

use super::*;

/// Internal representation of an included annotation for display.
struct IncludedSpan {
    span: SpanRef,
    label: String,
}

/// Renders a document's tokens with underlined annotations, for snapshot tests.
///
/// ```text
/// ECOG  performance  status  2
/// ╰──────────────────────────╯ECOG_STATUS=2
/// ```
pub struct LLDocDisplay<'a> {
    ll_doc: &'a LLDoc,
    include_spans: Vec<IncludedSpan>,
}

impl<'a> std::fmt::Display for LLDocDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const SPACE_PADDING: usize = 2;
        let mut token_idx_to_start_display_char_idx = Vec::new();
        let mut token_idx_to_end_display_char_idx = Vec::new();
        let mut opening_line = String::new();
        for (idx, ll_token) in self.ll_doc.tokens.iter().enumerate() {
            if idx > 0 {
                opening_line.extend(std::iter::repeat(' ').take(SPACE_PADDING));
            }
            token_idx_to_start_display_char_idx.push(UnicodeWidthStr::width(&*opening_line));
            if ll_token.flags.is_space {
                opening_line.push('_');
            } else {
                opening_line.push_str(&ll_token.text);
            }
            token_idx_to_end_display_char_idx.push(UnicodeWidthStr::width(&*opening_line));
        }

        f.write_str(&opening_line)?;

        for included in self.include_spans.iter() {
            if included.span.is_empty() {
                continue;
            }
            f.write_char('\n')?;

            let start_char_idx = token_idx_to_start_display_char_idx[included.span.start];
            for _ in 0..start_char_idx {
                f.write_char(' ')?;
            }

            f.write_char('╰')?;

            let end_char_idx = token_idx_to_end_display_char_idx[included.span.end - 1];
            let char_len = end_char_idx - start_char_idx;
            for _ in (start_char_idx + 1)..end_char_idx.saturating_sub(1) {
                f.write_char('─')?;
            }

            if char_len > 1 {
                f.write_char('╯')?;
            }

            f.write_str(&included.label)?;
        }

        Ok(())
    }
}

impl<'a> LLDocDisplay<'a> {
    pub fn new(ll_doc: &'a LLDoc) -> Self {
        LLDocDisplay {
            ll_doc,
            include_spans: Vec::new(),
        }
    }

    /// Entities, rendered as `LABEL` or `LABEL=value`.
    pub fn include_entities(&mut self) {
        for entity in &self.ll_doc.entities {
            let label = match &entity.value {
                Some(value) => format!("{}={}", entity.label, value),
                None => entity.label.clone(),
            };
            self.include_spans.push(IncludedSpan {
                span: entity.span,
                label,
            });
        }
    }

    /// Members of a named span group, rendered as `group:LABEL=value`.
    pub fn include_span_group(&mut self, name: &str) {
        for labeled in self.ll_doc.span_group(name) {
            let mut label = name.to_string();
            if let Some(l) = &labeled.label {
                write!(&mut label, ":{}", l).ok();
            }
            if let Some(value) = &labeled.value {
                write!(&mut label, "={}", value).ok();
            }
            self.include_spans.push(IncludedSpan {
                span: labeled.span,
                label,
            });
        }
    }

    /// Span attributes whose value is not `false` or null, e.g. `is_negated`.
    pub fn include_span_attrs(&mut self) {
        for (span, attrs) in &self.ll_doc.span_attrs {
            let set: Vec<String> = attrs
                .iter()
                .filter(|(_, value)| !matches!(value, ExtValue::Bool(false) | ExtValue::Null))
                .map(|(name, value)| match value {
                    ExtValue::Bool(true) => name.clone(),
                    other => format!("{}={}", name, other),
                })
                .collect();
            if !set.is_empty() {
                self.include_spans.push(IncludedSpan {
                    span: *span,
                    label: set.join(", "),
                });
            }
        }
    }

    /// Section titles, rendered as `§CATEGORY`.
    pub fn include_sections(&mut self) {
        for section in &self.ll_doc.sections {
            self.include_spans.push(IncludedSpan {
                span: section.title,
                label: format!("§{}", section.category().unwrap_or("-")),
            });
        }
    }

    pub fn with_entities(mut self) -> Self {
        self.include_entities();
        self
    }

    pub fn with_span_group(mut self, name: &str) -> Self {
        self.include_span_group(name);
        self
    }

    pub fn with_span_attrs(mut self) -> Self {
        self.include_span_attrs();
        self
    }

    pub fn with_sections(mut self) -> Self {
        self.include_sections();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underlines_entities() {
        let mut doc = LLDoc::from_words(Arc::new(ExtensionSchema::empty()), &["ECOG", "2", "."]);
        doc.add_entity(Entity::new("ECOG_STATUS", SpanRef::new(0, 2)).with_value(ExtValue::Int(2)))
            .unwrap();
        doc.add_entity(Entity::new("P", SpanRef::new(2, 3))).unwrap();

        insta::assert_snapshot!(LLDocDisplay::new(&doc).with_entities(), @r###"
        ECOG  2  .
        ╰─────╯ECOG_STATUS=2
                 ╰P
        "###);
    }
}
