use std::collections::{BTreeMap, BTreeSet};

use layered_clinical::conflict::filter_matches;
use layered_clinical::{Component, DocError, ExtValue, LLDoc, Matcher, PatternError, PatternMatcher, Section};
use serde::Deserialize;
use serde_json::json;

use crate::hierarchy::{assign_dates, cascade_top_level, resolve_parents, to_sections, SectionHeader};
use crate::rules::RuleIndex;
use crate::{SectionRule, DATE_CATEGORY};

/// Span attribute holding the date of the section an entity sits in.
pub const SECTION_DATE: &str = "section_date";

/// Declarative form of a [`Sectionizer`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionizerConfig {
    #[serde(default)]
    pub rules: Vec<SectionRule>,
    /// Section category to the attributes set on every entity in its body,
    /// e.g. `family_history → is_family`.
    #[serde(default)]
    pub span_attrs: BTreeMap<String, BTreeMap<String, ExtValue>>,
}

/// Rules for date headers: a date and time opening a line starts a top-level
/// section, a date alone starts a dated sub-section.
///
/// Both read the `date` and `time` flags written by the normalizer.
pub fn date_section_rules() -> Vec<SectionRule> {
    vec![
        SectionRule::new(DATE_CATEGORY, "date_time_section")
            .with_pattern(json!([
                {"_": {"date": true}, "IS_SENT_START": true},
                {"_": {"time": true}}
            ]))
            .top_level(),
        SectionRule::new(DATE_CATEGORY, "dated_section")
            .with_pattern(json!([{"_": {"date": true}, "IS_SENT_START": true}])),
    ]
}

/// Splits a document into sections at matched headers and links each
/// section to its parent.
///
/// In dated mode, top-level headers also take over the sections that follow
/// them, and sections are dated from their own or their parent's title.
#[derive(Debug, Clone)]
pub struct Sectionizer {
    name: String,
    rules: Vec<SectionRule>,
    index: RuleIndex,
    /// One label per rule, in rule order.
    matcher: PatternMatcher,
    span_attrs: BTreeMap<String, BTreeMap<String, ExtValue>>,
    dated: bool,
}

impl Sectionizer {
    pub fn new(name: impl Into<String>, rules: Vec<SectionRule>) -> Result<Self, PatternError> {
        let mut matcher = PatternMatcher::new();
        for (idx, rule) in rules.iter().enumerate() {
            matcher.add_json(&format!("{}#{}", rule.category, idx), &rule.patterns()?)?;
        }
        Ok(Self {
            name: name.into(),
            index: RuleIndex::new(&rules),
            rules,
            matcher,
            span_attrs: BTreeMap::new(),
            dated: false,
        })
    }

    /// A dated sectionizer over `rules` plus [`date_section_rules`].
    pub fn dated(name: impl Into<String>, mut rules: Vec<SectionRule>) -> Result<Self, PatternError> {
        rules.extend(date_section_rules());
        let mut sectionizer = Self::new(name, rules)?;
        sectionizer.dated = true;
        Ok(sectionizer)
    }

    pub fn from_config(name: &str, config: &SectionizerConfig) -> Result<Self, PatternError> {
        Ok(Self::new(name, config.rules.clone())?.with_span_attrs(config.span_attrs.clone()))
    }

    pub fn dated_from_config(name: &str, config: &SectionizerConfig) -> Result<Self, PatternError> {
        Ok(Self::dated(name, config.rules.clone())?.with_span_attrs(config.span_attrs.clone()))
    }

    pub fn with_span_attrs(mut self, span_attrs: BTreeMap<String, BTreeMap<String, ExtValue>>) -> Self {
        self.span_attrs = span_attrs;
        self
    }

    pub fn is_dated(&self) -> bool {
        self.dated
    }

    pub fn rules(&self) -> &[SectionRule] {
        &self.rules
    }

    /// Non-overlapping header matches in document order.
    fn headers(&self, doc: &LLDoc) -> Vec<SectionHeader> {
        filter_matches(&self.matcher.find_all(doc))
            .into_iter()
            .filter_map(|m| {
                let rule = self.rules.get(m.pattern_id)?;
                Some(SectionHeader::new(rule.category.as_str(), m.span(), rule.top_level))
            })
            .collect()
    }

    /// Resolve the document's sections without storing them.
    pub fn sections(&self, doc: &LLDoc) -> Vec<Section> {
        let headers = self.headers(doc);
        let found = headers.len();
        let mut kept = resolve_parents(headers, &self.index);
        if self.dated {
            cascade_top_level(&mut kept);
        }
        let mut sections = to_sections(doc, kept);
        if self.dated {
            assign_dates(doc, &mut sections);
        }
        tracing::debug!(
            component = %self.name,
            headers = found,
            sections = sections.len(),
            dated = self.dated,
            "resolved sections"
        );
        sections
    }

    fn annotate_entities(&self, doc: &mut LLDoc, sections: &[Section]) -> Result<(), DocError> {
        let entity_spans: Vec<_> = doc.entities().iter().map(|entity| entity.span).collect();
        for section in sections {
            let attrs = section.category().and_then(|category| self.span_attrs.get(category));
            if attrs.is_none() && section.date.is_none() {
                continue;
            }
            let body = section.span();
            for span in entity_spans.iter().filter(|span| body.contains(span)) {
                for (name, value) in attrs.into_iter().flatten() {
                    doc.set_span_attr(*span, name, value.clone())?;
                }
                if let Some(date) = section.date {
                    let date = date.format("%Y-%m-%d").to_string();
                    doc.set_span_attr(*span, SECTION_DATE, ExtValue::Str(date))?;
                }
            }
        }
        Ok(())
    }
}

impl Component for Sectionizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        self.matcher.extension_refs()
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let sections = self.sections(doc);
        self.annotate_entities(doc, &sections)?;
        doc.set_sections(sections)
    }
}
