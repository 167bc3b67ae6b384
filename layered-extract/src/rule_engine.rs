use std::collections::BTreeSet;

use layered_clinical::conflict::{filter_matches, is_excluded, is_widest};
use layered_clinical::{
    Component, DocError, Entity, ExtValue, ExtensionDecl, LLDoc, LabeledSpan, Match, Matcher,
    MergeSpec, PatternError, PatternMatcher, SpanRef,
};
use serde::Deserialize;
use serde_json::Value;

use crate::label_matcher::{non_empty, optional_matcher};
use crate::SpanValuePatterns;

/// One named group of a [`RuleEngineConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct RuleGroupConfig {
    pub label: String,
    pub token_patterns: Value,
    /// A literal value attached to every span of the group.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub value_patterns: Option<Value>,
    #[serde(default)]
    pub norm_patterns: Option<Value>,
    #[serde(default, alias = "exclusion_patterns")]
    pub exclusions: Option<Value>,
    #[serde(default)]
    pub entity_label: Option<String>,
}

/// Declarative form of a [`RuleEngine`].
///
/// Either `groups` or the single-group shorthand (`token_patterns` and
/// friends at the top level) must be given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleEngineConfig {
    #[serde(default)]
    pub token_label: Option<String>,
    #[serde(default)]
    pub value_label: Option<String>,
    #[serde(default)]
    pub entity_label: Option<String>,
    #[serde(default)]
    pub merge_ents: bool,
    #[serde(default)]
    pub groups: Vec<RuleGroupConfig>,

    #[serde(default)]
    pub token_patterns: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub value_patterns: Option<Value>,
    #[serde(default)]
    pub norm_patterns: Option<Value>,
    #[serde(default, alias = "exclusion_patterns")]
    pub exclusions: Option<Value>,
}

/// Where a group's value comes from.
#[derive(Debug, Clone)]
pub enum GroupValue {
    None,
    Literal(ExtValue),
    Patterns,
}

#[derive(Debug, Clone)]
pub struct RuleGroup {
    label: String,
    matcher: PatternMatcher,
    literal: Option<ExtValue>,
    patterns: SpanValuePatterns,
    exclusions: Option<PatternMatcher>,
    entity_label: Option<String>,
}

impl RuleGroup {
    pub fn new(label: impl Into<String>, matcher: PatternMatcher) -> Self {
        Self {
            label: label.into(),
            matcher,
            literal: None,
            patterns: SpanValuePatterns::new(None, None),
            exclusions: None,
            entity_label: None,
        }
    }

    pub fn with_literal(mut self, value: ExtValue) -> Self {
        self.literal = Some(value);
        self
    }

    pub fn with_patterns(mut self, patterns: SpanValuePatterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_exclusions(mut self, exclusions: PatternMatcher) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    pub fn with_entity_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = Some(label.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value_source(&self) -> GroupValue {
        match &self.literal {
            Some(value) => GroupValue::Literal(value.clone()),
            None if self.patterns.has_value_patterns() => GroupValue::Patterns,
            None => GroupValue::None,
        }
    }

    /// The literal value wins over value patterns. No source, or value
    /// patterns that match nothing in `span`, yield `Null`.
    fn value(&self, doc: &LLDoc, span: SpanRef) -> ExtValue {
        match self.value_source() {
            GroupValue::Literal(value) => value,
            GroupValue::Patterns => self.patterns.matched_value(doc, span).unwrap_or(ExtValue::Null),
            GroupValue::None => ExtValue::Null,
        }
    }

    fn from_config(group: &RuleGroupConfig) -> Result<Self, PatternError> {
        let mut built = Self::new(
            group.label.as_str(),
            PatternMatcher::from_json(&group.label, &group.token_patterns)?,
        )
        .with_patterns(SpanValuePatterns::new(
            optional_matcher("value", &group.value_patterns)?,
            optional_matcher("norm", &group.norm_patterns)?,
        ));
        if let Some(value) = &group.value {
            built = built.with_literal(literal(&group.label, value)?);
        }
        if let Some(exclusions) = optional_matcher("exclude", &group.exclusions)? {
            built = built.with_exclusions(exclusions);
        }
        if let Some(entity_label) = non_empty(&group.entity_label) {
            built = built.with_entity_label(entity_label);
        }
        Ok(built)
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        let mut refs = self.matcher.extension_refs();
        refs.extend(self.patterns.extension_refs());
        if let Some(exclusions) = &self.exclusions {
            refs.extend(exclusions.extension_refs());
        }
        refs
    }
}

fn literal(label: &str, value: &Value) -> Result<ExtValue, PatternError> {
    ExtValue::from_json(value).ok_or_else(|| {
        PatternError::Malformed(format!("group '{}' literal value must be a scalar, got {}", label, value))
    })
}

/// Many named pattern groups resolved together.
///
/// Matches of every group are pooled before the widest-match filter, so
/// overlapping claims from different groups compete with each other.
/// Exclusions only apply to the group that declares them. Surviving spans
/// land in the span group named after the component, labeled with their
/// group and carrying the group's value.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    name: String,
    token_label: Option<String>,
    value_label: Option<String>,
    entity_label: Option<String>,
    merge_ents: bool,
    groups: Vec<RuleGroup>,
}

impl RuleEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token_label: None,
            value_label: None,
            entity_label: None,
            merge_ents: false,
            groups: Vec::new(),
        }
    }

    pub fn with_token_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = Some(label.into());
        self
    }

    pub fn with_value_label(mut self, label: impl Into<String>) -> Self {
        self.value_label = Some(label.into());
        self
    }

    pub fn with_entity_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = Some(label.into());
        self
    }

    pub fn with_merge_ents(mut self, merge_ents: bool) -> Self {
        self.merge_ents = merge_ents;
        self
    }

    pub fn add_group(mut self, group: RuleGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    pub fn from_config(name: &str, config: &RuleEngineConfig) -> Result<Self, PatternError> {
        let mut engine = Self::new(name).with_merge_ents(config.merge_ents);
        engine.token_label = non_empty(&config.token_label);
        engine.value_label = non_empty(&config.value_label);
        engine.entity_label = non_empty(&config.entity_label);

        if let Some(token_patterns) = &config.token_patterns {
            let label = engine.token_label.clone().unwrap_or_else(|| name.to_string());
            let shorthand = RuleGroupConfig {
                label,
                token_patterns: token_patterns.clone(),
                value: config.value.clone(),
                value_patterns: config.value_patterns.clone(),
                norm_patterns: config.norm_patterns.clone(),
                exclusions: config.exclusions.clone(),
                entity_label: None,
            };
            engine.groups.push(RuleGroup::from_config(&shorthand)?);
        }
        for group in &config.groups {
            engine.groups.push(RuleGroup::from_config(group)?);
        }

        if engine.groups.is_empty() {
            return Err(PatternError::Malformed(format!(
                "rule engine '{}' needs `groups` or `token_patterns`",
                name
            )));
        }
        Ok(engine)
    }

    /// Pooled matches tagged with their group index, filtered by the
    /// widest-match check and each group's own exclusions.
    pub fn accepted_matches(&self, doc: &LLDoc) -> Vec<Match> {
        let mut pooled = Vec::new();
        for (group_id, group) in self.groups.iter().enumerate() {
            pooled.extend(
                group
                    .matcher
                    .find_all(doc)
                    .into_iter()
                    .map(|m| Match::new(group_id, m.start, m.end)),
            );
        }
        let exclusions: Vec<Vec<Match>> = self
            .groups
            .iter()
            .map(|group| {
                group
                    .exclusions
                    .as_ref()
                    .map(|ex| ex.find_all(doc))
                    .unwrap_or_default()
            })
            .collect();

        let accepted: Vec<Match> = pooled
            .iter()
            .filter(|m| is_widest(m.span(), &pooled) && !is_excluded(m.span(), &exclusions[m.pattern_id]))
            .copied()
            .collect();

        tracing::debug!(
            component = %self.name,
            groups = self.groups.len(),
            raw = pooled.len(),
            accepted = accepted.len(),
            "rule engine matches"
        );
        accepted
    }
}

impl Component for RuleEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> Vec<ExtensionDecl> {
        let mut decls = Vec::new();
        if let Some(token_label) = &self.token_label {
            decls.push(ExtensionDecl::flag(token_label.as_str()));
        }
        if let Some(value_label) = &self.value_label {
            decls.push(ExtensionDecl::value(value_label.as_str(), ExtValue::Null));
        }
        decls
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        self.groups.iter().flat_map(RuleGroup::extension_refs).collect()
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let accepted = self.accepted_matches(doc);

        let mut values = Vec::with_capacity(accepted.len());
        for m in &accepted {
            let group = &self.groups[m.pattern_id];
            let span = m.span();
            let value = group.value(doc, span);

            let mut labeled = LabeledSpan::new(span).with_label(group.label.as_str());
            if !value.is_null() {
                labeled = labeled.with_value(value.clone());
            }
            doc.push_span(&self.name, labeled)?;

            if let Some(token_label) = &self.token_label {
                doc.set_ext_span(span, token_label, ExtValue::Bool(true))?;
            }
            if let (Some(value_label), false) = (&self.value_label, value.is_null()) {
                doc.set_ext_span(span, value_label, value.clone())?;
            }

            let entity_label = group.entity_label.as_ref().or(self.entity_label.as_ref());
            if let Some(label) = entity_label {
                if is_widest(span, &accepted) {
                    let mut entity = Entity::new(label.clone(), span);
                    if !value.is_null() {
                        entity.value = Some(value.clone());
                    }
                    doc.add_entity(entity)?;
                }
            }
            values.push(value);
        }

        if self.merge_ents {
            let specs: Vec<MergeSpec> = filter_matches(&accepted)
                .iter()
                .map(|m| {
                    let group = &self.groups[m.pattern_id];
                    let mut spec = MergeSpec::new(m.span()).with_norm(group.patterns.norm(doc, m.span()));
                    if let Some(token_label) = &self.token_label {
                        spec = spec.with_ext(token_label.as_str(), ExtValue::Bool(true));
                    }
                    if let Some(value_label) = &self.value_label {
                        let value = accepted
                            .iter()
                            .position(|a| a == m)
                            .map(|idx| values[idx].clone())
                            .unwrap_or(ExtValue::Null);
                        if !value.is_null() {
                            spec = spec.with_ext(value_label.as_str(), value);
                        }
                    }
                    spec
                })
                .collect();
            doc.merge_spans(specs)?;
        }
        Ok(())
    }
}
