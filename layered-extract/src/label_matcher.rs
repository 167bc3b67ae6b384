use std::collections::BTreeSet;

use layered_clinical::conflict::{filter_matches, is_widest, resolve_conflicts};
use layered_clinical::{
    Component, DocError, Entity, ExtValue, ExtensionDecl, LLDoc, Match, Matcher, MergeSpec,
    PatternError, PatternMatcher,
};
use serde::Deserialize;
use serde_json::Value;

/// Declarative form of a [`LabelMatcher`].
#[derive(Debug, Clone, Deserialize)]
pub struct LabelMatcherConfig {
    pub token_label: String,
    pub token_patterns: Value,
    #[serde(default)]
    pub entity_label: Option<String>,
    #[serde(default, alias = "exclusion_patterns")]
    pub exclusions: Option<Value>,
    #[serde(default = "default_merge_ents")]
    pub merge_ents: bool,
}

fn default_merge_ents() -> bool {
    true
}

/// Empty labels mean "no label".
pub(crate) fn non_empty(label: &Option<String>) -> Option<String> {
    label.as_ref().filter(|l| !l.is_empty()).cloned()
}

/// Compile an optional JSON pattern list, treating an empty list as absent.
pub(crate) fn optional_matcher(label: &str, patterns: &Option<Value>) -> Result<Option<PatternMatcher>, PatternError> {
    match patterns {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(list)) if list.is_empty() => Ok(None),
        Some(patterns) => PatternMatcher::from_json(label, patterns).map(Some),
    }
}

/// Flags every token of an accepted match with `token_label`, registers
/// entities and optionally merges each accepted range into one token.
///
/// Matches pass the widest-match filter and the exclusion filter (see
/// [`layered_clinical::conflict`]) before they are accepted.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    name: String,
    token_label: String,
    entity_label: Option<String>,
    merge_ents: bool,
    matcher: PatternMatcher,
    exclusions: Option<PatternMatcher>,
}

impl LabelMatcher {
    pub fn new(name: impl Into<String>, token_label: impl Into<String>, matcher: PatternMatcher) -> Self {
        Self {
            name: name.into(),
            token_label: token_label.into(),
            entity_label: None,
            merge_ents: true,
            matcher,
            exclusions: None,
        }
    }

    pub fn from_config(name: &str, config: &LabelMatcherConfig) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.to_string(),
            token_label: config.token_label.clone(),
            entity_label: non_empty(&config.entity_label),
            merge_ents: config.merge_ents,
            matcher: PatternMatcher::from_json(&config.token_label, &config.token_patterns)?,
            exclusions: optional_matcher("exclude", &config.exclusions)?,
        })
    }

    pub fn with_entity_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = Some(label.into());
        self
    }

    pub fn with_exclusions(mut self, exclusions: PatternMatcher) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    pub fn with_merge_ents(mut self, merge_ents: bool) -> Self {
        self.merge_ents = merge_ents;
        self
    }

    pub fn token_label(&self) -> &str {
        &self.token_label
    }

    pub fn entity_label(&self) -> Option<&str> {
        self.entity_label.as_deref()
    }

    /// Raw matches filtered by the widest-match and exclusion stages.
    pub fn accepted_matches(&self, doc: &LLDoc) -> Vec<Match> {
        let raw = self.matcher.find_all(doc);
        let exclusions = self
            .exclusions
            .as_ref()
            .map(|ex| ex.find_all(doc))
            .unwrap_or_default();
        let accepted = resolve_conflicts(&raw, &exclusions);
        tracing::debug!(
            component = %self.name,
            raw = raw.len(),
            excluded_by = exclusions.len(),
            accepted = accepted.len(),
            "label matches"
        );
        accepted
    }

    /// Register an entity for every accepted match that is still the widest
    /// among its accepted siblings, valued by `value_of`.
    pub fn register_entities(
        &self,
        doc: &mut LLDoc,
        accepted: &[Match],
        mut value_of: impl FnMut(&LLDoc, &Match) -> Option<ExtValue>,
    ) -> Result<(), DocError> {
        let label = match &self.entity_label {
            Some(label) => label,
            None => return Ok(()),
        };
        for m in accepted {
            if is_widest(m.span(), accepted) {
                let mut entity = Entity::new(label.clone(), m.span());
                entity.value = value_of(&*doc, m);
                doc.add_entity(entity)?;
            }
        }
        Ok(())
    }

    pub(crate) fn pattern_refs(&self) -> BTreeSet<String> {
        let mut refs = self.matcher.extension_refs();
        if let Some(exclusions) = &self.exclusions {
            refs.extend(exclusions.extension_refs());
        }
        refs
    }
}

impl Component for LabelMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> Vec<ExtensionDecl> {
        vec![ExtensionDecl::flag(self.token_label.as_str())]
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        self.pattern_refs()
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let accepted = self.accepted_matches(doc);
        self.register_entities(doc, &accepted, |_, _| None)?;

        let spans: Vec<_> = filter_matches(&accepted).iter().map(Match::span).collect();
        for span in &spans {
            doc.set_ext_span(*span, &self.token_label, ExtValue::Bool(true))?;
        }
        if self.merge_ents {
            doc.merge_spans(spans.into_iter().map(MergeSpec::new).collect())?;
        }
        Ok(())
    }
}
