//! Section header rules.

use std::collections::BTreeMap;

use layered_clinical::{tokenize, PatternError};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Category whose titles carry the section date.
pub const DATE_CATEGORY: &str = "date_time_section";

/// One section header rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectionRule {
    pub category: String,
    pub literal: String,
    /// Token pattern; when absent the literal's lowercase tokens at the start
    /// of a sentence, optionally followed by `:`, `-` or `;`.
    #[serde(default)]
    pub pattern: Option<Value>,
    /// Categories this section may nest under.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Drop the section when none of `parents` is found.
    #[serde(default)]
    pub parent_required: bool,
    /// In dated mode, every following section nests under this one until the
    /// next top-level section.
    #[serde(default)]
    pub top_level: bool,
}

impl SectionRule {
    pub fn new(category: impl Into<String>, literal: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            literal: literal.into(),
            pattern: None,
            parents: Vec::new(),
            parent_required: false,
            top_level: false,
        }
    }

    pub fn with_pattern(mut self, pattern: Value) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_parents<'a>(mut self, parents: impl IntoIterator<Item = &'a str>, required: bool) -> Self {
        self.parents = parents.into_iter().map(str::to_string).collect();
        self.parent_required = required;
        self
    }

    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self
    }

    /// The rule's token patterns as a JSON list of patterns.
    pub fn patterns(&self) -> Result<Value, PatternError> {
        match &self.pattern {
            None => header_pattern(&self.literal),
            Some(Value::Object(spec)) => Ok(json!([[spec]])),
            Some(Value::Array(items)) if items.iter().all(Value::is_object) => Ok(json!([items])),
            Some(patterns @ Value::Array(_)) => Ok(patterns.clone()),
            Some(other) => Err(PatternError::Malformed(format!(
                "section rule '{}' has an invalid pattern: {}",
                self.literal, other
            ))),
        }
    }
}

fn header_pattern(literal: &str) -> Result<Value, PatternError> {
    let mut specs: Vec<Map<String, Value>> = tokenize(literal)
        .into_iter()
        .filter(|token| !token.text.trim().is_empty())
        .map(|token| {
            let mut spec = Map::new();
            spec.insert("LOWER".to_string(), json!(token.text.to_lowercase()));
            spec
        })
        .collect();
    match specs.first_mut() {
        Some(first) => {
            first.insert("IS_SENT_START".to_string(), json!(true));
        }
        None => return Err(PatternError::Malformed("section rule with an empty literal".to_string())),
    }
    let mut pattern: Vec<Value> = specs.into_iter().map(Value::Object).collect();
    pattern.push(json!({"TEXT": {"IN": [":", "-", ";"]}, "OP": "?"}));
    Ok(json!([pattern]))
}

/// Per-category lookups over a rule list.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuleIndex {
    parents: BTreeMap<String, Vec<String>>,
    parent_required: BTreeMap<String, bool>,
}

impl RuleIndex {
    /// Later rules of a category extend its parents and may only turn
    /// `parent_required` on.
    pub(crate) fn new(rules: &[SectionRule]) -> Self {
        let mut index = Self::default();
        for rule in rules {
            let parents = index.parents.entry(rule.category.clone()).or_default();
            for parent in &rule.parents {
                if !parents.contains(parent) {
                    parents.push(parent.clone());
                }
            }
            *index.parent_required.entry(rule.category.clone()).or_default() |= rule.parent_required;
        }
        index
    }

    pub(crate) fn parents(&self, category: &str) -> &[String] {
        self.parents.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn parent_required(&self, category: &str) -> bool {
        self.parent_required.get(category).copied().unwrap_or(false)
    }
}
