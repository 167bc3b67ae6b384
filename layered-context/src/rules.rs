//! Context rules: the phrases that modify nearby entities.

use layered_clinical::{tokenize, PatternError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which side of a modifier its scope extends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Modifies what follows (`no evidence of ...`)
    Forward,
    /// Modifies what precedes (`... was ruled out`)
    Backward,
    Bidirectional,
    /// Ends the scope of other modifiers (`but`, `however`)
    Terminate,
    /// Matches a phrase only to stop a shorter modifier from matching
    /// inside it (`no increase`); never modifies anything itself.
    Pseudo,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Bidirectional
    }
}

impl Direction {
    pub fn modifies_before(&self) -> bool {
        matches!(self, Direction::Backward | Direction::Bidirectional)
    }

    pub fn modifies_after(&self) -> bool {
        matches!(self, Direction::Forward | Direction::Bidirectional)
    }
}

/// One rule of a context rules file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextRule {
    pub literal: String,
    pub category: String,
    /// Token pattern; the literal's lowercase tokens when absent.
    #[serde(default)]
    pub pattern: Option<Value>,
    #[serde(default)]
    pub direction: Direction,
    /// Maximum scope length in tokens on each side.
    #[serde(default)]
    pub max_scope: Option<usize>,
}

impl ContextRule {
    pub fn new(literal: impl Into<String>, category: impl Into<String>, direction: Direction) -> Self {
        Self {
            literal: literal.into(),
            category: category.into(),
            pattern: None,
            direction,
            max_scope: None,
        }
    }

    pub fn with_pattern(mut self, pattern: Value) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_max_scope(mut self, max_scope: usize) -> Self {
        self.max_scope = Some(max_scope);
        self
    }

    /// The rule's token patterns as a JSON list of patterns.
    ///
    /// A pattern that is a single token spec or a single pattern is wrapped.
    pub fn patterns(&self) -> Result<Value, PatternError> {
        match &self.pattern {
            None => literal_pattern(&self.literal),
            Some(Value::Object(spec)) => Ok(json!([[spec]])),
            Some(Value::Array(items)) if items.iter().all(Value::is_object) => Ok(json!([items])),
            Some(patterns @ Value::Array(_)) => Ok(patterns.clone()),
            Some(other) => Err(PatternError::Malformed(format!(
                "context rule '{}' has an invalid pattern: {}",
                self.literal, other
            ))),
        }
    }
}

fn literal_pattern(literal: &str) -> Result<Value, PatternError> {
    let specs: Vec<Value> = tokenize(literal)
        .into_iter()
        .filter(|token| !token.text.trim().is_empty())
        .map(|token| json!({"LOWER": token.text.to_lowercase()}))
        .collect();
    if specs.is_empty() {
        return Err(PatternError::Malformed("context rule with an empty literal".to_string()));
    }
    Ok(json!([specs]))
}

/// The contents of a context rules file: `{"context_rules": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContextRules {
    pub context_rules: Vec<ContextRule>,
}

impl ContextRules {
    pub fn new(context_rules: Vec<ContextRule>) -> Self {
        Self { context_rules }
    }

    pub fn from_json(value: &Value) -> Result<Self, PatternError> {
        if value.get("context_rules").is_none() {
            return Err(PatternError::Malformed(
                "context rules must contain a top-level 'context_rules' key".to_string(),
            ));
        }
        serde_json::from_value(value.clone()).map_err(|err| PatternError::Malformed(err.to_string()))
    }

    pub fn len(&self) -> usize {
        self.context_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context_rules.is_empty()
    }
}
