use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Map, Value};

use super::{Match, Matcher};
use crate::{ExtValue, LLDoc, PatternError, SpanRef};

/// The token property a predicate reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAttr {
    /// Verbatim text (`ORTH` or `TEXT`)
    Orth,
    Lower,
    Norm,
    /// Text length in characters
    Length,
    IsDigit,
    IsPunct,
    IsAlpha,
    LikeNum,
    IsSpace,
    IsSentStart,
    /// Whether whitespace follows the token
    Spacy,
    /// A named extension slot (`{"_": {"name": ...}}`)
    Ext(String),
}

impl TokenAttr {
    pub fn parse(key: &str) -> Result<Self, PatternError> {
        Ok(match key.to_ascii_uppercase().as_str() {
            "ORTH" | "TEXT" => TokenAttr::Orth,
            "LOWER" => TokenAttr::Lower,
            "NORM" => TokenAttr::Norm,
            "LENGTH" => TokenAttr::Length,
            "IS_DIGIT" => TokenAttr::IsDigit,
            "IS_PUNCT" => TokenAttr::IsPunct,
            "IS_ALPHA" => TokenAttr::IsAlpha,
            "LIKE_NUM" => TokenAttr::LikeNum,
            "IS_SPACE" => TokenAttr::IsSpace,
            "IS_SENT_START" => TokenAttr::IsSentStart,
            "SPACY" => TokenAttr::Spacy,
            _ => return Err(PatternError::UnsupportedAttribute(key.to_string())),
        })
    }

    fn read(&self, doc: &LLDoc, idx: usize) -> Option<ExtValue> {
        let token = doc.token(idx)?;
        let flags = token.flags();
        Some(match self {
            TokenAttr::Orth => ExtValue::Str(token.text().to_string()),
            TokenAttr::Lower => ExtValue::Str(token.lower()),
            TokenAttr::Norm => ExtValue::Str(token.norm().to_string()),
            TokenAttr::Length => ExtValue::Int(token.text().chars().count() as i64),
            TokenAttr::IsDigit => ExtValue::Bool(flags.is_digit),
            TokenAttr::IsPunct => ExtValue::Bool(flags.is_punct),
            TokenAttr::IsAlpha => ExtValue::Bool(flags.is_alpha),
            TokenAttr::LikeNum => ExtValue::Bool(flags.like_num),
            TokenAttr::IsSpace => ExtValue::Bool(flags.is_space),
            TokenAttr::IsSentStart => ExtValue::Bool(token.is_sent_start()),
            TokenAttr::Spacy => ExtValue::Bool(token.whitespace_after()),
            TokenAttr::Ext(name) => doc.ext(idx, name).ok()?.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            ">=" => CompareOp::Ge,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            "<" => CompareOp::Lt,
            _ => return None,
        })
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lt => lhs < rhs,
        }
    }
}

/// A test applied to the value of one token attribute.
#[derive(Debug, Clone)]
pub enum ValueTest {
    Equals(ExtValue),
    In(Vec<ExtValue>),
    NotIn(Vec<ExtValue>),
    /// Passes when any of the expressions finds a match (unanchored).
    Regex(Vec<Regex>),
    Compare(CompareOp, f64),
}

impl ValueTest {
    fn passes(&self, value: &ExtValue) -> bool {
        match self {
            ValueTest::Equals(expected) => values_equal(value, expected),
            ValueTest::In(options) => options.iter().any(|o| values_equal(value, o)),
            ValueTest::NotIn(options) => !options.iter().any(|o| values_equal(value, o)),
            ValueTest::Regex(regexes) => {
                let text = match value {
                    ExtValue::Str(s) => s.clone(),
                    ExtValue::Null => return false,
                    other => other.to_string(),
                };
                regexes.iter().any(|re| re.is_match(&text))
            }
            ValueTest::Compare(op, rhs) => value.as_f64().map_or(false, |lhs| op.holds(lhs, *rhs)),
        }
    }
}

fn values_equal(a: &ExtValue, b: &ExtValue) -> bool {
    match (a, b) {
        (ExtValue::Int(_), ExtValue::Float(_)) | (ExtValue::Float(_), ExtValue::Int(_)) => {
            a.as_f64() == b.as_f64()
        }
        _ => a == b,
    }
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub attr: TokenAttr,
    pub test: ValueTest,
}

impl Predicate {
    fn holds(&self, doc: &LLDoc, idx: usize) -> bool {
        self.attr
            .read(doc, idx)
            .map_or(false, |value| self.test.passes(&value))
    }
}

/// How many tokens a [`TokenSpec`] consumes (`OP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Exactly one matching token
    One,
    /// `!`: exactly one token that does not match
    Negate,
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Quantifier {
    pub fn parse(op: &str) -> Result<Self, PatternError> {
        Ok(match op {
            "!" => Quantifier::Negate,
            "?" => Quantifier::ZeroOrOne,
            "*" => Quantifier::ZeroOrMore,
            "+" => Quantifier::OneOrMore,
            "1" => Quantifier::One,
            _ => return Err(PatternError::InvalidQuantifier(op.to_string())),
        })
    }
}

/// Constraints on a single token position.
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub predicates: Vec<Predicate>,
    pub quantifier: Quantifier,
}

impl Default for TokenSpec {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            quantifier: Quantifier::One,
        }
    }
}

impl TokenSpec {
    /// Matches any single token.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: TokenAttr, test: ValueTest) -> Self {
        self.predicates.push(Predicate { attr, test });
        self
    }

    pub fn text(self, text: &str) -> Self {
        self.with(TokenAttr::Orth, ValueTest::Equals(text.into()))
    }

    pub fn lower(self, text: &str) -> Self {
        self.with(TokenAttr::Lower, ValueTest::Equals(text.to_lowercase().into()))
    }

    pub fn lower_in<'s>(self, options: impl IntoIterator<Item = &'s str>) -> Self {
        let options = options.into_iter().map(ExtValue::from).collect();
        self.with(TokenAttr::Lower, ValueTest::In(options))
    }

    pub fn text_in<'s>(self, options: impl IntoIterator<Item = &'s str>) -> Self {
        let options = options.into_iter().map(ExtValue::from).collect();
        self.with(TokenAttr::Orth, ValueTest::In(options))
    }

    pub fn regex(self, attr: TokenAttr, pattern: &str) -> Result<Self, PatternError> {
        let re = compile_regex(pattern)?;
        Ok(self.with(attr, ValueTest::Regex(vec![re])))
    }

    pub fn flag(self, attr: TokenAttr, value: bool) -> Self {
        self.with(attr, ValueTest::Equals(ExtValue::Bool(value)))
    }

    pub fn ext(self, name: &str, value: ExtValue) -> Self {
        self.with(TokenAttr::Ext(name.to_string()), ValueTest::Equals(value))
    }

    pub fn op(mut self, quantifier: Quantifier) -> Self {
        self.quantifier = quantifier;
        self
    }

    pub fn optional(self) -> Self {
        self.op(Quantifier::ZeroOrOne)
    }

    fn holds(&self, doc: &LLDoc, idx: usize) -> bool {
        self.predicates.iter().all(|p| p.holds(doc, idx))
    }

    /// Parse one token object, e.g. `{"LOWER": {"IN": ["ecog"]}, "OP": "?"}`.
    pub fn from_json(value: &Value) -> Result<Self, PatternError> {
        let object = value
            .as_object()
            .ok_or_else(|| PatternError::Malformed(format!("token spec must be an object, got {}", value)))?;

        let mut spec = TokenSpec::default();
        for (key, value) in object {
            match key.as_str() {
                "OP" => {
                    let op = value
                        .as_str()
                        .ok_or_else(|| PatternError::InvalidQuantifier(value.to_string()))?;
                    spec.quantifier = Quantifier::parse(op)?;
                }
                "_" => {
                    let slots = value.as_object().ok_or_else(|| {
                        PatternError::Malformed(format!("'_' must map extension names to values, got {}", value))
                    })?;
                    for (name, test) in slots {
                        let attr = TokenAttr::Ext(name.clone());
                        for test in parse_tests(name, test)? {
                            spec.predicates.push(Predicate {
                                attr: attr.clone(),
                                test,
                            });
                        }
                    }
                }
                _ => {
                    let attr = TokenAttr::parse(key)?;
                    for test in parse_tests(key, value)? {
                        spec.predicates.push(Predicate {
                            attr: attr.clone(),
                            test,
                        });
                    }
                }
            }
        }
        Ok(spec)
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

fn scalar(attr: &str, value: &Value) -> Result<ExtValue, PatternError> {
    ExtValue::from_json(value)
        .ok_or_else(|| PatternError::Malformed(format!("'{}' expects a scalar, got {}", attr, value)))
}

fn scalar_list(attr: &str, value: &Value) -> Result<Vec<ExtValue>, PatternError> {
    value
        .as_array()
        .ok_or_else(|| PatternError::Malformed(format!("'{}' expects a list, got {}", attr, value)))?
        .iter()
        .map(|item| scalar(attr, item))
        .collect()
}

fn parse_tests(attr: &str, value: &Value) -> Result<Vec<ValueTest>, PatternError> {
    let object: &Map<String, Value> = match value {
        Value::Object(object) => object,
        other => return Ok(vec![ValueTest::Equals(scalar(attr, other)?)]),
    };

    let mut tests = Vec::with_capacity(object.len());
    for (op, arg) in object {
        let test = match op.as_str() {
            "IN" => ValueTest::In(scalar_list(attr, arg)?),
            "NOT_IN" => ValueTest::NotIn(scalar_list(attr, arg)?),
            "REGEX" => {
                let patterns: Vec<&str> = match arg {
                    Value::String(pattern) => vec![pattern.as_str()],
                    Value::Object(inner) => match inner.get("IN").and_then(Value::as_array) {
                        Some(list) => list.iter().filter_map(Value::as_str).collect(),
                        None => return Err(PatternError::Malformed(format!("REGEX expects a string, got {}", arg))),
                    },
                    _ => return Err(PatternError::Malformed(format!("REGEX expects a string, got {}", arg))),
                };
                ValueTest::Regex(patterns.into_iter().map(compile_regex).collect::<Result<_, _>>()?)
            }
            other => match CompareOp::parse(other) {
                Some(cmp) => {
                    let rhs = arg.as_f64().ok_or_else(|| {
                        PatternError::Malformed(format!("'{}' expects a number, got {}", other, arg))
                    })?;
                    ValueTest::Compare(cmp, rhs)
                }
                None => {
                    return Err(PatternError::UnsupportedOperator {
                        attr: attr.to_string(),
                        op: other.to_string(),
                    })
                }
            },
        };
        tests.push(test);
    }
    Ok(tests)
}

/// A sequence of token specs.
#[derive(Debug, Clone, Default)]
pub struct TokenPattern {
    pub specs: Vec<TokenSpec>,
}

impl TokenPattern {
    pub fn new(specs: Vec<TokenSpec>) -> Self {
        Self { specs }
    }

    pub fn from_json(value: &Value) -> Result<Self, PatternError> {
        let items = value
            .as_array()
            .ok_or_else(|| PatternError::Malformed(format!("token pattern must be a list, got {}", value)))?;
        Ok(Self {
            specs: items.iter().map(TokenSpec::from_json).collect::<Result<_, _>>()?,
        })
    }

    /// Expand `+` into one required step followed by a repeating one.
    fn compile(self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            match spec.quantifier {
                Quantifier::OneOrMore => {
                    steps.push(Step {
                        spec: spec.clone().op(Quantifier::One),
                    });
                    steps.push(Step {
                        spec: spec.op(Quantifier::ZeroOrMore),
                    });
                }
                _ => steps.push(Step { spec }),
            }
        }
        steps
    }
}

#[derive(Debug, Clone)]
struct Step {
    spec: TokenSpec,
}

impl Step {
    fn skippable(&self) -> bool {
        matches!(
            self.spec.quantifier,
            Quantifier::ZeroOrOne | Quantifier::ZeroOrMore
        )
    }
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    label_id: usize,
    steps: Vec<Step>,
}

impl CompiledPattern {
    /// Close a state set over the steps that may match zero tokens.
    fn close(&self, states: &mut BTreeSet<usize>) {
        let mut worklist: Vec<usize> = states.iter().copied().collect();
        while let Some(state) = worklist.pop() {
            if state < self.steps.len() && self.steps[state].skippable() && states.insert(state + 1) {
                worklist.push(state + 1);
            }
        }
    }

    fn find_into(&self, doc: &LLDoc, within: SpanRef, out: &mut BTreeSet<Match>) {
        let accept = self.steps.len();
        if accept == 0 {
            return;
        }

        for start in within.start..within.end {
            let mut active = BTreeSet::new();
            active.insert(0);
            self.close(&mut active);

            for idx in start..within.end {
                let mut next = BTreeSet::new();
                for &state in &active {
                    if state == accept {
                        continue;
                    }
                    let step = &self.steps[state];
                    let holds = step.spec.holds(doc, idx);
                    match step.spec.quantifier {
                        Quantifier::One | Quantifier::ZeroOrOne | Quantifier::OneOrMore => {
                            if holds {
                                next.insert(state + 1);
                            }
                        }
                        Quantifier::Negate => {
                            if !holds {
                                next.insert(state + 1);
                            }
                        }
                        Quantifier::ZeroOrMore => {
                            if holds {
                                next.insert(state);
                            }
                        }
                    }
                }
                self.close(&mut next);

                if next.contains(&accept) {
                    out.insert(Match::new(self.label_id, start, idx + 1));
                }
                if next.is_empty() || next.iter().all(|&s| s == accept) {
                    break;
                }
                active = next;
            }
        }
    }
}

/// Compiled declarative token patterns grouped under labels.
///
/// Patterns use the JSON shape
/// `[{"LOWER": "ecog"}, {"IS_PUNCT": true, "OP": "?"}, {"LIKE_NUM": true}]`.
/// All patterns are compiled when added; matching only reads.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    labels: Vec<String>,
    patterns: Vec<CompiledPattern>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A matcher holding every pattern of `patterns` (a JSON list of patterns) under `label`.
    pub fn from_json(label: &str, patterns: &Value) -> Result<Self, PatternError> {
        let mut matcher = Self::new();
        matcher.add_json(label, patterns)?;
        Ok(matcher)
    }

    /// Returns the label's id, registering the label if needed.
    fn label_id(&mut self, label: &str) -> usize {
        match self.labels.iter().position(|l| l == label) {
            Some(id) => id,
            None => {
                self.labels.push(label.to_string());
                self.labels.len() - 1
            }
        }
    }

    pub fn add(&mut self, label: &str, patterns: Vec<TokenPattern>) -> usize {
        let label_id = self.label_id(label);
        for pattern in patterns {
            self.patterns.push(CompiledPattern {
                label_id,
                steps: pattern.compile(),
            });
        }
        label_id
    }

    /// Add a JSON list of patterns under `label`.
    pub fn add_json(&mut self, label: &str, patterns: &Value) -> Result<usize, PatternError> {
        let list = patterns
            .as_array()
            .ok_or_else(|| PatternError::Malformed(format!("expected a list of patterns, got {}", patterns)))?;
        let compiled = list
            .iter()
            .map(TokenPattern::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.add(label, compiled))
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Extension names read through `_` predicates.
    pub fn extension_refs(&self) -> BTreeSet<String> {
        self.patterns
            .iter()
            .flat_map(|pattern| &pattern.steps)
            .flat_map(|step| &step.spec.predicates)
            .filter_map(|predicate| match &predicate.attr {
                TokenAttr::Ext(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Matcher for PatternMatcher {
    fn find(&self, doc: &LLDoc, within: SpanRef) -> Vec<Match> {
        let within = SpanRef::new(within.start.min(doc.len()), within.end.min(doc.len()));
        let mut found = BTreeSet::new();
        for pattern in &self.patterns {
            pattern.find_into(doc, within, &mut found);
        }
        let mut matches: Vec<Match> = found.into_iter().collect();
        matches.sort_by_key(|m| (m.start, m.end, m.pattern_id));
        matches.dedup_by_key(|m| (m.start, m.end, m.pattern_id));
        matches
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{ExtensionDecl, ExtensionSchema};

    fn doc(words: &[&str]) -> LLDoc {
        LLDoc::from_words(Arc::new(ExtensionSchema::empty()), words)
    }

    fn spans(matches: &[Match]) -> Vec<(usize, usize)> {
        matches.iter().map(|m| (m.start, m.end)).collect()
    }

    #[test]
    fn literal_and_optional_tokens() {
        let matcher = PatternMatcher::from_json(
            "ECOG",
            &json!([[{"LOWER": "ecog"}, {"IS_PUNCT": true, "OP": "?"}, {"LIKE_NUM": true}]]),
        )
        .unwrap();

        let d = doc(&["ECOG", ":", "2", "and", "ecog", "1"]);
        assert_eq!(spans(&matcher.find_all(&d)), vec![(0, 3), (4, 6)]);
    }

    #[test]
    fn star_returns_every_length() {
        let matcher = PatternMatcher::from_json(
            "P",
            &json!([[{"LOWER": "performance"}, {"IS_ALPHA": true, "OP": "*"}]]),
        )
        .unwrap();

        let d = doc(&["performance", "status", "good", "2"]);
        assert_eq!(spans(&matcher.find_all(&d)), vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn plus_requires_one_token() {
        let matcher =
            PatternMatcher::from_json("N", &json!([[{"IS_DIGIT": true, "OP": "+"}]])).unwrap();

        let d = doc(&["a", "1", "2"]);
        assert_eq!(
            spans(&matcher.find_all(&d)),
            vec![(1, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn negation_consumes_a_non_matching_token() {
        let matcher = PatternMatcher::from_json(
            "N",
            &json!([[{"LOWER": "no"}, {"LOWER": "further", "OP": "!"}]]),
        )
        .unwrap();

        assert_eq!(spans(&matcher.find_all(&doc(&["no", "pain"]))), vec![(0, 2)]);
        assert!(matcher.find_all(&doc(&["no", "further"])).is_empty());
    }

    #[test]
    fn set_membership_regex_and_comparison() {
        let matcher = PatternMatcher::from_json(
            "W",
            &json!([[
                {"LOWER": {"IN": ["weight", "wt"]}},
                {"TEXT": {"REGEX": "^[0-9]+$"}, "LENGTH": {">=": 2}},
                {"LOWER": {"NOT_IN": ["lbs"]}}
            ]]),
        )
        .unwrap();

        assert_eq!(spans(&matcher.find_all(&doc(&["wt", "70", "kg"]))), vec![(0, 3)]);
        assert!(matcher.find_all(&doc(&["wt", "7", "kg"])).is_empty());
        assert!(matcher.find_all(&doc(&["wt", "70", "lbs"])).is_empty());
    }

    #[test]
    fn extension_predicates_read_the_schema() {
        let mut builder = ExtensionSchema::builder();
        builder.declare(ExtensionDecl::flag("date")).unwrap();
        let mut d = LLDoc::from_words(Arc::new(builder.build()), &["seen", "12/03/2021"]);
        d.set_ext(1, "date", ExtValue::Bool(true)).unwrap();

        let matcher = PatternMatcher::from_json("D", &json!([[{"_": {"date": true}}]])).unwrap();
        assert_eq!(spans(&matcher.find_all(&d)), vec![(1, 2)]);
        assert_eq!(
            matcher.extension_refs().into_iter().collect::<Vec<_>>(),
            vec!["date".to_string()]
        );
    }

    #[test]
    fn within_limits_the_search() {
        let matcher = PatternMatcher::from_json("N", &json!([[{"IS_DIGIT": true}]])).unwrap();
        let d = doc(&["1", "a", "2", "3"]);
        assert_eq!(
            spans(&matcher.find(&d, SpanRef::new(1, 3))),
            vec![(2, 3)]
        );
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        assert!(matches!(
            PatternMatcher::from_json("X", &json!([[{"LOWER": {"FUZZY": "ecog"}}]])),
            Err(PatternError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            PatternMatcher::from_json("X", &json!([[{"POS": "NOUN"}]])),
            Err(PatternError::UnsupportedAttribute(_))
        ));
        assert!(matches!(
            PatternMatcher::from_json("X", &json!([[{"LOWER": "a", "OP": "{2}"}]])),
            Err(PatternError::InvalidQuantifier(_))
        ));
        assert!(matches!(
            PatternMatcher::from_json("X", &json!([[{"TEXT": {"REGEX": "("}}]])),
            Err(PatternError::Regex { .. })
        ));
    }
}
