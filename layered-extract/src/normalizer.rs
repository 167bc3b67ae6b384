//! Token normalisers.
//!
//! Each normaliser finds a surface form that the tokenizer splits apart
//! (`36.9`, `10^9`, `12/03/2021`, `5 pm`, `20 mg`), merges it back into one
//! token and stamps a canonical norm plus structured values onto it.

use layered_clinical::conflict::filter_spans;
use layered_clinical::{
    parse_day_first, Component, DocError, ExtKind, ExtValue, ExtensionDecl, LLDoc, Matcher,
    MergeSpec, PatternError, PatternMatcher, SpanRef,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Slot holding the normaliser name of a merged token.
pub const KIND: &str = "kind";
pub const VALUE: &str = "value";
pub const UNIT: &str = "unit";
pub const BASE: &str = "base";
pub const EXP: &str = "exp";

const MONTHS: [&str; 24] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december",
];
const TIMES: [&str; 10] = ["am", "a.m.", "a.m", "pm", "p.m.", "p.m", "hrs", "hr", "o'clock", "oclock"];
const YEAR: &str = r"^((19|20)\d\d|\d?\d)$";
const NUMERIC_MONTH: &str = r"^[0-1]?\d$";
const DAY: &str = r"^[0-3]?\d$";
const ORDINAL: &str = r"^(st|nd|rd|th)$";
const UNITS: &str = r"^(mg|mgc|g|kg|ml|l|m2|m\^2|hr|liter|gram|kilogram|lb|pounds|lbs|kilos)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    /// `36.9` and `36,9`; a comma is read as a decimal point, so `1,234`
    /// becomes `1.234`. Run value extraction for grouped numbers first.
    Decimal,
    SciNot,
    Date,
    Time,
    Unit,
}

impl NormalizerKind {
    pub const ALL: [NormalizerKind; 5] = [
        NormalizerKind::Decimal,
        NormalizerKind::SciNot,
        NormalizerKind::Date,
        NormalizerKind::Time,
        NormalizerKind::Unit,
    ];

    /// Name of the boolean flag set on merged tokens; also written to [`KIND`].
    pub fn flag(&self) -> &'static str {
        match self {
            NormalizerKind::Decimal => "decimal",
            NormalizerKind::SciNot => "sci_not",
            NormalizerKind::Date => "date",
            NormalizerKind::Time => "time",
            NormalizerKind::Unit => "unit_norm",
        }
    }

    fn patterns(&self) -> Value {
        match self {
            NormalizerKind::Decimal => json!([[
                {"IS_DIGIT": true, "LIKE_NUM": true},
                {"ORTH": {"IN": [".", ","]}, "SPACY": false},
                {"IS_DIGIT": true, "LIKE_NUM": true}
            ]]),
            NormalizerKind::SciNot => json!([
                [
                    {"LOWER": "x", "OP": "?"},
                    {"TEXT": "10"},
                    {"LOWER": "x", "OP": "?"},
                    {"TEXT": {"IN": ["^", "**"]}},
                    {"IS_DIGIT": true}
                ],
                [
                    {"IS_DIGIT": true},
                    {"LOWER": "e"},
                    {"TEXT": "+", "OP": "?"},
                    {"IS_DIGIT": true}
                ]
            ]),
            NormalizerKind::Date => Value::Array(date_patterns()),
            NormalizerKind::Time => json!([[
                {"LIKE_NUM": true},
                {"LOWER": {"IN": TIMES}}
            ]]),
            NormalizerKind::Unit => json!([
                [
                    {"LIKE_NUM": true},
                    {"LOWER": {"REGEX": UNITS}}
                ],
                [
                    {"LIKE_NUM": true},
                    {"LOWER": {"REGEX": UNITS}},
                    {"TEXT": "/"},
                    {"LIKE_NUM": true, "OP": "?"},
                    {"LOWER": {"REGEX": UNITS}}
                ]
            ]),
        }
    }

    fn compute(&self, doc: &LLDoc, span: SpanRef) -> Option<Normalised> {
        let text = doc.text_of(span);
        let tokens = &doc.tokens()[span.start..span.end];
        match self {
            NormalizerKind::Decimal => {
                let norm = text.replace(',', ".");
                let value = norm.parse::<f64>().ok()?;
                Some(Normalised::new(norm).with(VALUE, ExtValue::Float(value)))
            }
            NormalizerKind::SciNot => {
                let base: f64 = tokens
                    .iter()
                    .find(|t| t.flags().like_num)
                    .and_then(|t| t.text().parse().ok())?;
                let exp: i32 = tokens.last()?.text().parse().ok()?;
                let scientific = tokens.iter().any(|t| t.lower() == "e");
                let (norm, value) = if scientific {
                    (format!("{:?}e{}", base, exp), base * 10f64.powi(exp))
                } else {
                    (format!("{:?}^{}", base, exp), base.powi(exp))
                };
                Some(
                    Normalised::new(norm)
                        .with(BASE, ExtValue::Float(base))
                        .with(EXP, ExtValue::Int(exp.into()))
                        .with(VALUE, ExtValue::Float(value)),
                )
            }
            NormalizerKind::Date => {
                let date = match parse_day_first(&text) {
                    Some(date) => date,
                    None => {
                        tracing::debug!(text = %text, "date pattern matched unparsable text");
                        return None;
                    }
                };
                let iso = date.format("%Y-%m-%d").to_string();
                Some(Normalised::new(iso.clone()).with(VALUE, ExtValue::Str(iso)))
            }
            NormalizerKind::Time => {
                let num = tokens.first()?.text();
                let unit = tokens.get(1)?.lower();
                let value = num
                    .parse::<f64>()
                    .map(ExtValue::Float)
                    .unwrap_or_else(|_| ExtValue::from(num));
                Some(
                    Normalised::new(format!("{}{}", num, unit))
                        .with(VALUE, value)
                        .with(UNIT, ExtValue::Str(unit)),
                )
            }
            NormalizerKind::Unit => {
                let norm = text.to_lowercase();
                let (value, unit) = match tokens.first()?.text().parse::<f64>() {
                    Ok(value) => (
                        ExtValue::Float(value),
                        doc.text_of(SpanRef::new(span.start + 1, span.end)).to_lowercase(),
                    ),
                    Err(_) => (ExtValue::Null, norm.clone()),
                };
                Some(Normalised::new(norm).with(VALUE, value).with(UNIT, ExtValue::Str(unit)))
            }
        }
    }
}

/// Dates must start a sentence or follow whitespace, a line break or a
/// dash, so that spinal levels such as `C3/4` are left alone. The
/// preceding token is part of the match and trimmed off afterwards.
fn date_patterns() -> Vec<Value> {
    let months = MONTHS;
    let sep = |orth: &str| json!({"ORTH": orth, "SPACY": false});
    let digit = json!({"IS_DIGIT": true, "SPACY": false});
    let month_sep = json!({"ORTH": {"IN": ["/", "-", "'"]}, "OP": "?", "SPACY": false});
    let optional_year = json!({"TEXT": {"REGEX": YEAR}, "OP": "?"});

    let mut patterns = Vec::new();
    for orth in ["-", "/", "."] {
        patterns.push(json!([digit, sep(orth), digit, sep(orth), {"IS_DIGIT": true}]));
    }
    patterns.push(json!([
        digit, sep("-"), digit, sep("-"), {"IS_DIGIT": true},
        {"IS_DIGIT": true}, sep(":"), digit, sep(":"), {"IS_DIGIT": true}
    ]));
    patterns.push(json!([
        {"TEXT": {"REGEX": NUMERIC_MONTH}, "SPACY": false},
        {"ORTH": {"IN": ["/", "-"]}, "SPACY": false},
        {"TEXT": {"REGEX": YEAR}}
    ]));
    patterns.push(json!([
        {"TEXT": {"REGEX": DAY}, "SPACY": false},
        {"ORTH": {"IN": ["/", "-"]}, "SPACY": false},
        {"TEXT": {"REGEX": NUMERIC_MONTH}}
    ]));
    for orth in ["/", "-", "."] {
        patterns.push(json!([digit, sep(orth), {"LOWER": {"IN": months}}, sep(orth), optional_year]));
    }
    patterns.push(json!([
        {"LOWER": {"IN": months}}, month_sep,
        {"TEXT": {"REGEX": NUMERIC_MONTH}}, {"TEXT": {"REGEX": ORDINAL}}, optional_year
    ]));
    patterns.push(json!([{"LOWER": {"IN": months}}, month_sep, {"TEXT": {"REGEX": YEAR}}]));
    patterns.push(json!([
        {"LOWER": {"IN": months}}, month_sep, {"TEXT": {"REGEX": NUMERIC_MONTH}}, optional_year
    ]));
    patterns
}

fn with_prefix(prefix: Value, patterns: &[Value]) -> Value {
    patterns
        .iter()
        .filter_map(Value::as_array)
        .map(|specs| {
            let mut prefixed = vec![prefix.clone()];
            prefixed.extend(specs.iter().cloned());
            Value::Array(prefixed)
        })
        .collect()
}

fn at_sentence_start(patterns: &[Value]) -> Value {
    patterns
        .iter()
        .cloned()
        .map(|mut pattern| {
            if let Some(first) = pattern.get_mut(0).and_then(Value::as_object_mut) {
                first.insert("IS_SENT_START".to_string(), Value::Bool(true));
            }
            pattern
        })
        .collect()
}

/// The normalisers' building blocks by name, for configuration files that
/// reuse them through `${name}` placeholders.
pub fn pattern_constants() -> Vec<(&'static str, Value)> {
    vec![
        ("year_regex", json!(YEAR)),
        ("numeric_month_regex", json!(NUMERIC_MONTH)),
        ("day_regex", json!(DAY)),
        ("ordinal", json!(ORDINAL)),
        ("unit_regex", json!(UNITS)),
        ("months", json!(MONTHS)),
        ("times", json!(TIMES)),
        ("date_patterns", Value::Array(date_patterns())),
    ]
}

/// The result of normalising one span.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalised {
    pub norm: String,
    pub attrs: Vec<(&'static str, ExtValue)>,
}

impl Normalised {
    fn new(norm: impl Into<String>) -> Self {
        Self {
            norm: norm.into(),
            attrs: Vec::new(),
        }
    }

    fn with(mut self, attr: &'static str, value: ExtValue) -> Self {
        self.attrs.push((attr, value));
        self
    }
}

#[derive(Debug, Clone)]
struct CompiledKind {
    kind: NormalizerKind,
    /// Matches whose first token is context only and not part of the span.
    prefixed: Option<PatternMatcher>,
    matcher: PatternMatcher,
}

impl CompiledKind {
    fn compile(kind: NormalizerKind) -> Result<Self, PatternError> {
        let patterns = kind.patterns();
        if kind != NormalizerKind::Date {
            return Ok(Self {
                kind,
                prefixed: None,
                matcher: PatternMatcher::from_json(kind.flag(), &patterns)?,
            });
        }

        let patterns = patterns.as_array().cloned().unwrap_or_default();
        let mut prefixed = PatternMatcher::from_json(kind.flag(), &with_prefix(json!({"SPACY": true}), &patterns))?;
        prefixed.add_json(
            kind.flag(),
            &with_prefix(json!({"TEXT": {"IN": ["\n", "\n\n", "-"]}}), &patterns),
        )?;
        Ok(Self {
            kind,
            prefixed: Some(prefixed),
            matcher: PatternMatcher::from_json(kind.flag(), &at_sentence_start(&patterns))?,
        })
    }

    fn spans(&self, doc: &LLDoc) -> Vec<SpanRef> {
        let mut spans: Vec<SpanRef> = self.matcher.find_all(doc).iter().map(|m| m.span()).collect();
        if let Some(prefixed) = &self.prefixed {
            spans.extend(
                prefixed
                    .find_all(doc)
                    .iter()
                    .map(|m| SpanRef::new(m.start + 1, m.end)),
            );
        }
        filter_spans(spans)
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let flag = self.kind.flag();
        let specs: Vec<MergeSpec> = self
            .spans(doc)
            .into_iter()
            .filter_map(|span| {
                let normalised = self.kind.compute(doc, span)?;
                let mut spec = MergeSpec::new(span)
                    .with_norm(normalised.norm)
                    .with_ext(KIND, ExtValue::from(flag))
                    .with_ext(flag, ExtValue::Bool(true));
                for (attr, value) in normalised.attrs {
                    spec = spec.with_ext(attr, value);
                }
                Some(spec)
            })
            .collect();

        tracing::debug!(normalizer = flag, merged = specs.len(), "normalised spans");
        doc.merge_spans(specs)?;
        Ok(())
    }
}

fn all_kinds() -> Vec<NormalizerKind> {
    NormalizerKind::ALL.to_vec()
}

/// Declarative form of a [`Normalizer`]; every kind runs when none are listed.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default = "all_kinds")]
    pub kinds: Vec<NormalizerKind>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { kinds: all_kinds() }
    }
}

/// Runs the selected normalisers in order; each one merges before the next
/// one matches.
#[derive(Debug, Clone)]
pub struct Normalizer {
    name: String,
    kinds: Vec<CompiledKind>,
}

impl Normalizer {
    pub fn new(name: impl Into<String>, kinds: &[NormalizerKind]) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.into(),
            kinds: kinds.iter().copied().map(CompiledKind::compile).collect::<Result<_, _>>()?,
        })
    }

    pub fn from_config(name: &str, config: &NormalizerConfig) -> Result<Self, PatternError> {
        Self::new(name, &config.kinds)
    }

    pub fn kinds(&self) -> Vec<NormalizerKind> {
        self.kinds.iter().map(|k| k.kind).collect()
    }
}

impl Component for Normalizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> Vec<ExtensionDecl> {
        let mut decls = vec![
            ExtensionDecl::new(KIND, ExtKind::Str, ExtValue::Null),
            ExtensionDecl::value(VALUE, ExtValue::Null),
            ExtensionDecl::value(UNIT, ExtValue::Null),
            ExtensionDecl::value(BASE, ExtValue::Null),
            ExtensionDecl::value(EXP, ExtValue::Null),
        ];
        decls.extend(self.kinds.iter().map(|k| ExtensionDecl::flag(k.kind.flag())));
        decls
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        for kind in &self.kinds {
            kind.apply(doc)?;
        }
        Ok(())
    }
}
