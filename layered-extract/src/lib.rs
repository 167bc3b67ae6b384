#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Entity, value and normalisation extractors for layered-clinical.
//!
//! ## Components
//!
//! - [`LabelMatcher`] - Flags matched tokens, registers entities, optionally merges
//! - [`ValueExtractor`] - Adds a coerced value and a normalized form, always merges
//! - [`RuleEngine`] - Many named groups sharing one conflict-resolution pass
//! - [`Normalizer`] - Decimal, scientific notation, date, time and unit normalisers
//!
//! ## Example
//!
//! ```ignore
//! use layered_clinical::Pipeline;
//! use layered_extract::{ValueExtractor, ValueExtractorConfig};
//!
//! let config: ValueExtractorConfig = serde_json::from_value(json!({
//!     "token_label": "ecog_status",
//!     "value_label": "ecog_value",
//!     "entity_label": "ECOG_STATUS",
//!     "token_patterns": [[{"LOWER": "ecog"}, {"LIKE_NUM": true}]],
//!     "value_patterns": [[{"LIKE_NUM": true}]]
//! }))?;
//! let pipeline = Pipeline::builder()
//!     .add(ValueExtractor::from_config("ecog", &config)?)
//!     .build()?;
//! let doc = pipeline.process("ECOG 1")?;
//! ```

mod label_matcher;
mod normalizer;
mod rule_engine;
mod value;
mod value_extractor;

pub use label_matcher::{LabelMatcher, LabelMatcherConfig};
pub use normalizer::{
    pattern_constants, Normalised, Normalizer, NormalizerConfig, NormalizerKind, BASE, EXP, KIND,
    UNIT, VALUE,
};
pub use rule_engine::{GroupValue, RuleEngine, RuleEngineConfig, RuleGroup, RuleGroupConfig};
pub use value::{coerce_value_text, select_value, ValueCandidates, NO_VALUE};
pub use value_extractor::{SpanValuePatterns, ValueExtractor, ValueExtractorConfig};
