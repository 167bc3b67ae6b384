#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Document model and shared machinery for rule-based clinical extraction.
//!
//! An [`LLDoc`] is a token sequence with per-token extension slots, an
//! entity list, named span groups, span attributes and a resolved section
//! list. Components (see the `layered-extract`, `layered-context` and
//! `layered-sections` crates) annotate it in place, and a [`Pipeline`] runs
//! them in order over a shared, pre-declared [`ExtensionSchema`].
//!
//! ## Usage
//!
//! ```ignore
//! use layered_clinical::{LLDocDisplay, Pipeline};
//! use layered_extract::ValueExtractor;
//!
//! let pipeline = Pipeline::builder().add(ecog_extractor).build()?;
//! let doc = pipeline.process("ECOG performance status 2")?;
//!
//! println!("{}", LLDocDisplay::new(&doc).with_entities());
//! ```
//!
//! ## Building blocks
//!
//! - [`PatternMatcher`]: declarative token patterns behind the [`Matcher`] trait
//! - [`conflict`]: widest-match, exclusion and merge-time span filters
//! - [`LLDoc::merge_spans`]: collapse ranges into single tokens, returning an [`IndexRemap`]
//! - [`parse_day_first`]: date parsing for section titles

mod component;
pub mod conflict;
mod date;
mod errors;
mod ll_doc;
mod matcher;
mod tokenize;

pub use component::{Component, Pipeline, PipelineBuilder};
pub use date::parse_day_first;
pub use errors::{DocError, PatternError};
pub use ll_doc::{
    DocSummary, Entity, EntitySummary, ExtKind, ExtValue, ExtensionDecl, ExtensionSchema,
    ExtensionSchemaBuilder, IndexRemap, LLDoc, LLDocDisplay, LLToken, LabeledSpan, MergeSpec,
    RawToken, Section, SpanAttrSummary, SpanRef, TokenFlags,
};
pub use matcher::{
    CompareOp, Match, Matcher, PatternMatcher, Predicate, Quantifier, TokenAttr, TokenPattern,
    TokenSpec, ValueTest,
};
pub use tokenize::{create_doc_from_string, create_doc_with_schema, tokenize};

// Re-exported for downstream crates that build sections and match lists.
pub use chrono::NaiveDate;
