#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Context resolution for layered-clinical: negation, uncertainty,
//! historicity and the other qualifiers a phrase puts on a nearby entity.
//!
//! ## Pipeline
//!
//! 1. [`ModifierEdgeBuilder`] matches [`ContextRules`] and links every entity
//!    in a modifier's scope to that modifier.
//! 2. [`ClosestModifierResolver`] keeps the closest modifier per entity,
//!    penalising modifiers in another sentence.
//! 3. [`apply_context`] resets every known attribute on the entity span and
//!    sets the ones of the winning category (see [`ContextConfig`]).
//!
//! [`ContextComponent`] runs all three for the entities already in the document.
//!
//! ## Example
//!
//! ```ignore
//! use layered_context::{ContextComponent, ContextConfig, ContextRule, ContextRules, Direction};
//!
//! let context = ContextComponent::new(
//!     "context",
//!     ContextRules::new(vec![ContextRule::new("no", "NEGATED_EXISTENCE", Direction::Forward)]),
//!     ContextConfig::default(),
//! )?;
//! let doc = pipeline.process("no fever")?.run(&context)?;
//! ```

mod component;
mod config;
mod graph;
mod resolver;
mod rules;

pub use component::{ContextComponent, ContextComponentConfig};
pub use config::{ContextConfig, SpanAttrMap, DEFAULT_SENTENCE_PENALTY};
pub use graph::{ContextGraph, Modifier, ModifierEdge, ModifierEdgeBuilder};
pub use resolver::{
    apply_context, group_edges_by_target, modifier_distance, ClosestModifierResolver,
    ContextResolver, REJECT,
};
pub use rules::{ContextRule, ContextRules, Direction};
