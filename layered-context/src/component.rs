use std::collections::BTreeSet;

use layered_clinical::{Component, DocError, LLDoc, PatternError, SpanRef};
use serde::Deserialize;

use crate::{
    apply_context, ClosestModifierResolver, ContextConfig, ContextResolver, ContextRule,
    ContextRules, ModifierEdgeBuilder,
};

/// Declarative form of a [`ContextComponent`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextComponentConfig {
    #[serde(default)]
    pub context_rules: Vec<ContextRule>,
    #[serde(flatten)]
    pub context: ContextConfig,
    /// Only entities with these labels are qualified; all when absent.
    #[serde(default)]
    pub target_labels: Option<Vec<String>>,
}

/// Qualifies the document's entities with the attributes of their closest
/// modifier, e.g. `is_negated` for `no fever`.
///
/// Each pass builds the modifier graph for the current entities, resolves it
/// and writes the result as span attributes on the entity spans.
pub struct ContextComponent {
    name: String,
    config: ContextConfig,
    builder: ModifierEdgeBuilder,
    resolver: Box<dyn ContextResolver>,
    target_labels: Option<BTreeSet<String>>,
}

impl std::fmt::Debug for ContextComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextComponent")
            .field("name", &self.name)
            .field("rules", &self.builder.rules().len())
            .field("target_labels", &self.target_labels)
            .finish()
    }
}

impl ContextComponent {
    pub fn new(name: impl Into<String>, rules: ContextRules, config: ContextConfig) -> Result<Self, PatternError> {
        let resolver = ClosestModifierResolver::new(config.sentence_penalty);
        Ok(Self {
            name: name.into(),
            config,
            builder: ModifierEdgeBuilder::new(rules)?,
            resolver: Box::new(resolver),
            target_labels: None,
        })
    }

    pub fn from_config(name: &str, config: &ContextComponentConfig) -> Result<Self, PatternError> {
        let component = Self::new(
            name,
            ContextRules::new(config.context_rules.clone()),
            config.context.clone(),
        )?;
        Ok(match &config.target_labels {
            Some(labels) => component.with_target_labels(labels.iter().cloned()),
            None => component,
        })
    }

    pub fn with_target_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.target_labels = Some(labels.into_iter().collect());
        self
    }

    pub fn with_resolver(mut self, resolver: impl ContextResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Entity spans to qualify, deduplicated, in entity order.
    pub fn targets(&self, doc: &LLDoc) -> Vec<SpanRef> {
        let mut targets: Vec<SpanRef> = Vec::new();
        for entity in doc.entities() {
            let wanted = self
                .target_labels
                .as_ref()
                .map_or(true, |labels| labels.contains(&entity.label));
            if wanted && !targets.contains(&entity.span) {
                targets.push(entity.span);
            }
        }
        targets
    }
}

impl Component for ContextComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        let targets = self.targets(doc);
        if targets.is_empty() {
            return Ok(());
        }
        let graph = self.builder.build(doc, &targets);
        let resolved = self.resolver.resolve(doc, graph);
        tracing::debug!(
            component = %self.name,
            targets = targets.len(),
            qualified = resolved.edges.len(),
            "applied context"
        );
        apply_context(doc, &resolved, &self.config)
    }
}
