//! The modifier graph: which modifier phrases may qualify which targets.

use layered_clinical::conflict::filter_matches;
use layered_clinical::{LLDoc, Matcher, PatternError, PatternMatcher, SpanRef};
use serde::Serialize;

use crate::{ContextRules, Direction};

/// A matched modifier phrase and the token ranges it may qualify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modifier {
    pub span: SpanRef,
    pub category: String,
    pub direction: Direction,
    /// At most two ranges: the one before the phrase and the one after it.
    pub scope: Vec<SpanRef>,
}

impl Modifier {
    pub fn in_scope(&self, target: SpanRef) -> bool {
        !target.overlaps(&self.span) && self.scope.iter().any(|part| part.overlaps(&target))
    }
}

/// A candidate link from a target span to a modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifierEdge {
    pub target: SpanRef,
    pub modifier: SpanRef,
    pub category: String,
}

impl ModifierEdge {
    pub fn new(target: SpanRef, modifier: SpanRef, category: impl Into<String>) -> Self {
        Self {
            target,
            modifier,
            category: category.into(),
        }
    }
}

/// Targets, modifiers and the edges between them for one document pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextGraph {
    pub targets: Vec<SpanRef>,
    pub modifiers: Vec<Modifier>,
    pub edges: Vec<ModifierEdge>,
}

impl ContextGraph {
    /// A graph made of edges produced elsewhere.
    pub fn from_edges(edges: Vec<ModifierEdge>) -> Self {
        let mut targets: Vec<SpanRef> = Vec::new();
        for edge in &edges {
            if !targets.contains(&edge.target) {
                targets.push(edge.target);
            }
        }
        Self {
            targets,
            modifiers: Vec::new(),
            edges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Matches context rules and links each modifier to the targets in its scope.
///
/// A modifier's scope is the rest of its sentence in the rule's direction,
/// cut at `max_scope` tokens and at the nearest terminating phrase.
/// Overlapping rule matches keep the longest, so a pseudo phrase such as
/// `no increase` hides the `no` inside it.
#[derive(Debug, Clone)]
pub struct ModifierEdgeBuilder {
    rules: ContextRules,
    matcher: PatternMatcher,
    /// Rule index for each matcher label id.
    rule_ids: Vec<usize>,
}

impl ModifierEdgeBuilder {
    pub fn new(rules: ContextRules) -> Result<Self, PatternError> {
        let mut matcher = PatternMatcher::new();
        let mut rule_ids = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.context_rules.iter().enumerate() {
            let label = format!("{}#{}", rule.category, idx);
            // labels are unique, so ids are assigned in rule order
            matcher.add_json(&label, &rule.patterns()?)?;
            rule_ids.push(idx);
        }
        Ok(Self {
            rules,
            matcher,
            rule_ids,
        })
    }

    pub fn rules(&self) -> &ContextRules {
        &self.rules
    }

    /// Matched modifiers in document order, scopes computed.
    pub fn modifiers(&self, doc: &LLDoc) -> Vec<Modifier> {
        let sentences = doc.sentences();
        let sentence_of = |idx: usize| {
            sentences
                .iter()
                .copied()
                .find(|s| s.contains_token(idx))
                .unwrap_or_else(|| doc.full_span())
        };

        let matches = filter_matches(&self.matcher.find_all(doc));
        let terminators: Vec<SpanRef> = matches
            .iter()
            .filter(|m| self.rule_for(m.pattern_id).map(|r| r.direction) == Some(Direction::Terminate))
            .map(|m| m.span())
            .collect();

        let mut modifiers = Vec::with_capacity(matches.len());
        for m in &matches {
            let rule = match self.rule_for(m.pattern_id) {
                Some(rule) => rule,
                None => continue,
            };
            let span = m.span();
            let sentence = sentence_of(span.start);
            let mut scope = Vec::new();

            if rule.direction.modifies_before() {
                let mut start = sentence.start;
                if let Some(max) = rule.max_scope {
                    start = start.max(span.start.saturating_sub(max));
                }
                if let Some(cut) = terminators
                    .iter()
                    .filter(|t| t.end <= span.start && t.end > start)
                    .map(|t| t.end)
                    .max()
                {
                    start = cut;
                }
                if start < span.start {
                    scope.push(SpanRef::new(start, span.start));
                }
            }
            if rule.direction.modifies_after() {
                let mut end = sentence.end;
                if let Some(max) = rule.max_scope {
                    end = end.min(span.end + max);
                }
                if let Some(cut) = terminators
                    .iter()
                    .filter(|t| t.start >= span.end && t.start < end)
                    .map(|t| t.start)
                    .min()
                {
                    end = cut;
                }
                if span.end < end {
                    scope.push(SpanRef::new(span.end, end));
                }
            }

            modifiers.push(Modifier {
                span,
                category: rule.category.clone(),
                direction: rule.direction,
                scope,
            });
        }
        modifiers
    }

    /// Link every target to every modifier whose scope reaches it.
    pub fn build(&self, doc: &LLDoc, targets: &[SpanRef]) -> ContextGraph {
        let modifiers = self.modifiers(doc);
        let mut edges = Vec::new();
        for &target in targets {
            for modifier in &modifiers {
                if modifier.in_scope(target) {
                    edges.push(ModifierEdge::new(target, modifier.span, modifier.category.as_str()));
                }
            }
        }
        tracing::debug!(
            targets = targets.len(),
            modifiers = modifiers.len(),
            edges = edges.len(),
            "built context graph"
        );
        ContextGraph {
            targets: targets.to_vec(),
            modifiers,
            edges,
        }
    }

    fn rule_for(&self, label_id: usize) -> Option<&crate::ContextRule> {
        self.rule_ids
            .get(label_id)
            .and_then(|&idx| self.rules.context_rules.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use layered_clinical::create_doc_from_string;

    use super::*;
    use crate::ContextRule;

    fn builder() -> ModifierEdgeBuilder {
        ModifierEdgeBuilder::new(ContextRules::new(vec![
            ContextRule::new("no", "NEGATED_EXISTENCE", Direction::Forward),
            ContextRule::new("no increase", "PSEUDO", Direction::Pseudo),
            ContextRule::new("ruled out", "NEGATED_EXISTENCE", Direction::Backward),
            ContextRule::new("but", "CONJ", Direction::Terminate),
            ContextRule::new("history of", "HISTORICAL", Direction::Forward).with_max_scope(2),
        ]))
        .unwrap()
    }

    #[test]
    fn forward_scope_stops_at_terminators() {
        // no(0) fever(1) but(2) cough(3)
        let doc = create_doc_from_string("no fever but cough");
        let graph = builder().build(&doc, &[SpanRef::new(1, 2), SpanRef::new(3, 4)]);

        assert_eq!(
            graph.edges,
            vec![ModifierEdge::new(SpanRef::new(1, 2), SpanRef::new(0, 1), "NEGATED_EXISTENCE")]
        );
    }

    #[test]
    fn backward_scope_stays_in_the_sentence() {
        // cough(0) .(1) PE(2) ruled(3) out(4)
        let doc = create_doc_from_string("cough. PE ruled out");
        let graph = builder().build(&doc, &[SpanRef::new(0, 1), SpanRef::new(2, 3)]);

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, SpanRef::new(2, 3));
    }

    #[test]
    fn pseudo_phrases_hide_shorter_modifiers() {
        let doc = create_doc_from_string("no increase in pain");
        let graph = builder().build(&doc, &[SpanRef::new(3, 4)]);

        assert_eq!(graph.modifiers.len(), 1);
        assert_eq!(graph.modifiers[0].direction, Direction::Pseudo);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn max_scope_limits_reach() {
        // history(0) of(1) a(2) b(3) stroke(4)
        let doc = create_doc_from_string("history of a b stroke");
        let graph = builder().build(&doc, &[SpanRef::new(3, 4), SpanRef::new(4, 5)]);

        assert_eq!(graph.modifiers[0].scope, vec![SpanRef::new(2, 4)]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, SpanRef::new(3, 4));
    }
}
