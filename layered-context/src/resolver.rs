//! Closest-modifier resolution and attribute application.

use layered_clinical::{DocError, ExtValue, LLDoc, SpanRef};

use crate::{ContextConfig, ContextGraph, ModifierEdge, DEFAULT_SENTENCE_PENALTY};

/// Distance of a modifier that starts inside its target; never selected.
pub const REJECT: usize = usize::MAX;

/// Token distance between a target and a modifier, plus `sentence_penalty`
/// when they start in different sentences.
///
/// A modifier starting at or before the target is measured from its end to
/// the target start, one starting at or after the target end from the target
/// end to its start. A modifier starting strictly inside the target is
/// [`REJECT`]ed.
pub fn modifier_distance(
    sentence_ids: &[usize],
    target: SpanRef,
    modifier: SpanRef,
    sentence_penalty: usize,
) -> usize {
    let token_distance = if modifier.start <= target.start {
        target.start.saturating_sub(modifier.end)
    } else if modifier.start >= target.end {
        modifier.start - target.end
    } else {
        return REJECT;
    };

    let same_sentence = sentence_ids.get(target.start) == sentence_ids.get(modifier.start);
    if same_sentence {
        token_distance
    } else {
        token_distance.saturating_add(sentence_penalty)
    }
}

/// Edges grouped by target, targets in first-seen order.
pub fn group_edges_by_target(edges: &[ModifierEdge]) -> Vec<(SpanRef, Vec<&ModifierEdge>)> {
    let mut grouped: Vec<(SpanRef, Vec<&ModifierEdge>)> = Vec::new();
    for edge in edges {
        match grouped.iter_mut().find(|(target, _)| *target == edge.target) {
            Some((_, candidates)) => candidates.push(edge),
            None => grouped.push((edge.target, vec![edge])),
        }
    }
    grouped
}

/// Rewrites a graph's edges into its resolved form.
pub trait ContextResolver: Send + Sync {
    fn resolve(&self, doc: &LLDoc, graph: ContextGraph) -> ContextGraph;
}

/// Keeps, per target, the single closest modifier. Ties go to the edge seen
/// first; a target whose modifiers are all rejected loses every edge.
#[derive(Debug, Clone)]
pub struct ClosestModifierResolver {
    sentence_penalty: usize,
}

impl Default for ClosestModifierResolver {
    fn default() -> Self {
        Self {
            sentence_penalty: DEFAULT_SENTENCE_PENALTY,
        }
    }
}

impl ClosestModifierResolver {
    pub fn new(sentence_penalty: usize) -> Self {
        Self { sentence_penalty }
    }

    pub fn sentence_penalty(&self) -> usize {
        self.sentence_penalty
    }

    fn closest<'e>(
        &self,
        sentence_ids: &[usize],
        target: SpanRef,
        candidates: &[&'e ModifierEdge],
    ) -> Option<&'e ModifierEdge> {
        let mut best: Option<(usize, &ModifierEdge)> = None;
        for &edge in candidates {
            let distance = modifier_distance(sentence_ids, target, edge.modifier, self.sentence_penalty);
            tracing::trace!(entity = %target, modifier = %edge.modifier, distance, "modifier distance");
            if distance == REJECT {
                continue;
            }
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, edge));
            }
        }
        best.map(|(_, edge)| edge)
    }
}

impl ContextResolver for ClosestModifierResolver {
    fn resolve(&self, doc: &LLDoc, graph: ContextGraph) -> ContextGraph {
        if graph.edges.is_empty() {
            return graph;
        }
        let sentence_ids = doc.sentence_ids();
        let resolved: Vec<ModifierEdge> = group_edges_by_target(&graph.edges)
            .into_iter()
            .filter_map(|(target, candidates)| self.closest(&sentence_ids, target, &candidates))
            .cloned()
            .collect();

        tracing::debug!(
            candidates = graph.edges.len(),
            resolved = resolved.len(),
            "resolved closest modifiers"
        );
        ContextGraph {
            edges: resolved,
            ..graph
        }
    }
}

/// Write the attributes of every edge's category onto its target.
///
/// Every attribute any category can set is first reset to `false` on the
/// target, so running twice leaves the same state as running once. Targets
/// without an edge are not touched.
pub fn apply_context(doc: &mut LLDoc, graph: &ContextGraph, config: &ContextConfig) -> Result<(), DocError> {
    let attribute_names = config.attribute_names();
    for edge in &graph.edges {
        for name in &attribute_names {
            doc.set_span_attr(edge.target, name, ExtValue::Bool(false))?;
        }
        if let Some(attrs) = config.attrs_for(&edge.category) {
            for (name, value) in attrs {
                doc.set_span_attr(edge.target, name, value.clone())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use layered_clinical::create_doc_from_string;

    use super::*;

    /// Sentence 0 covers tokens 0..8, sentence 1 the rest.
    fn sentence_ids() -> Vec<usize> {
        (0..20).map(|idx| usize::from(idx >= 8)).collect()
    }

    #[test]
    fn distance_before_the_target() {
        let ids = vec![0; 20];
        assert_eq!(modifier_distance(&ids, SpanRef::new(10, 12), SpanRef::new(5, 6), 50), 4);
    }

    #[test]
    fn distance_across_sentences_is_penalised() {
        assert_eq!(
            modifier_distance(&sentence_ids(), SpanRef::new(10, 12), SpanRef::new(5, 6), 50),
            54
        );
    }

    #[test]
    fn distance_after_the_target_and_adjacency() {
        let ids = vec![0; 20];
        assert_eq!(modifier_distance(&ids, SpanRef::new(10, 12), SpanRef::new(12, 13), 50), 0);
        assert_eq!(modifier_distance(&ids, SpanRef::new(10, 12), SpanRef::new(15, 16), 50), 3);
        assert_eq!(modifier_distance(&ids, SpanRef::new(10, 12), SpanRef::new(9, 10), 50), 0);
    }

    #[test]
    fn modifiers_inside_the_target_are_rejected() {
        let ids = vec![0; 20];
        assert_eq!(modifier_distance(&ids, SpanRef::new(10, 13), SpanRef::new(11, 12), 50), REJECT);
    }

    #[test]
    fn the_same_sentence_wins() {
        // a(0) b(1) c(2) .(3) d(4) e(5) f(6)
        let doc = create_doc_from_string("a b c. d e f");
        let target = SpanRef::new(5, 6);
        let graph = ContextGraph::from_edges(vec![
            ModifierEdge::new(target, SpanRef::new(1, 2), "FAMILY"),
            ModifierEdge::new(target, SpanRef::new(4, 5), "HISTORICAL"),
        ]);

        let resolved = ClosestModifierResolver::default().resolve(&doc, graph);
        assert_eq!(resolved.edges, vec![ModifierEdge::new(target, SpanRef::new(4, 5), "HISTORICAL")]);
    }

    #[test]
    fn ties_keep_the_first_edge() {
        let doc = create_doc_from_string("a b c d e");
        let target = SpanRef::new(2, 3);
        let graph = ContextGraph::from_edges(vec![
            ModifierEdge::new(target, SpanRef::new(4, 5), "FAMILY"),
            ModifierEdge::new(target, SpanRef::new(0, 1), "HISTORICAL"),
        ]);

        let resolved = ClosestModifierResolver::default().resolve(&doc, graph);
        assert_eq!(resolved.edges[0].category, "FAMILY");
    }
}
