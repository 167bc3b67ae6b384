//! Span conflict resolution.
//!
//! Turning raw, possibly overlapping matches into an accepted set happens in
//! two stages: the widest-match filter followed by the exclusion filter.
//! A third stage, [`filter_spans`], is used right before ranges are merged
//! into the token stream, where overlaps cannot be tolerated.

use crate::{Match, SpanRef};

/// Widest-match check for `candidate` against its sibling matches.
///
/// The candidate loses when another match is strictly wider and one of the
/// candidate's boundaries falls strictly inside it. Equal-width overlaps keep
/// both sides.
pub fn is_widest(candidate: SpanRef, siblings: &[Match]) -> bool {
    let (start, end) = (candidate.start, candidate.end);
    !siblings.iter().any(|other| {
        let (s, e) = (other.start, other.end);
        let straddles = (s < start && start < e) || (s < end && end < e);
        straddles && e - s > end - start
    })
}

/// Stage A: keep every match that no wider sibling straddles.
pub fn widest_matches(matches: &[Match]) -> Vec<Match> {
    matches
        .iter()
        .filter(|m| is_widest(m.span(), matches))
        .copied()
        .collect()
}

/// Stage B check: an exclusion removes a candidate only by containing it or
/// lying inside it. Partial overlap does not exclude.
pub fn is_excluded(candidate: SpanRef, exclusions: &[Match]) -> bool {
    exclusions
        .iter()
        .any(|ex| candidate.is_within_either(&ex.span()))
}

/// Stages A and B.
///
/// The widest-match filter runs against the full match list, so a match
/// dropped by an exclusion still shadows narrower matches it straddles.
pub fn resolve_conflicts(matches: &[Match], exclusions: &[Match]) -> Vec<Match> {
    let accepted: Vec<Match> = matches
        .iter()
        .filter(|m| is_widest(m.span(), matches) && !is_excluded(m.span(), exclusions))
        .copied()
        .collect();

    tracing::trace!(
        raw = matches.len(),
        exclusions = exclusions.len(),
        accepted = accepted.len(),
        "resolved span conflicts"
    );
    accepted
}

/// Stage C: a non-overlapping subset, longest first, ties to the earliest
/// start, returned in document order.
pub fn filter_spans(spans: impl IntoIterator<Item = SpanRef>) -> Vec<SpanRef> {
    filter_by_span(spans.into_iter().collect(), |span| *span)
}

/// [`filter_spans`] for matches.
pub fn filter_matches(matches: &[Match]) -> Vec<Match> {
    filter_by_span(matches.to_vec(), Match::span)
}

fn filter_by_span<T>(mut items: Vec<T>, span_of: impl Fn(&T) -> SpanRef) -> Vec<T> {
    items.sort_by(|a, b| {
        let (a, b) = (span_of(a), span_of(b));
        b.len().cmp(&a.len()).then(a.start.cmp(&b.start))
    });

    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let span = span_of(&item);
        if span.is_empty() {
            continue;
        }
        if kept.iter().all(|k| !span_of(k).overlaps(&span)) {
            kept.push(item);
        }
    }
    kept.sort_by_key(|item| span_of(item).start);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(start: usize, end: usize) -> Match {
        Match::new(0, start, end)
    }

    fn ranges(matches: &[Match]) -> Vec<(usize, usize)> {
        matches.iter().map(|m| (m.start, m.end)).collect()
    }

    #[test]
    fn wider_straddling_match_wins() {
        let matches = [m(0, 3), m(1, 2)];
        assert_eq!(ranges(&widest_matches(&matches)), vec![(0, 3)]);
    }

    #[test]
    fn equal_width_overlaps_both_survive() {
        let matches = [m(0, 3), m(2, 5)];
        assert_eq!(ranges(&widest_matches(&matches)), vec![(0, 3), (2, 5)]);
    }

    #[test]
    fn prefixes_lose_and_neighbours_survive() {
        let matches = [m(0, 4), m(0, 2), m(4, 5)];
        assert_eq!(ranges(&widest_matches(&matches)), vec![(0, 4), (4, 5)]);
    }

    #[test]
    fn exclusion_requires_full_containment() {
        let candidate = m(2, 5);

        // Inside the candidate, containing it, or equal: excluded
        assert!(is_excluded(candidate.span(), &[m(3, 4)]));
        assert!(is_excluded(candidate.span(), &[m(1, 6)]));
        assert!(is_excluded(candidate.span(), &[m(2, 5)]));

        // Partial overlap on either side: kept
        assert!(!is_excluded(candidate.span(), &[m(4, 7)]));
        assert!(!is_excluded(candidate.span(), &[m(0, 3)]));
        assert!(!is_excluded(candidate.span(), &[]));
    }

    #[test]
    fn karnofsky_exclusion_drops_the_performance_status_match() {
        // karnofsky performance status : 1
        let matches = [m(1, 5)];
        let exclusions = [m(0, 5)];
        assert!(resolve_conflicts(&matches, &exclusions).is_empty());
        assert_eq!(ranges(&resolve_conflicts(&matches, &[])), vec![(1, 5)]);
    }

    #[test]
    fn filter_spans_prefers_longest_then_earliest() {
        let spans = [
            SpanRef::new(0, 3),
            SpanRef::new(2, 5),
            SpanRef::new(4, 6),
            SpanRef::new(6, 10),
        ];
        assert_eq!(
            filter_spans(spans),
            vec![SpanRef::new(0, 3), SpanRef::new(4, 6), SpanRef::new(6, 10)]
        );
    }
}
