//! Parent assignment, top-level cascade and date resolution over an
//! in-order list of section headers.
//!
//! Sections live in one flat list and point at their parent by index, so
//! every walk below is a loop over that list.

use layered_clinical::{parse_day_first, LLDoc, NaiveDate, Section, SpanRef};

use crate::rules::RuleIndex;
use crate::DATE_CATEGORY;

/// A matched section header, before parents are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SectionHeader {
    pub category: String,
    pub title: SpanRef,
    /// Set by the matched rule, not the category.
    pub top_level: bool,
}

impl SectionHeader {
    pub fn new(category: impl Into<String>, title: SpanRef, top_level: bool) -> Self {
        Self {
            category: category.into(),
            title,
            top_level,
        }
    }
}

/// A header kept by [`resolve_parents`], with its parent's index in the kept list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParentedHeader {
    pub header: SectionHeader,
    pub parent: Option<usize>,
}

/// Assign each header the closest earlier section of an allowed parent category.
///
/// The search starts at the previous kept section and walks back only while
/// the walk stays on the same branch: the next earlier section must be the
/// current candidate's parent or a sibling sharing its parent. When a
/// category allows several parents, the last one found wins. A header whose
/// parent is required but not found is dropped.
pub(crate) fn resolve_parents(headers: Vec<SectionHeader>, rules: &RuleIndex) -> Vec<ParentedHeader> {
    let mut kept: Vec<ParentedHeader> = Vec::with_capacity(headers.len());
    for header in headers {
        let required = rules.parent_required(&header.category);
        let parents = rules.parents(&header.category);

        if kept.is_empty() && required {
            tracing::warn!(
                category = %header.category,
                title = %header.title,
                "dropping section without its required parent"
            );
            continue;
        }
        if kept.is_empty() || parents.is_empty() {
            kept.push(ParentedHeader { header, parent: None });
            continue;
        }

        let mut identified = None;
        for parent in parents {
            if let Some(idx) = find_parent(&kept, parent) {
                identified = Some(idx);
            }
        }

        if identified.is_some() || !required {
            kept.push(ParentedHeader {
                header,
                parent: identified,
            });
        } else {
            tracing::warn!(
                category = %header.category,
                title = %header.title,
                "dropping section without its required parent"
            );
        }
    }
    kept
}

fn find_parent(kept: &[ParentedHeader], wanted: &str) -> Option<usize> {
    let category_of = |idx: Option<usize>| idx.map(|idx| kept[idx].header.category.as_str());

    let mut idx = kept.len().checked_sub(1)?;
    let mut candidate = kept[idx].header.category.as_str();
    let mut candidate_parent = category_of(kept[idx].parent);
    loop {
        if candidate == wanted {
            return Some(idx);
        }
        if idx == 0 || candidate_parent.is_none() {
            return None;
        }
        let previous = &kept[idx - 1];
        let previous_parent = category_of(previous.parent);
        if Some(previous.header.category.as_str()) == candidate_parent || previous_parent == candidate_parent {
            candidate = previous.header.category.as_str();
            candidate_parent = previous_parent;
            idx -= 1;
        } else {
            return None;
        }
    }
}

/// Every section following a top-level section, up to the next top-level
/// section, becomes its child. Top-level sections themselves have no parent.
pub(crate) fn cascade_top_level(headers: &mut [ParentedHeader]) {
    let mut current: Option<usize> = None;
    for (idx, parented) in headers.iter_mut().enumerate() {
        if parented.header.top_level {
            parented.parent = None;
            current = Some(idx);
        } else if current.is_some() {
            parented.parent = current;
        }
    }
}

/// Lay the kept headers out as sections over `doc`.
///
/// Each body runs to the next section's start. When the first header does
/// not start the document, an uncategorised preamble section covers the
/// tokens before it and every parent index shifts by one.
pub(crate) fn to_sections(doc: &LLDoc, headers: Vec<ParentedHeader>) -> Vec<Section> {
    let first_start = match headers.first() {
        Some(first) => first.header.title.start,
        None => return Vec::new(),
    };
    let offset = usize::from(first_start > 0);

    let mut sections = Vec::with_capacity(headers.len() + offset);
    if offset == 1 {
        sections.push(Section::new(None, SpanRef::new(0, 0), first_start));
    }
    let starts: Vec<usize> = headers.iter().map(|h| h.header.title.start).collect();
    for (idx, parented) in headers.into_iter().enumerate() {
        let body_end = starts.get(idx + 1).copied().unwrap_or_else(|| doc.len());
        let ParentedHeader { header, parent } = parented;
        let mut section = Section::new(Some(header.category), header.title, body_end);
        section.parent = parent.map(|parent| parent + offset);
        section.top_level = header.top_level;
        sections.push(section);
    }
    sections
}

/// Date every section: sections of the date category parse their own title,
/// the others take their parent's parsed date.
///
/// Inheritance is one level deep: a section under an undated section is
/// undated even when a grandparent has a date.
pub(crate) fn assign_dates(doc: &LLDoc, sections: &mut [Section]) {
    let own_dates: Vec<Option<NaiveDate>> = sections
        .iter()
        .map(|section| match section.category() {
            Some(DATE_CATEGORY) => {
                let title = doc.text_of(section.title);
                let date = parse_day_first(&title);
                if date.is_none() {
                    tracing::warn!(title = %title.trim(), span = %section.title, "unparsable section date");
                }
                date
            }
            _ => None,
        })
        .collect();

    for (idx, section) in sections.iter_mut().enumerate() {
        section.date = match section.category() {
            Some(DATE_CATEGORY) => own_dates[idx],
            _ => section.parent.and_then(|parent| own_dates.get(parent).copied().flatten()),
        };
    }
}
