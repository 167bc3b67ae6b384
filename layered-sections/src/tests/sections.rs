use std::collections::BTreeMap;

use layered_clinical::{
    create_doc_from_string, Entity, ExtValue, LLDoc, LLDocDisplay, NaiveDate, Pipeline, Section, SpanRef,
};
use layered_extract::{Normalizer, NormalizerConfig};

use crate::hierarchy::{assign_dates, cascade_top_level, resolve_parents, to_sections, SectionHeader};
use crate::rules::RuleIndex;
use crate::{SectionRule, Sectionizer, SectionizerConfig, DATE_CATEGORY, SECTION_DATE};

fn rules() -> Vec<SectionRule> {
    vec![
        SectionRule::new("plan", "plan"),
        SectionRule::new("medication", "medications").with_parents(["plan"], true),
    ]
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn outline(sections: &[Section]) -> Vec<(Option<&str>, SpanRef, Option<usize>)> {
    sections
        .iter()
        .map(|s| (s.category(), s.title, s.parent))
        .collect()
}

#[test]
fn headers_nest_under_their_parents() {
    let sectionizer = Sectionizer::new("sections", rules()).unwrap();
    let doc = create_doc_from_string("Plan: review\nMedications: aspirin")
        .run(&sectionizer)
        .unwrap();

    insta::assert_snapshot!(LLDocDisplay::new(&doc).with_sections(), @r###"
    Plan  :  review  _  Medications  :  aspirin
    ╰─────╯§plan
                        ╰────────────╯§medication
    "###);

    let sections = doc.sections();
    assert_eq!(sections[1].parent, Some(0));
    assert_eq!(sections[0].body(), SpanRef::new(2, 4));
    assert_eq!(sections[1].span(), SpanRef::new(4, 7));
}

#[test]
fn orphans_with_a_required_parent_are_dropped() {
    let sectionizer = Sectionizer::new("sections", rules()).unwrap();
    let doc = create_doc_from_string("Medications: aspirin")
        .run(&sectionizer)
        .unwrap();

    assert!(doc.sections().is_empty());
}

#[test]
fn headers_must_start_a_sentence() {
    let sectionizer = Sectionizer::new("sections", rules()).unwrap();
    let doc = create_doc_from_string("We discussed the plan today")
        .run(&sectionizer)
        .unwrap();

    assert!(doc.sections().is_empty());
}

#[test]
fn text_before_the_first_header_is_a_preamble() {
    let sectionizer = Sectionizer::new("sections", rules()).unwrap();
    // Dear(0) Dr(1) \n(2) Plan(3) :(4) review(5) \n(6) Medications(7) :(8) none(9)
    let doc = create_doc_from_string("Dear Dr\nPlan: review\nMedications: none")
        .run(&sectionizer)
        .unwrap();

    assert_eq!(
        outline(doc.sections()),
        vec![
            (None, SpanRef::new(0, 0), None),
            (Some("plan"), SpanRef::new(3, 5), None),
            (Some("medication"), SpanRef::new(7, 9), Some(1)),
        ]
    );
    assert_eq!(doc.sections()[0].span(), SpanRef::new(0, 3));
}

#[test]
fn top_level_sections_cascade_their_date() {
    // 3(0) Apr(1) 2021(2) a..g(3..10) Plan(10) :(11) h..o(12..20) 5(20) May(21) 2021(22) p(23) q(24)
    let doc = create_doc_from_string("3 Apr 2021 a b c d e f g Plan : h i j k l m n o 5 May 2021 p q");
    let headers = vec![
        SectionHeader::new(DATE_CATEGORY, SpanRef::new(0, 3), true),
        SectionHeader::new("plan", SpanRef::new(10, 12), false),
        SectionHeader::new(DATE_CATEGORY, SpanRef::new(20, 23), true),
    ];

    let mut kept = resolve_parents(headers, &RuleIndex::new(&rules()));
    cascade_top_level(&mut kept);
    let mut sections = to_sections(&doc, kept);
    assign_dates(&doc, &mut sections);

    assert_eq!(sections[1].parent, Some(0));
    assert_eq!(sections[1].date, date(2021, 4, 3));
    assert_eq!(sections[1].body_end, 20);
    assert_eq!(sections[2].parent, None);
    assert_eq!(sections[2].date, date(2021, 5, 5));
}

#[test]
fn unparsable_date_titles_leave_the_date_unset() {
    let doc = create_doc_from_string("Date pending\nPlan : review");
    let headers = vec![
        SectionHeader::new(DATE_CATEGORY, SpanRef::new(0, 2), true),
        SectionHeader::new("plan", SpanRef::new(3, 5), false),
    ];

    let mut kept = resolve_parents(headers, &RuleIndex::default());
    cascade_top_level(&mut kept);
    let mut sections = to_sections(&doc, kept);
    assign_dates(&doc, &mut sections);

    assert_eq!(sections[0].date, None);
    assert_eq!(sections[1].parent, Some(0));
    assert_eq!(sections[1].date, None);
}

fn normalise(text: &str) -> LLDoc {
    let normalizer = Normalizer::from_config("normalizer", &NormalizerConfig::default()).unwrap();
    let pipeline = Pipeline::builder().add(normalizer).build().unwrap();
    pipeline.process(text).unwrap()
}

#[test]
fn dated_sections_from_normalised_dates() {
    let config = SectionizerConfig {
        rules: rules(),
        span_attrs: BTreeMap::from([(
            "medication".to_string(),
            BTreeMap::from([("is_medication".to_string(), ExtValue::Bool(true))]),
        )]),
    };
    let sectionizer = Sectionizer::dated_from_config("sections", &config).unwrap();

    // Letter(0) \n(1) 12/03/2021(2) 5 pm(3) \n(4) Plan(5) :(6) review(7) \n(8)
    // Medications(9) :(10) aspirin(11) \n(12) 14/03/2021(13) \n(14) Plan(15) :(16) stop(17)
    let mut doc = normalise("Letter\n12/03/2021 5 pm\nPlan: review\nMedications: aspirin\n14/03/2021\nPlan: stop");
    doc.add_entity(Entity::new("DRUG", SpanRef::new(11, 12))).unwrap();
    let doc = doc.run(&sectionizer).unwrap();

    assert_eq!(
        outline(doc.sections()),
        vec![
            (None, SpanRef::new(0, 0), None),
            (Some(DATE_CATEGORY), SpanRef::new(2, 4), None),
            (Some("plan"), SpanRef::new(5, 7), Some(1)),
            (Some("medication"), SpanRef::new(9, 11), Some(1)),
            (Some(DATE_CATEGORY), SpanRef::new(13, 14), Some(1)),
            (Some("plan"), SpanRef::new(15, 17), Some(1)),
        ]
    );
    let dates: Vec<_> = doc.sections().iter().map(|s| s.date).collect();
    assert_eq!(
        dates,
        vec![
            None,
            date(2021, 3, 12),
            date(2021, 3, 12),
            date(2021, 3, 12),
            date(2021, 3, 14),
            date(2021, 3, 12),
        ]
    );
    assert!(doc.sections()[1].top_level);
    assert!(!doc.sections()[4].top_level);

    let drug = SpanRef::new(11, 12);
    assert_eq!(doc.span_attr(drug, "is_medication"), Some(&ExtValue::Bool(true)));
    assert_eq!(doc.span_attr(drug, SECTION_DATE), Some(&ExtValue::from("2021-03-12")));
}

#[test]
fn dated_sectionizers_read_normalizer_flags() {
    let sectionizer = Sectionizer::dated("sections", rules()).unwrap();
    let err = Pipeline::builder().add(sectionizer).build().unwrap_err();
    assert!(err.to_string().contains("undeclared extension"));
}

#[test]
fn required_parents_are_checked_before_the_cascade() {
    let sectionizer = Sectionizer::dated("sections", rules()).unwrap();

    // 12/03/2021(0) 5 pm(1) \n(2) Medications(3) :(4) aspirin(5)
    let doc = normalise("12/03/2021 5 pm\nMedications: aspirin")
        .run(&sectionizer)
        .unwrap();

    assert_eq!(
        outline(doc.sections()),
        vec![(Some(DATE_CATEGORY), SpanRef::new(0, 2), None)]
    );
    assert_eq!(doc.sections()[0].span(), SpanRef::new(0, 6));
}
