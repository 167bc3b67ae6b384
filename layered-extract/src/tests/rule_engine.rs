use layered_clinical::{ExtValue, LLDocDisplay, PatternError, Pipeline, SpanRef};
use serde_json::{json, Value};

use crate::{GroupValue, RuleEngine, RuleEngineConfig};

fn vitals_config(merge_ents: bool) -> Value {
    json!({
        "token_label": "vital",
        "value_label": "vital_value",
        "entity_label": "VITAL",
        "merge_ents": merge_ents,
        "groups": [
            {
                "label": "WEIGHT",
                "token_patterns": [[
                    {"LOWER": {"IN": ["wt", "weight"]}},
                    {"IS_PUNCT": true, "OP": "?"},
                    {"LIKE_NUM": true},
                    {"LOWER": {"IN": ["kg", "kgs"]}}
                ]],
                "value_patterns": [[{"LIKE_NUM": true}]]
            },
            {
                "label": "ECOG",
                "token_patterns": [[{"LOWER": "ecog"}, {"LIKE_NUM": true}]],
                "value_patterns": [[{"LIKE_NUM": true}]],
                "entity_label": "ECOG_STATUS"
            },
            {
                "label": "FEEDING",
                "token_patterns": [[{"LOWER": "peg"}]],
                "value": true
            }
        ]
    })
}

fn engine(config: Value) -> RuleEngine {
    let config: RuleEngineConfig = serde_json::from_value(config).unwrap();
    RuleEngine::from_config("vitals", &config).unwrap()
}

#[test]
fn groups_share_one_span_group() {
    let pipeline = Pipeline::builder().add(engine(vitals_config(false))).build().unwrap();
    let doc = pipeline.process("Wt 70 kg, ECOG 1, PEG in situ").unwrap();

    insta::assert_snapshot!(LLDocDisplay::new(&doc).with_span_group("vitals"), @r###"
    Wt  70  kg  ,  ECOG  1  ,  PEG  in  situ
    ╰────────╯vitals:WEIGHT=70
                   ╰─────╯vitals:ECOG=1
                               ╰─╯vitals:FEEDING=true
    "###);

    let labels: Vec<(&str, Option<&ExtValue>)> = doc
        .entities()
        .iter()
        .map(|e| (e.label.as_str(), e.value.as_ref()))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("VITAL", Some(&ExtValue::Int(70))),
            ("ECOG_STATUS", Some(&ExtValue::Int(1))),
            ("VITAL", Some(&ExtValue::Bool(true))),
        ]
    );
    assert_eq!(doc.ext(1, "vital").unwrap(), &ExtValue::Bool(true));
    assert_eq!(doc.ext(2, "vital_value").unwrap(), &ExtValue::Int(70));
    assert_eq!(doc.ext(3, "vital").unwrap(), &ExtValue::Bool(false));
    assert_eq!(doc.ext(3, "vital_value").unwrap(), &ExtValue::Null);
}

#[test]
fn merging_remaps_the_span_group() {
    let mut config = vitals_config(true);
    config["groups"][0]["norm_patterns"] = json!([[{"LIKE_NUM": true}], [{"LOWER": "kg"}]]);
    let pipeline = Pipeline::builder().add(engine(config)).build().unwrap();
    let doc = pipeline.process("Wt 70 kg, ECOG 1").unwrap();

    insta::assert_snapshot!(LLDocDisplay::new(&doc).with_span_group("vitals"), @r###"
    Wt 70 kg  ,  ECOG 1
    ╰──────╯vitals:WEIGHT=70
                 ╰────╯vitals:ECOG=1
    "###);
    assert_eq!(doc.tokens()[0].norm(), "70kg");
    assert_eq!(doc.tokens()[2].norm(), "ecog 1");
    assert_eq!(doc.ext(2, "vital_value").unwrap(), &ExtValue::Int(1));
    assert_eq!(doc.entities()[1].span, SpanRef::new(2, 3));
}

#[test]
fn pooled_groups_compete_for_overlapping_text() {
    let config = json!({
        "groups": [
            {"label": "ECOG", "token_patterns": [[{"LOWER": "ecog"}, {"LIKE_NUM": true}]]},
            {"label": "NUMBER", "token_patterns": [[{"LIKE_NUM": true}]]}
        ]
    });
    let pipeline = Pipeline::builder().add(engine(config)).build().unwrap();
    let doc = pipeline.process("ECOG 1 and 3").unwrap();

    let spans: Vec<(Option<&str>, SpanRef)> = doc
        .span_group("vitals")
        .iter()
        .map(|s| (s.label.as_deref(), s.span))
        .collect();
    assert_eq!(
        spans,
        vec![
            (Some("ECOG"), SpanRef::new(0, 2)),
            (Some("NUMBER"), SpanRef::new(3, 4)),
        ]
    );
}

#[test]
fn exclusions_only_apply_to_their_group() {
    let config = json!({
        "groups": [
            {"label": "ECOG", "token_patterns": [[{"LOWER": "ecog"}, {"LIKE_NUM": true}]]},
            {
                "label": "BP",
                "token_patterns": [[{"LOWER": "bp"}, {"LIKE_NUM": true}]],
                "exclusions": [[{"LOWER": "ecog"}, {"LIKE_NUM": true}]]
            }
        ]
    });
    let pipeline = Pipeline::builder().add(engine(config)).build().unwrap();
    let doc = pipeline.process("ECOG 1 BP 120").unwrap();

    assert_eq!(doc.span_group("vitals").len(), 2);
}

#[test]
fn single_group_shorthand() {
    let config: RuleEngineConfig = serde_json::from_value(json!({
        "token_label": "weight",
        "value_label": "weight_value",
        "token_patterns": [[{"LOWER": "wt"}, {"LIKE_NUM": true}]],
        "value_patterns": [[{"LIKE_NUM": true}]]
    }))
    .unwrap();
    let engine = RuleEngine::from_config("weights", &config).unwrap();

    assert_eq!(engine.groups().len(), 1);
    assert_eq!(engine.groups()[0].label(), "weight");
    assert!(matches!(engine.groups()[0].value_source(), GroupValue::Patterns));

    let pipeline = Pipeline::builder().add(engine).build().unwrap();
    let doc = pipeline.process("wt 68").unwrap();
    assert_eq!(doc.span_group("weights")[0].value, Some(ExtValue::Int(68)));
    assert!(doc.entities().is_empty());
}

#[test]
fn engines_need_patterns() {
    let err = RuleEngine::from_config("empty", &RuleEngineConfig::default()).unwrap_err();
    assert!(matches!(err, PatternError::Malformed(_)));
}

#[test]
fn groups_without_a_value_match_carry_no_value() {
    let config = json!({
        "value_label": "ecog_value",
        "entity_label": "ECOG_STATUS",
        "groups": [{
            "label": "ECOG",
            "token_patterns": [[{"LOWER": "ecog"}, {"LOWER": {"IN": ["normal", "good"]}}]],
            "value_patterns": [[{"LIKE_NUM": true}]]
        }]
    });
    let pipeline = Pipeline::builder().add(engine(config)).build().unwrap();
    let doc = pipeline.process("ECOG normal").unwrap();

    assert_eq!(doc.span_group("vitals")[0].value, None);
    assert_eq!(doc.entities()[0].value, None);
    assert_eq!(doc.ext(0, "ecog_value").unwrap(), &ExtValue::Null);
}
