use layered_clinical::{ExtValue, LLDoc, Pipeline};
use serde_json::json;

use crate::{Normalizer, NormalizerConfig, NormalizerKind};

fn normalise(text: &str) -> LLDoc {
    let normalizer = Normalizer::from_config("normalizer", &NormalizerConfig::default()).unwrap();
    let pipeline = Pipeline::builder().add(normalizer).build().unwrap();
    pipeline.process(text).unwrap()
}

fn texts(doc: &LLDoc) -> Vec<&str> {
    doc.tokens().iter().map(|t| t.text()).collect()
}

#[test]
fn scientific_notation() {
    let doc = normalise("WCC 10^9 today");

    assert_eq!(texts(&doc), vec!["WCC", "10^9", "today"]);
    assert_eq!(doc.tokens()[1].norm(), "10.0^9");
    assert_eq!(doc.ext(1, "kind").unwrap(), &ExtValue::from("sci_not"));
    assert_eq!(doc.ext(1, "sci_not").unwrap(), &ExtValue::Bool(true));
    assert_eq!(doc.ext(1, "base").unwrap(), &ExtValue::Float(10.0));
    assert_eq!(doc.ext(1, "exp").unwrap(), &ExtValue::Int(9));
    assert_eq!(doc.ext(1, "value").unwrap(), &ExtValue::Float(1e9));
}

#[test]
fn dates_become_iso() {
    let doc = normalise("Seen 12/03/2021 in clinic");

    assert_eq!(texts(&doc), vec!["Seen", "12/03/2021", "in", "clinic"]);
    assert_eq!(doc.tokens()[1].norm(), "2021-03-12");
    assert_eq!(doc.ext(1, "date").unwrap(), &ExtValue::Bool(true));
    assert_eq!(doc.ext(1, "value").unwrap(), &ExtValue::from("2021-03-12"));
}

#[test]
fn dates_at_sentence_start() {
    let doc = normalise("12/03/2021 reviewed");

    assert_eq!(texts(&doc), vec!["12/03/2021", "reviewed"]);
    assert_eq!(doc.tokens()[0].norm(), "2021-03-12");
}

#[test]
fn month_year_dates_start_on_the_first() {
    let doc = normalise("Started Jan 2020");

    assert_eq!(texts(&doc), vec!["Started", "Jan 2020"]);
    assert_eq!(doc.tokens()[1].norm(), "2020-01-01");
}

#[test]
fn impossible_dates_are_left_alone() {
    let doc = normalise("Seen 31/02/2021");

    assert_eq!(doc.len(), 6);
    assert_eq!(doc.ext(1, "date").unwrap(), &ExtValue::Bool(false));
}

#[test]
fn decimals_then_times() {
    let doc = normalise("Temp 36.9 at 5 pm");

    assert_eq!(texts(&doc), vec!["Temp", "36.9", "at", "5 pm"]);
    assert_eq!(doc.tokens()[1].norm(), "36.9");
    assert_eq!(doc.ext(1, "value").unwrap(), &ExtValue::Float(36.9));
    assert_eq!(doc.ext(1, "kind").unwrap(), &ExtValue::from("decimal"));

    assert_eq!(doc.tokens()[3].norm(), "5pm");
    assert_eq!(doc.ext(3, "value").unwrap(), &ExtValue::Float(5.0));
    assert_eq!(doc.ext(3, "unit").unwrap(), &ExtValue::from("pm"));
}

#[test]
fn units_with_denominators() {
    let doc = normalise("Dose 5 mg/kg daily");

    assert_eq!(texts(&doc), vec!["Dose", "5 mg/kg", "daily"]);
    assert_eq!(doc.tokens()[1].norm(), "5 mg/kg");
    assert_eq!(doc.ext(1, "unit_norm").unwrap(), &ExtValue::Bool(true));
    assert_eq!(doc.ext(1, "value").unwrap(), &ExtValue::Float(5.0));
    assert_eq!(doc.ext(1, "unit").unwrap(), &ExtValue::from("mg/kg"));
}

#[test]
fn configured_kinds_only() {
    let config: NormalizerConfig = serde_json::from_value(json!({"kinds": ["decimal"]})).unwrap();
    let normalizer = Normalizer::from_config("decimals", &config).unwrap();
    assert_eq!(normalizer.kinds(), vec![NormalizerKind::Decimal]);

    let pipeline = Pipeline::builder().add(normalizer).build().unwrap();
    assert!(!pipeline.schema().contains("date"));

    let doc = pipeline.process("Temp 36.9 at 5 pm").unwrap();
    assert_eq!(texts(&doc), vec!["Temp", "36.9", "at", "5", "pm"]);
}

#[test]
fn commas_are_decimal_points() {
    let doc = normalise("Platelets 1,234");

    assert_eq!(texts(&doc), vec!["Platelets", "1,234"]);
    assert_eq!(doc.tokens()[1].norm(), "1.234");
    assert_eq!(doc.ext(1, "value").unwrap(), &ExtValue::Float(1.234));
}
