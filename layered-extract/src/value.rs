//! Value coercion for matched value sub-spans.
//!
//! Each matched text is coerced in order: integer, float, the words
//! `zero`/`o`, and otherwise kept as raw text. Raw text replaces every
//! candidate gathered so far, so scientific notation and letter ratings are
//! returned verbatim instead of being mixed with numbers.

use std::cmp::Ordering;

use layered_clinical::ExtValue;

/// The value reported when nothing was extracted.
pub const NO_VALUE: i64 = -1;

/// Coerce a single matched text. Commas and parentheses are stripped first.
pub fn coerce_value_text(raw: &str) -> ExtValue {
    let stripped: String = raw.chars().filter(|c| !matches!(c, ',' | '(' | ')')).collect();
    let trimmed = stripped.trim();

    if let Ok(int) = trimmed.parse::<i64>() {
        return ExtValue::Int(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return ExtValue::Float(float);
    }
    if matches!(trimmed.to_lowercase().as_str(), "zero" | "o") {
        return ExtValue::Int(0);
    }
    ExtValue::Str(stripped)
}

/// Candidate values of one span, seeded with [`NO_VALUE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCandidates {
    values: Vec<ExtValue>,
}

impl Default for ValueCandidates {
    fn default() -> Self {
        Self {
            values: vec![ExtValue::Int(NO_VALUE)],
        }
    }
}

impl ValueCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, raw: &str) {
        match coerce_value_text(raw) {
            text @ ExtValue::Str(_) => self.values = vec![text],
            number => self.values.push(number),
        }
    }

    pub fn values(&self) -> &[ExtValue] {
        &self.values
    }

    pub fn select(&self) -> ExtValue {
        select_value(&self.values)
    }
}

impl<'a> Extend<&'a str> for ValueCandidates {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for raw in iter {
            self.push_text(raw);
        }
    }
}

fn numeric_cmp(a: &ExtValue, b: &ExtValue) -> Ordering {
    let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Pick the reported value.
///
/// Numbers compare numerically and the first maximum wins. A list mixing
/// text with numbers cannot be ordered, so the entry with the longest
/// printed form wins instead, the later one on ties.
pub fn select_value(values: &[ExtValue]) -> ExtValue {
    let texts = values.iter().filter(|v| v.as_str().is_some()).count();

    let chosen = if texts == 0 {
        values
            .iter()
            .reduce(|best, v| if numeric_cmp(v, best) == Ordering::Greater { v } else { best })
    } else if texts == values.len() {
        values
            .iter()
            .reduce(|best, v| if v.as_str() > best.as_str() { v } else { best })
    } else {
        values
            .iter()
            .reduce(|best, v| {
                if v.to_string().chars().count() >= best.to_string().chars().count() {
                    v
                } else {
                    best
                }
            })
    };
    chosen.cloned().unwrap_or(ExtValue::Int(NO_VALUE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(texts: &[&str]) -> ExtValue {
        let mut candidates = ValueCandidates::new();
        candidates.extend(texts.iter().copied());
        candidates.select()
    }

    #[test]
    fn grouped_digits_become_an_integer() {
        assert_eq!(select(&["1,234"]), ExtValue::Int(1234));
        assert_eq!(coerce_value_text("(3)"), ExtValue::Int(3));
    }

    #[test]
    fn decimals_become_floats() {
        assert_eq!(select(&["2.5"]), ExtValue::Float(2.5));
    }

    #[test]
    fn letter_o_and_zero_are_zero() {
        assert_eq!(select(&["o"]), ExtValue::Int(0));
        assert_eq!(select(&["Zero"]), ExtValue::Int(0));
    }

    #[test]
    fn unparsable_text_is_returned_verbatim() {
        assert_eq!(select(&["10^9"]), ExtValue::Str("10^9".to_string()));
        assert_eq!(select(&["2", "b"]), ExtValue::Str("b".to_string()));
    }

    #[test]
    fn no_match_reports_minus_one() {
        assert_eq!(select(&[]), ExtValue::Int(-1));
    }

    #[test]
    fn numbers_take_the_maximum() {
        assert_eq!(select(&["1", "3", "2"]), ExtValue::Int(3));
        assert_eq!(select(&["2", "2.5"]), ExtValue::Float(2.5));
    }

    #[test]
    fn text_then_numbers_takes_the_longest() {
        // "a" resets the candidates, then 12 is appended
        assert_eq!(select(&["a", "12"]), ExtValue::Int(12));
        assert_eq!(
            select_value(&[ExtValue::from("ab"), ExtValue::Int(12)]),
            ExtValue::Int(12)
        );
        assert_eq!(
            select_value(&[ExtValue::from("abc"), ExtValue::Int(12)]),
            ExtValue::from("abc")
        );
    }
}
