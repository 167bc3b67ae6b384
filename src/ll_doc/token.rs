use serde::Serialize;

use crate::ExtValue;

/// Number words accepted by `like_num`, mirroring the usual English lexicon attribute.
const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "hundred", "thousand", "million", "billion",
];

/// Lexical flags computed once from the token text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenFlags {
    pub is_digit: bool,
    pub is_punct: bool,
    pub is_alpha: bool,
    pub like_num: bool,
    pub is_space: bool,
}

impl TokenFlags {
    pub fn from_text(text: &str) -> Self {
        let non_empty = !text.is_empty();
        Self {
            is_digit: non_empty && text.chars().all(|c| c.is_ascii_digit()),
            is_punct: non_empty
                && text
                    .chars()
                    .all(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            is_alpha: non_empty && text.chars().all(char::is_alphabetic),
            like_num: like_num(text),
            is_space: non_empty && text.chars().all(char::is_whitespace),
        }
    }
}

fn like_num(text: &str) -> bool {
    let trimmed = text.trim_start_matches(|c| matches!(c, '+' | '-' | '~' | '±'));
    let digits: String = trimmed.chars().filter(|c| !matches!(c, ',' | '.')).collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if let Some((num, denom)) = trimmed.split_once('/') {
        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if all_digits(num) && all_digits(denom) {
            return true;
        }
    }
    NUMBER_WORDS.contains(&trimmed.to_lowercase().as_str())
}

/// A single token of an [`LLDoc`](crate::LLDoc).
#[derive(Debug, Clone, PartialEq)]
pub struct LLToken {
    pub(crate) text: String,
    pub(crate) norm: String,
    pub(crate) flags: TokenFlags,
    pub(crate) whitespace_after: bool,
    pub(crate) is_sent_start: bool,
    /// Values indexed by the document's extension schema.
    pub(crate) ext: Vec<ExtValue>,
}

impl LLToken {
    pub(crate) fn new(
        text: impl Into<String>,
        whitespace_after: bool,
        is_sent_start: bool,
        ext: Vec<ExtValue>,
    ) -> Self {
        let text = text.into();
        Self {
            norm: text.to_lowercase(),
            flags: TokenFlags::from_text(&text),
            text,
            whitespace_after,
            is_sent_start,
            ext,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Canonical form; the lowercase text unless a merge assigned one.
    pub fn norm(&self) -> &str {
        &self.norm
    }

    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    pub fn flags(&self) -> TokenFlags {
        self.flags
    }

    pub fn whitespace_after(&self) -> bool {
        self.whitespace_after
    }

    pub fn is_sent_start(&self) -> bool {
        self.is_sent_start
    }

    /// Text followed by its trailing space, if any.
    pub fn text_with_ws(&self) -> String {
        if self.whitespace_after {
            format!("{} ", self.text)
        } else {
            self.text.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_for_common_tokens() {
        let digit = TokenFlags::from_text("2");
        assert!(digit.is_digit && digit.like_num && !digit.is_alpha);

        let grouped = TokenFlags::from_text("1,234");
        assert!(!grouped.is_digit && grouped.like_num);

        let punct = TokenFlags::from_text(":");
        assert!(punct.is_punct && !punct.like_num);

        let word = TokenFlags::from_text("ECOG");
        assert!(word.is_alpha && !word.is_punct);

        assert!(TokenFlags::from_text("zero").like_num);
        assert!(TokenFlags::from_text("1/2").like_num);
        assert!(TokenFlags::from_text("\n").is_space);
    }
}
