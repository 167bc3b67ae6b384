//! A small rule-based tokenizer.
//!
//! Words follow Unicode word boundaries. A single space after a token is
//! recorded as `whitespace_after`; any other whitespace run (newlines,
//! repeated spaces) becomes its own token so that layout can be matched.
//! A token starts a sentence after `.`, `!`, `?` or a line break.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::{ExtensionSchema, LLDoc, RawToken};

/// Tokenize `text` into a document with no extension slots.
pub fn create_doc_from_string(text: &str) -> LLDoc {
    create_doc_with_schema(text, Arc::new(ExtensionSchema::empty()))
}

/// Tokenize `text` into a document sharing `schema`.
pub fn create_doc_with_schema(text: &str, schema: Arc<ExtensionSchema>) -> LLDoc {
    LLDoc::new(schema, tokenize(text))
}

fn is_whitespace(piece: &str) -> bool {
    piece.chars().all(char::is_whitespace)
}

fn ends_sentence(piece: &str) -> bool {
    matches!(piece, "." | "!" | "?") || piece.contains('\n')
}

/// Numbers are split at `.` and `,` so that decimals and grouped digits can
/// be matched piecewise: `36.9` becomes `36`, `.`, `9`.
fn split_number(piece: &str) -> Vec<&str> {
    if !piece.starts_with(|c: char| c.is_ascii_digit()) || !piece.contains(['.', ',']) {
        return vec![piece];
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, c) in piece.char_indices() {
        if c == '.' || c == ',' {
            if start < idx {
                parts.push(&piece[start..idx]);
            }
            parts.push(&piece[idx..idx + 1]);
            start = idx + 1;
        }
    }
    if start < piece.len() {
        parts.push(&piece[start..]);
    }
    parts
}

pub fn tokenize(text: &str) -> Vec<RawToken> {
    let mut tokens: Vec<RawToken> = Vec::new();
    let mut pieces = text.split_word_bounds().peekable();
    let mut sentence_pending = true;

    while let Some(piece) = pieces.next() {
        if !is_whitespace(piece) {
            let parts = split_number(piece);
            let last = parts.len() - 1;
            for (pos, part) in parts.into_iter().enumerate() {
                tokens.push(RawToken::new(part, false, sentence_pending));
                // a separator inside a number never ends a sentence
                sentence_pending = pos == last && ends_sentence(part);
            }
            continue;
        }

        let mut run = piece.to_string();
        while let Some(next) = pieces.next_if(|p| is_whitespace(p)) {
            run.push_str(next);
        }

        match tokens.last_mut() {
            Some(prev) if run == " " && !prev.whitespace_after => {
                prev.whitespace_after = true;
            }
            _ => {
                let whitespace_after = run.len() > 1 && run.ends_with(' ');
                if whitespace_after {
                    run.pop();
                }
                let breaks_line = run.contains('\n');
                tokens.push(RawToken::new(run, whitespace_after, sentence_pending));
                sentence_pending = sentence_pending || breaks_line;
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[RawToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn splits_words_and_punctuation() {
        let tokens = tokenize("ECOG: 2 and 10^9");
        assert_eq!(texts(&tokens), vec!["ECOG", ":", "2", "and", "10", "^", "9"]);
        assert!(!tokens[0].whitespace_after);
        assert!(tokens[1].whitespace_after);
        assert!(!tokens[4].whitespace_after);
    }

    #[test]
    fn numbers_split_at_separators() {
        let tokens = tokenize("Temp 36.9. Wt 1,234");
        assert_eq!(
            texts(&tokens),
            vec!["Temp", "36", ".", "9", ".", "Wt", "1", ",", "234"]
        );
        let starts: Vec<bool> = tokens.iter().map(|t| t.is_sent_start).collect();
        assert_eq!(
            starts,
            vec![true, false, false, false, false, true, false, false, false]
        );
    }

    #[test]
    fn line_breaks_are_tokens_and_start_sentences() {
        let tokens = tokenize("Plan:\n\nReview in clinic. Stable");
        assert_eq!(
            texts(&tokens),
            vec!["Plan", ":", "\n\n", "Review", "in", "clinic", ".", "Stable"]
        );
        let starts: Vec<bool> = tokens.iter().map(|t| t.is_sent_start).collect();
        assert_eq!(
            starts,
            vec![true, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn doc_text_round_trips_single_spaces() {
        let doc = create_doc_from_string("no evidence of disease.");
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.text(), "no evidence of disease.");
    }
}
