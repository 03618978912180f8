// ============================================================
// Layer 4 — Word Tokenizer
// ============================================================
// Splits text into words with character offsets using the
// `tokenizers` whitespace pre-tokenizer (`\w+|[^\w\s]+`), so
// "Paris, 1937." becomes ["Paris", ",", "1937", "."].
//
// The offsets are character positions into the original text,
// which is the unit SQuAD uses for `answer_start`.

use anyhow::Result;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

/// One word and its [start, end) character range in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    pub text:  String,
    pub start: usize,
    pub end:   usize,
}

pub fn tokenize(text: &str) -> Result<Vec<WordToken>> {
    let mut pretok = PreTokenizedString::from(text);
    Whitespace {}
        .pre_tokenize(&mut pretok)
        .map_err(|e| anyhow::anyhow!("Pre-tokenisation error: {e}"))?;

    Ok(pretok
        .get_splits(OffsetReferential::Original, OffsetType::Char)
        .into_iter()
        .map(|(word, (start, end), _)| WordToken { text: word.to_string(), start, end })
        .collect())
}

/// Map a [char_start, char_end) answer range onto inclusive word indices.
///
/// The start word is the first one ending after `char_start`, the end
/// word is the last one starting before `char_end`.
pub fn char_span_to_words(
    tokens:     &[WordToken],
    char_start: usize,
    char_end:   usize,
) -> Option<(usize, usize)> {
    let start = tokens.iter().position(|t| t.end > char_start)?;
    let end   = tokens.iter().rposition(|t| t.start < char_end)?;
    (start <= end).then_some((start, end))
}

/// Re-join words [start..=end] as they appeared in the source text
pub fn span_text(text: &str, tokens: &[WordToken], start: usize, end: usize) -> String {
    match (tokens.get(start), tokens.get(end)) {
        (Some(first), Some(last)) if start <= end => text
            .chars()
            .skip(first.start)
            .take(last.end.saturating_sub(first.start))
            .collect(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_is_split_off() {
        let words: Vec<String> = tokenize("Paris, 1937.")
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(words, vec!["Paris", ",", "1937", "."]);
    }

    #[test]
    fn test_offsets_are_characters() {
        let tokens = tokenize("café au lait").unwrap();
        assert_eq!(tokens[1], WordToken { text: "au".into(), start: 5, end: 7 });
    }

    #[test]
    fn test_char_span_maps_to_words() {
        let text   = "The bridge opened in 1937 after four years.";
        let tokens = tokenize(text).unwrap();
        // "1937 after" starts at char 21
        assert_eq!(char_span_to_words(&tokens, 21, 31), Some((4, 5)));
        assert_eq!(span_text(text, &tokens, 4, 5), "1937 after");
    }

    #[test]
    fn test_span_outside_text_gives_none() {
        let tokens = tokenize("short text").unwrap();
        assert_eq!(char_span_to_words(&tokens, 50, 55), None);
    }
}
