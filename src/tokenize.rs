// src/tokenize.rs
//! Token-set builders used for relatedness scoring.
//!
//! Two strategies, picked per page via config:
//! - [`Tokenizer::Shingle`]: case-folded trigrams over the text padded with two
//!   spaces on each side. No word-boundary assumptions, so Japanese/Chinese
//!   titles work out of the box.
//! - [`Tokenizer::Words`]: greedy left-to-right scan for ASCII words, possessive
//!   fragments (`'s`) and digit runs. Any run of non-ASCII, non-punctuation
//!   characters is re-tokenized as trigrams.
//!
//! Both produce a *set*: a token seen twice counts once.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashSet;

/// Unique string fragments derived from a document.
pub type TokenSet = HashSet<String>;

/// Boundary padding for shingles. Two spaces means every character appears at
/// the start, middle and end of some trigram.
const PAD: [char; 2] = [' ', ' '];
const SHINGLE_LEN: usize = 3;

/// Characters up to this code point are treated as "ASCII-ish" in word mode
/// (kept as a single lowercased token); anything above is shingled.
const WORD_CHAR_LIMIT: u32 = 0xFE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tokenizer {
    #[default]
    Shingle,
    Words,
}

impl Tokenizer {
    /// Map a config selector to a strategy. Unknown names fall back to shingles.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "engramify" | "words" | "word-split" | "word_split" => Tokenizer::Words,
            _ => Tokenizer::Shingle,
        }
    }

    /// Build a fresh token set for `text`.
    pub fn tokenize(self, text: &str) -> TokenSet {
        let mut set = TokenSet::new();
        self.extend(text, &mut set);
        set
    }

    /// Add the tokens of `text` to an existing set (title + excerpt merging).
    pub fn extend(self, text: &str, set: &mut TokenSet) {
        match self {
            Tokenizer::Shingle => shingle_into(text, set),
            Tokenizer::Words => words_into(text, set),
        }
    }
}

/// Emit every overlapping trigram of the padded, case-folded text.
pub fn shingle_into(text: &str, set: &mut TokenSet) {
    let padded: Vec<char> = PAD
        .iter()
        .copied()
        .chain(text.chars().flat_map(char::to_lowercase))
        .chain(PAD.iter().copied())
        .collect();
    for w in padded.windows(SHINGLE_LEN) {
        set.insert(w.iter().collect());
    }
}

fn word_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        // Alternatives in priority order:
        // 1) Upper-led word (+ trailing digits)  2) lower word (+ trailing digits)
        // 3) possessive fragment (a bare quote is not one)  4) digit run
        // 5) anything else that is not whitespace or the fixed punctuation set
        Regex::new(
            r#"[A-Z]+[a-z]*[0-9]*|[A-Z]*[a-z]+[0-9]*|'[A-Z]*[a-z]+|'[A-Z]+|[0-9]+|[^A-Za-z0-9'"!?\-:;,.\s]+"#,
        )
        .expect("word tokenizer regex")
    })
}

/// Word-splitting scan. Camel-cased words split at the case change
/// (`GiftCode` → `gift`, `code`); all tokens are case-folded.
pub fn words_into(text: &str, set: &mut TokenSet) {
    for m in word_regex().find_iter(text) {
        let run = m.as_str();
        let first = run.chars().next().map(u32::from).unwrap_or(0);
        if first <= WORD_CHAR_LIMIT {
            set.insert(run.to_lowercase());
        } else {
            shingle_into(run, set);
        }
    }
}

/// Decode HTML entities (`&nbsp;`, `&lt;`, `&#12354;` …) in feed snippets before
/// tokenizing, so markup escapes do not leak into the token set.
pub fn decode_snippet(s: &str) -> String {
    html_escape::decode_html_entities(s).replace('\u{00A0}', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> TokenSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shingles_are_padded_and_lowercased() {
        let s = Tokenizer::Shingle.tokenize("Ab");
        assert_eq!(s, set(&["  a", " ab", "ab ", "b  "]));
    }

    #[test]
    fn empty_text_yields_single_padding_shingle() {
        let s = Tokenizer::Shingle.tokenize("");
        assert_eq!(s, set(&["   "]));
    }

    #[test]
    fn shingles_handle_cjk_by_char() {
        let s = Tokenizer::Shingle.tokenize("太郎");
        assert!(s.contains(" 太郎"));
        assert!(s.contains("太郎 "));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn repeated_tokens_count_once() {
        let s = Tokenizer::Words.tokenize("cat cat CAT");
        assert_eq!(s, set(&["cat"]));
    }

    #[test]
    fn words_split_camel_case_possessives_and_digits() {
        let s = Tokenizer::Words.tokenize("It's a GiftCode for Mr. Smith, 2020!");
        for t in ["it", "'s", "a", "gift", "code", "for", "mr", "smith", "2020"] {
            assert!(s.contains(t), "missing {t} in {s:?}");
        }
        // punctuation never becomes a token
        for p in [".", ",", "!", "'"] {
            assert!(!s.contains(p));
        }
    }

    #[test]
    fn lone_quotes_are_dropped() {
        assert_eq!(Tokenizer::Words.tokenize("rock 'n' roll"), set(&["rock", "'n", "roll"]));
        assert_eq!(Tokenizer::Words.tokenize("'Hello'"), set(&["'hello"]));
        assert_eq!(Tokenizer::Words.tokenize("' '' '"), TokenSet::new());
        assert_eq!(Tokenizer::Words.tokenize("'OK"), set(&["'ok"]));
    }

    #[test]
    fn words_keep_trailing_digits_on_letter_runs() {
        let s = Tokenizer::Words.tokenize("mp3 player 42");
        assert_eq!(s, set(&["mp3", "player", "42"]));
    }

    #[test]
    fn words_shingle_non_ascii_runs() {
        let s = Tokenizer::Words.tokenize("gift 太郎です。");
        assert!(s.contains("gift"));
        assert!(s.contains("  太"));
        assert!(s.contains("です。"));
        assert!(!s.contains("太郎です。"));
    }

    #[test]
    fn extend_merges_into_existing_set() {
        let mut s = Tokenizer::Words.tokenize("cats");
        Tokenizer::Words.extend("dogs", &mut s);
        assert_eq!(s, set(&["cats", "dogs"]));
    }

    #[test]
    fn selector_names_map_to_strategies() {
        assert_eq!(Tokenizer::from_name("engramify"), Tokenizer::Words);
        assert_eq!(Tokenizer::from_name(" Word-Split "), Tokenizer::Words);
        assert_eq!(Tokenizer::from_name("trigramify"), Tokenizer::Shingle);
        assert_eq!(Tokenizer::from_name("whatever"), Tokenizer::Shingle);
    }

    #[test]
    fn snippet_entities_are_decoded() {
        assert_eq!(decode_snippet("a&nbsp;&lt;b&gt;&#65;"), "a <b>A");
    }
}
