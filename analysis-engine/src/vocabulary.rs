//! Fixed word lists consumed by the tokenizer and the sentiment scorer.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Dropped from keyword rankings and from the word-level sentiment pass.
pub const STOP_WORDS: &[&str] = &["this", "that", "with", "from", "have", "what"];

pub const POSITIVE_WORDS: &[&str] = &[
    "good",
    "great",
    "awesome",
    "excellent",
    "love",
    "best",
    "amazing",
    "wonderful",
    "fantastic",
    "terrific",
    "outstanding",
    "superb",
    "brilliant",
    "fabulous",
    "helpful",
    "impressive",
    "perfect",
    "happy",
    "excited",
    "enjoy",
    "pleased",
    "grateful",
    "thankful",
    "appreciate",
    "positive",
    "beautiful",
    "recommend",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "worst",
    "terrible",
    "hate",
    "awful",
    "horrible",
    "poor",
    "disappointing",
    "frustrating",
    "annoying",
    "useless",
    "waste",
    "difficult",
    "problem",
    "issue",
    "broken",
    "fail",
    "failure",
    "sucks",
    "suck",
    "disappointed",
    "stupid",
    "ridiculous",
    "crap",
    "garbage",
    "junk",
    "mess",
    "disaster",
];

/// Matched against whole tokens. "no" is shorter than the sentence token
/// minimum and "don't" never survives word splitting, so neither can fire.
pub const NEGATION_WORDS: &[&str] = &["not", "no", "don't", "never", "neither", "nor", "without"];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());
static POSITIVE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| POSITIVE_WORDS.iter().copied().collect());
static NEGATIVE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NEGATIVE_WORDS.iter().copied().collect());
static NEGATION_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NEGATION_WORDS.iter().copied().collect());

pub fn is_stop_word(word: &str) -> bool {
    STOP_SET.contains(word)
}

pub fn is_positive(word: &str) -> bool {
    POSITIVE_SET.contains(word)
}

pub fn is_negative(word: &str) -> bool {
    NEGATIVE_SET.contains(word)
}

pub fn is_negation(word: &str) -> bool {
    NEGATION_SET.contains(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_lists_are_disjoint() {
        assert!(POSITIVE_WORDS.iter().all(|w| !is_negative(w)));
        assert!(NEGATIVE_WORDS.iter().all(|w| !is_positive(w)));
    }

    #[test]
    fn test_lookups() {
        assert!(is_positive("recommend"));
        assert!(is_negative("disaster"));
        assert!(is_negation("without"));
        assert!(is_stop_word("what"));
        assert!(!is_stop_word("rust"));
    }
}
