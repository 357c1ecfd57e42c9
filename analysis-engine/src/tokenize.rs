use crate::vocabulary::is_stop_word;
use once_cell::sync::Lazy;
use regex::Regex;
use subpulse_core::Post;

// ASCII word characters only; anything else separates words.
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("word separator pattern"));
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence separator pattern"));

/// Every post's title and body joined with spaces, lower-cased.
pub fn batch_text(posts: &[Post]) -> String {
    posts
        .iter()
        .map(Post::text)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn words(text: &str) -> impl Iterator<Item = &str> {
    NON_WORD.split(text).filter(|word| !word.is_empty())
}

/// Words long enough to rank, with stop words removed.
pub fn keyword_tokens(text: &str) -> impl Iterator<Item = &str> {
    words(text).filter(|word| word.len() > 3 && !is_stop_word(word))
}

pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_END
        .split(text)
        .filter(|sentence| !sentence.trim().is_empty())
}
