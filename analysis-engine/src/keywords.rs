use crate::tokenize::{batch_text, keyword_tokens};
use std::collections::HashMap;
use subpulse_core::{KeywordCount, Post};

pub const DEFAULT_KEYWORD_LIMIT: usize = 10;

/// Ranks the most frequent words across the batch.
///
/// Counts are sorted descending; ties keep the order in which the words were
/// first seen.
pub fn extract_top_keywords(posts: &[Post], limit: usize) -> Vec<KeywordCount> {
    let text = batch_text(posts);

    let mut ranked: Vec<KeywordCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for word in keyword_tokens(&text) {
        match index.get(word) {
            Some(&slot) => ranked[slot].count += 1,
            None => {
                index.insert(word, ranked.len());
                ranked.push(KeywordCount {
                    word: word.to_string(),
                    count: 1,
                });
            }
        }
    }

    // `sort_by` is stable, which gives the first-seen tie break.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str) -> Post {
        Post {
            id: title.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            score: 0,
            num_comments: 0,
            created_utc: 0,
            permalink: String::new(),
            author: "tester".to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(extract_top_keywords(&[], 10).is_empty());
    }

    #[test]
    fn test_counts_across_title_and_body() {
        let posts = vec![
            post("Rust borrow checker", "The borrow checker again"),
            post("Async RUST", "borrow"),
        ];
        let top = extract_top_keywords(&posts, 10);
        assert_eq!(top[0], KeywordCount { word: "borrow".to_string(), count: 3 });
        assert_eq!(top[1], KeywordCount { word: "rust".to_string(), count: 2 });
        assert_eq!(top[2], KeywordCount { word: "checker".to_string(), count: 2 });
        assert_eq!(top[3].word, "again");
        assert_eq!(top[4].word, "async");
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let posts = vec![post("zeta alpha mango", "alpha zeta")];
        let words: Vec<String> = extract_top_keywords(&posts, 10)
            .into_iter()
            .map(|k| k.word)
            .collect();
        assert_eq!(words, vec!["zeta", "alpha", "mango"]);
    }

    #[test]
    fn test_short_and_stop_words_are_dropped() {
        let posts = vec![post("What is this? A cat with that hat", "from have")];
        assert!(extract_top_keywords(&posts, 10).is_empty());
    }

    #[test]
    fn test_limit_and_ordering_hold() {
        let posts: Vec<Post> = (0..30)
            .map(|i| post(&format!("word{} common", i), &"repeat ".repeat(i % 4)))
            .collect();

        for limit in [0, 1, 5, 10, 50] {
            let top = extract_top_keywords(&posts, limit);
            assert!(top.len() <= limit);
            assert!(top.windows(2).all(|pair| pair[0].count >= pair[1].count));
            assert!(top.iter().all(|k| k.count >= 1));
        }
    }
}
