use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REDDIT_WEB_BASE: &str = "https://reddit.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub permalink: String,
    pub author: String,
    #[serde(default)]
    pub url: String,
}

impl Post {
    /// Rejects records missing the fields every analysis pass relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::invalid_input(format!(
                "post '{}' has no id",
                self.title
            )));
        }
        Ok(())
    }

    /// Title and body joined the way every analysis pass reads a post.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }

    pub fn link(&self) -> String {
        if self.permalink.is_empty() {
            self.url.clone()
        } else {
            format!("{}{}", REDDIT_WEB_BASE, self.permalink)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentResult {
    pub average: f64,
    pub distribution: SentimentDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFrequency {
    pub by_hour: [u32; 24],
    pub most_active_hour: u8,
}

impl Default for PostFrequency {
    fn default() -> Self {
        Self {
            by_hour: [0; 24],
            most_active_hour: 0,
        }
    }
}

/// Category labels for one post. `None` means classification failed for the
/// post and it is excluded from every category count.
pub type CategoryAssignment = Option<Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedPost {
    #[serde(flatten)]
    pub post: Post,
    pub categories: CategoryAssignment,
}

impl CategorizedPost {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories
            .as_ref()
            .map_or(false, |labels| labels.iter().any(|label| label == category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub subreddit_name: String,
    pub display_name: String,
    pub post_count: usize,
    pub top_keywords: Vec<KeywordCount>,
    pub sentiment: SentimentResult,
    pub post_frequency: PostFrequency,
    pub category_counts: BTreeMap<String, usize>,
    pub categorized_posts: Vec<CategorizedPost>,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn posts_in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a CategorizedPost> + 'a {
        self.categorized_posts
            .iter()
            .filter(move |post| post.has_category(category))
    }

    /// Checks that every category count matches the categorized posts.
    pub fn is_consistent(&self) -> bool {
        self.post_count == self.categorized_posts.len()
            && self
                .category_counts
                .iter()
                .all(|(category, count)| self.posts_in_category(category).count() == *count)
    }
}

/// Storage key for a subreddit: the lower-cased name.
pub fn subreddit_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(permalink: &str, url: &str) -> Post {
        Post {
            id: "abc".to_string(),
            title: "Title".to_string(),
            body: String::new(),
            score: 1,
            num_comments: 0,
            created_utc: 0,
            permalink: permalink.to_string(),
            author: "someone".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_link_prefers_permalink() {
        let p = post("/r/rust/comments/abc", "https://example.com");
        assert_eq!(p.link(), "https://reddit.com/r/rust/comments/abc");

        let p = post("", "https://example.com");
        assert_eq!(p.link(), "https://example.com");
    }

    #[test]
    fn test_body_defaults_to_empty() {
        let json = r#"{"id":"x","title":"t","score":3,"num_comments":1,
            "created_utc":10,"permalink":"/p","author":"a"}"#;
        let p: Post = serde_json::from_str(json).unwrap();
        assert_eq!(p.body, "");
        assert_eq!(p.text(), "t ");
    }

    #[test]
    fn test_failed_assignment_matches_nothing() {
        let categorized = CategorizedPost {
            post: post("/p", ""),
            categories: None,
        };
        assert!(!categorized.has_category("Money Talk"));
    }

    #[test]
    fn test_validate_requires_id() {
        let mut p = post("/p", "");
        assert!(p.validate().is_ok());
        p.id = "  ".to_string();
        assert!(matches!(p.validate(), Err(CoreError::InvalidInput { .. })));
    }

    #[test]
    fn test_subreddit_key() {
        assert_eq!(subreddit_key("  RustLang "), "rustlang");
    }
}
