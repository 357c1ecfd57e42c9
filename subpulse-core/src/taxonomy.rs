//! Category taxonomy used by the rule-based post classifier.
//!
//! A taxonomy is an ordered table of category names to keyword phrases. It is
//! validated once when built and never mutated afterwards.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SOLUTION_REQUESTS: &str = "Solution Requests";
pub const PAIN_AND_ANGER: &str = "Pain & Anger";
pub const ADVICE_REQUESTS: &str = "Advice Requests";
pub const MONEY_TALK: &str = "Money Talk";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// `text` must already be lower-cased.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    rules: Vec<CategoryRule>,
}

impl Taxonomy {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, CoreError> {
        if rules.is_empty() {
            return Err(CoreError::taxonomy("no categories defined"));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            let name = rule.name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::taxonomy("category with a blank name"));
            }
            if !seen.insert(name.clone()) {
                return Err(CoreError::taxonomy(format!(
                    "category '{}' defined more than once",
                    name
                )));
            }
            if rule.keywords.is_empty() {
                return Err(CoreError::taxonomy(format!(
                    "category '{}' has no keywords",
                    name
                )));
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(CoreError::taxonomy(format!(
                    "category '{}' has a blank keyword",
                    name
                )));
            }

            // Post text is lower-cased before matching, so keywords must be too.
            let keywords = rule.keywords.iter().map(|k| k.to_lowercase()).collect();
            normalized.push(CategoryRule { name, keywords });
        }

        Ok(Self { rules: normalized })
    }

    pub fn default_rules() -> Vec<CategoryRule> {
        vec![
            CategoryRule::new(
                SOLUTION_REQUESTS,
                &["how to", "solution", "solve", "fix", "help me"],
            ),
            CategoryRule::new(
                PAIN_AND_ANGER,
                &["angry", "frustrated", "annoyed", "hate", "terrible", "worst"],
            ),
            CategoryRule::new(
                ADVICE_REQUESTS,
                &["advice", "suggest", "recommendation", "what should", "opinions"],
            ),
            CategoryRule::new(
                MONEY_TALK,
                &[
                    "money", "cost", "price", "expensive", "cheap", "afford", "dollar", "payment",
                ],
            ),
        ]
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }
}
