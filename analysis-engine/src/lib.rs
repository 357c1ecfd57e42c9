//! Text analysis over a batch of subreddit posts: keyword ranking, heuristic
//! sentiment, rule-based categorization and the orchestrator that merges
//! them into an [`AnalysisReport`](subpulse_core::AnalysisReport).

pub mod budget;
pub mod classifier;
pub mod frequency;
pub mod keywords;
pub mod orchestrator;
pub mod sentiment;
pub mod tokenize;
pub mod vocabulary;

pub use budget::{SharedBudget, TokenBudget};
pub use classifier::{classify_post, BudgetedClassifier, KeywordClassifier, PostClassifier};
pub use frequency::analyze_post_frequency;
pub use keywords::extract_top_keywords;
pub use orchestrator::Analyzer;
pub use sentiment::{score_sentiment, SentimentTally};
