use crate::classifier::{classify_post, KeywordClassifier, PostClassifier};
use crate::frequency::analyze_post_frequency;
use crate::keywords::{extract_top_keywords, DEFAULT_KEYWORD_LIMIT};
use crate::sentiment::score_sentiment;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use subpulse_core::{
    subreddit_key, AnalysisReport, AppConfig, CancellationSignal, CategorizedPost,
    CategoryAssignment, Clock, CoreError, KeywordCount, Post, PostFrequency, SentimentResult,
    SystemClock, Taxonomy,
};
use tokio::task;
use tracing::{debug, info, warn};

/// Runs every analysis pass over a batch and merges the results into one
/// report.
#[derive(Debug, Clone)]
pub struct Analyzer {
    taxonomy: Arc<Taxonomy>,
    keyword_limit: usize,
    clock: Arc<dyn Clock>,
}

impl Analyzer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let taxonomy = config.build_taxonomy()?;
        Ok(Self::new(Arc::new(taxonomy)).with_keyword_limit(config.keyword_limit))
    }

    pub fn with_keyword_limit(mut self, keyword_limit: usize) -> Self {
        self.keyword_limit = keyword_limit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    pub fn keyword_classifier(&self) -> KeywordClassifier {
        KeywordClassifier::new(Arc::clone(&self.taxonomy))
    }

    /// Sequential, rule-based analysis on the calling thread.
    pub fn analyze(&self, subreddit: &str, posts: &[Post]) -> Result<AnalysisReport, CoreError> {
        validate_batch(subreddit, posts)?;

        let keywords = extract_top_keywords(posts, self.keyword_limit);
        let sentiment = score_sentiment(posts);
        let frequency = analyze_post_frequency(posts);
        let assignments = posts
            .iter()
            .map(|post| Some(classify_post(post, &self.taxonomy)))
            .collect();

        Ok(self.assemble(
            subreddit,
            posts.to_vec(),
            keywords,
            sentiment,
            frequency,
            assignments,
        ))
    }

    /// Runs the keyword, sentiment and frequency passes on blocking workers
    /// while `classifier` labels posts one at a time.
    ///
    /// A classifier error for a single post leaves that post without an
    /// assignment. Cancellation is checked between posts and discards
    /// everything computed so far.
    pub async fn analyze_concurrent<C: PostClassifier>(
        &self,
        subreddit: &str,
        posts: Arc<Vec<Post>>,
        classifier: &C,
        cancel: &CancellationSignal,
    ) -> Result<AnalysisReport, CoreError> {
        validate_batch(subreddit, &posts)?;
        cancel.check()?;

        let keyword_limit = self.keyword_limit;
        let keyword_task = {
            let posts = Arc::clone(&posts);
            task::spawn_blocking(move || extract_top_keywords(&posts, keyword_limit))
        };
        let sentiment_task = {
            let posts = Arc::clone(&posts);
            task::spawn_blocking(move || score_sentiment(&posts))
        };
        let frequency_task = {
            let posts = Arc::clone(&posts);
            task::spawn_blocking(move || analyze_post_frequency(&posts))
        };

        let assignments = self.classify_all(&posts, classifier, cancel).await?;

        let (keywords, sentiment, frequency) =
            tokio::try_join!(keyword_task, sentiment_task, frequency_task).map_err(|e| {
                CoreError::Internal {
                    message: format!("analysis worker failed: {}", e),
                }
            })?;

        Ok(self.assemble(
            subreddit,
            (*posts).clone(),
            keywords,
            sentiment,
            frequency,
            assignments,
        ))
    }

    async fn classify_all<C: PostClassifier>(
        &self,
        posts: &[Post],
        classifier: &C,
        cancel: &CancellationSignal,
    ) -> Result<Vec<CategoryAssignment>, CoreError> {
        let mut assignments = Vec::with_capacity(posts.len());
        for post in posts {
            if cancel.is_cancelled() {
                info!(
                    "Analysis cancelled after classifying {}/{} posts",
                    assignments.len(),
                    posts.len()
                );
                return Err(CoreError::Cancelled);
            }

            match classifier.classify(post).await {
                Ok(labels) => assignments.push(Some(labels)),
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    warn!(
                        "Classification failed for post {}, keeping it without categories: {}",
                        post.id, e
                    );
                    assignments.push(None);
                }
            }
        }
        cancel.check()?;
        Ok(assignments)
    }

    fn assemble(
        &self,
        subreddit: &str,
        posts: Vec<Post>,
        top_keywords: Vec<KeywordCount>,
        sentiment: SentimentResult,
        post_frequency: PostFrequency,
        assignments: Vec<CategoryAssignment>,
    ) -> AnalysisReport {
        let mut category_counts: BTreeMap<String, usize> = self
            .taxonomy
            .category_names()
            .map(|name| (name.to_string(), 0))
            .collect();

        let categorized_posts: Vec<CategorizedPost> = posts
            .into_iter()
            .zip(assignments)
            .map(|(post, assignment)| {
                let categories = assignment.map(dedup_labels);
                for label in categories.iter().flatten() {
                    *category_counts.entry(label.clone()).or_insert(0) += 1;
                }
                CategorizedPost { post, categories }
            })
            .collect();

        let report = AnalysisReport {
            subreddit_name: subreddit_key(subreddit),
            display_name: subreddit.trim().to_string(),
            post_count: categorized_posts.len(),
            top_keywords,
            sentiment,
            post_frequency,
            category_counts,
            categorized_posts,
            computed_at: self.clock.now(),
        };

        debug!(
            "Analyzed r/{}: {} posts, {} keywords, sentiment {:.3}",
            report.display_name,
            report.post_count,
            report.top_keywords.len(),
            report.sentiment.average
        );
        report
    }
}

fn validate_batch(subreddit: &str, posts: &[Post]) -> Result<(), CoreError> {
    if subreddit.trim().is_empty() {
        return Err(CoreError::invalid_input("subreddit name is empty"));
    }

    let mut seen = HashSet::with_capacity(posts.len());
    for post in posts {
        post.validate()?;
        if !seen.insert(post.id.as_str()) {
            return Err(CoreError::invalid_input(format!(
                "post id '{}' appears more than once in the batch",
                post.id
            )));
        }
    }
    Ok(())
}

fn dedup_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(labels.len());
    labels
        .into_iter()
        .filter(|label| seen.insert(label.clone()))
        .collect()
}
