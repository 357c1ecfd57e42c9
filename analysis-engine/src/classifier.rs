use crate::budget::SharedBudget;
use std::future::Future;
use std::sync::Arc;
use subpulse_core::{CancellationSignal, CoreError, Post, Taxonomy};
use tracing::debug;

/// Labels of every taxonomy category whose keywords occur in the post, in
/// taxonomy order. Matching is plain substring search on lower-cased text.
pub fn classify_post(post: &Post, taxonomy: &Taxonomy) -> Vec<String> {
    let text = post.text().to_lowercase();
    taxonomy
        .rules()
        .iter()
        .filter(|rule| rule.matches(&text))
        .map(|rule| rule.name.clone())
        .collect()
}

/// Assigns category labels to one post. Implementations backed by an
/// external service may fail for a single post; the orchestrator degrades
/// such a post to an absent assignment instead of failing the batch.
pub trait PostClassifier: Send + Sync {
    fn classify(&self, post: &Post)
        -> impl Future<Output = Result<Vec<String>, CoreError>> + Send;
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    taxonomy: Arc<Taxonomy>,
}

impl KeywordClassifier {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }
}

impl PostClassifier for KeywordClassifier {
    async fn classify(&self, post: &Post) -> Result<Vec<String>, CoreError> {
        Ok(classify_post(post, &self.taxonomy))
    }
}

/// Spends `cost` tokens from a shared budget before each classification and
/// refunds them when the wrapped classifier fails.
#[derive(Debug, Clone)]
pub struct BudgetedClassifier<C> {
    inner: C,
    budget: SharedBudget,
    cost: u64,
    cancel: CancellationSignal,
}

impl<C: PostClassifier> BudgetedClassifier<C> {
    pub fn new(inner: C, budget: SharedBudget, cost: u64, cancel: CancellationSignal) -> Self {
        Self {
            inner,
            budget,
            cost,
            cancel,
        }
    }
}

impl<C: PostClassifier> PostClassifier for BudgetedClassifier<C> {
    async fn classify(&self, post: &Post) -> Result<Vec<String>, CoreError> {
        self.budget.acquire(self.cost, &self.cancel).await?;
        match self.inner.classify(post).await {
            Ok(labels) => Ok(labels),
            Err(error) => {
                debug!(
                    "Refunding {} tokens after failed classification of {}",
                    self.cost, post.id
                );
                self.budget.release(self.cost).await;
                Err(error)
            }
        }
    }
}
