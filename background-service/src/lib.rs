use analysis_engine::{
    Analyzer, BudgetedClassifier, KeywordClassifier, PostClassifier, SharedBudget,
};
use database::ReportStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use subpulse_core::{
    subreddit_key, AnalysisReport, AppConfig, CancellationSignal, Clock, CoreError, ErrorExt,
    FreshnessPolicy, PostSource, SystemClock,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};


/// Result of asking for a subreddit's report.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub report: AnalysisReport,
    /// True when the report was recomputed from freshly fetched posts.
    pub refreshed: bool,
    /// False when a recomputed report could not be written to the store.
    pub persisted: bool,
}

/// Fetch, analyze and persist workflow gated by report age.
///
/// Posts are labelled by the local keyword classifier unless another
/// classifier is installed with [`with_classifier`](Self::with_classifier);
/// only an installed classifier is charged against the token budget.
pub struct RefreshService<S, R, C = KeywordClassifier> {
    source: Arc<S>,
    store: Arc<R>,
    analyzer: Arc<Analyzer>,
    classifier: C,
    budgeted: bool,
    budget: SharedBudget,
    cost_per_post: u64,
    clock: Arc<dyn Clock>,
    refetch: FreshnessPolicy,
    auto_refresh: FreshnessPolicy,
    auto_refresh_interval: Duration,
    post_limit: u32,
}

impl<S: PostSource, R: ReportStore> RefreshService<S, R, KeywordClassifier> {
    pub fn from_config(
        config: &AppConfig,
        source: Arc<S>,
        store: Arc<R>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let analyzer = Analyzer::from_config(config)?.with_clock(Arc::clone(&clock));
        let budget = SharedBudget::from_config(&config.budget, Arc::clone(&clock));

        let classifier = analyzer.keyword_classifier();

        Ok(Self {
            source,
            store,
            analyzer: Arc::new(analyzer),
            classifier,
            budgeted: false,
            budget,
            cost_per_post: config.budget.cost_per_post,
            clock,
            refetch: FreshnessPolicy::new(config.refetch_threshold_secs),
            auto_refresh: FreshnessPolicy::new(config.auto_refresh_threshold_secs),
            auto_refresh_interval: Duration::from_secs(config.auto_refresh_interval_secs),
            post_limit: config.post_limit,
        })
    }

    pub fn with_system_clock(
        config: &AppConfig,
        source: Arc<S>,
        store: Arc<R>,
    ) -> Result<Self, CoreError> {
        Self::from_config(config, source, store, Arc::new(SystemClock))
    }

    /// Replaces the keyword classifier with an external one. Every post it
    /// classifies spends `cost_per_post` tokens from the shared budget.
    pub fn with_classifier<C>(self, classifier: C) -> RefreshService<S, R, C>
    where
        C: PostClassifier + Clone,
    {
        RefreshService {
            source: self.source,
            store: self.store,
            analyzer: self.analyzer,
            classifier,
            budgeted: true,
            budget: self.budget,
            cost_per_post: self.cost_per_post,
            clock: self.clock,
            refetch: self.refetch,
            auto_refresh: self.auto_refresh,
            auto_refresh_interval: self.auto_refresh_interval,
            post_limit: self.post_limit,
        }
    }
}

impl<S, R, C> RefreshService<S, R, C>
where
    S: PostSource,
    R: ReportStore,
    C: PostClassifier + Clone,
{
    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    pub fn budget(&self) -> &SharedBudget {
        &self.budget
    }

    /// True when no report is stored or the stored one is older than the
    /// re-fetch threshold.
    pub async fn needs_refresh(&self, name: &str) -> Result<bool, CoreError> {
        let stored = self.store.get(name).await?;
        Ok(self
            .refetch
            .is_stale(stored.map(|s| s.last_updated), self.clock.now()))
    }

    /// Fetches, analyzes and stores a new report regardless of age.
    ///
    /// A store failure does not discard the computed report; the outcome
    /// carries `persisted: false` instead.
    pub async fn refresh(
        &self,
        name: &str,
        cancel: &CancellationSignal,
    ) -> Result<RefreshOutcome, CoreError> {
        let name = name.trim();
        cancel.check()?;
        info!("Refreshing r/{}", name);

        let posts = tokio::select! {
            _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            posts = self.source.fetch_posts(name, self.post_limit) => posts?,
        };
        debug!("Fetched {} posts for r/{}", posts.len(), name);

        let posts = Arc::new(posts);
        let report = if self.budgeted {
            let classifier = BudgetedClassifier::new(
                self.classifier.clone(),
                self.budget.clone(),
                self.cost_per_post,
                cancel.clone(),
            );
            self.analyzer
                .analyze_concurrent(name, posts, &classifier, cancel)
                .await?
        } else {
            self.analyzer
                .analyze_concurrent(name, posts, &self.classifier, cancel)
                .await?
        };

        let persisted = match self.store.put(name, &report).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store report for r/{}: {}", name, e);
                false
            }
        };

        info!(
            "Analyzed {} posts for r/{} (persisted: {})",
            report.post_count, name, persisted
        );
        Ok(RefreshOutcome {
            report,
            refreshed: true,
            persisted,
        })
    }

    /// Returns the stored report while it is fresh, otherwise refreshes.
    /// `force` skips the age check.
    pub async fn ensure_fresh(
        &self,
        name: &str,
        force: bool,
        cancel: &CancellationSignal,
    ) -> Result<RefreshOutcome, CoreError> {
        if !force {
            if let Some(stored) = self.store.get(name).await? {
                if !self.refetch.is_stale(Some(stored.last_updated), self.clock.now()) {
                    debug!("Using stored report for r/{}", subreddit_key(name));
                    return Ok(RefreshOutcome {
                        report: stored.report,
                        refreshed: false,
                        persisted: true,
                    });
                }
            }
        }
        self.refresh(name, cancel).await
    }

    /// One auto-refresh pass: refreshes every name whose stored report is
    /// missing or older than the auto-refresh threshold. Failures for one
    /// name are logged and do not stop the pass. Returns the refreshed names.
    pub async fn refresh_due(
        &self,
        names: &[String],
        cancel: &CancellationSignal,
    ) -> Result<Vec<String>, CoreError> {
        let mut refreshed = Vec::new();
        for name in names {
            cancel.check()?;

            let last_updated = match self.store.get(name).await {
                Ok(stored) => stored.map(|s| s.last_updated),
                Err(e) => {
                    e.log_warn();
                    None
                }
            };
            if !self.auto_refresh.is_stale(last_updated, self.clock.now()) {
                continue;
            }

            match self.refresh(name, cancel).await {
                Ok(_) => refreshed.push(name.clone()),
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    e.log_warn();
                }
            }
        }
        Ok(refreshed)
    }

    /// Runs [`refresh_due`](Self::refresh_due) on every tick of the
    /// auto-refresh interval until `cancel` fires.
    pub async fn run_auto_refresh(
        &self,
        names: &[String],
        cancel: &CancellationSignal,
    ) -> Result<(), CoreError> {
        let mut ticker = interval(self.auto_refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Auto refresh every {:?} for {} subreddits",
            self.auto_refresh_interval,
            names.len()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.refresh_due(names, cancel).await {
                Ok(refreshed) if !refreshed.is_empty() => {
                    info!("Auto refresh updated {:?}", refreshed);
                }
                Ok(_) => debug!("Auto refresh: nothing stale"),
                Err(CoreError::Cancelled) => break,
                Err(e) => return Err(e),
            }
        }

        info!("Auto refresh stopped");
        Ok(())
    }
}
