use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::retry::{RetryConfig, RetryExecutor};
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use subpulse_core::{CoreError, Post, PostSource, RedditApiError};
use tracing::{debug, error, info, warn};
use url::Url;

const REDDIT_PUBLIC_BASE: &str = "https://www.reddit.com";

/// Largest page the listing endpoint will serve.
pub const MAX_LISTING_LIMIT: u32 = 100;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub stickied: bool,
}

impl TryFrom<RedditPostData> for Post {
    type Error = CoreError;

    fn try_from(data: RedditPostData) -> Result<Self, Self::Error> {
        let post = Post {
            id: data.id,
            title: data.title,
            body: data.selftext,
            score: data.score,
            num_comments: data.num_comments,
            created_utc: data.created_utc as i64,
            permalink: data.permalink,
            author: data.author,
            url: data.url,
        };
        post.validate()?;
        Ok(post)
    }
}

/// Community names are 1-21 characters of letters, digits and underscores.
pub fn validate_subreddit_name(name: &str) -> Result<(), CoreError> {
    let valid = !name.is_empty()
        && name.len() <= 21
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_input(format!(
            "'{}' is not a valid subreddit name",
            name
        )))
    }
}

/// Maps a non-success status to the error callers match on.
pub fn status_error(
    status: StatusCode,
    retry_after: Option<&HeaderValue>,
    subreddit: &str,
) -> CoreError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let delay = retry_after
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            warn!("Rate limited on r/{}, retry after {:?}", subreddit, delay);
            CoreError::RateLimited {
                message: format!("listing for r/{} was throttled", subreddit),
                retry_after: Some(delay),
            }
        }
        StatusCode::NOT_FOUND => CoreError::RedditApi(RedditApiError::SubredditNotFound {
            subreddit: subreddit.to_string(),
        }),
        StatusCode::FORBIDDEN => CoreError::RedditApi(RedditApiError::Forbidden {
            resource: format!("r/{}", subreddit),
        }),
        status if status.is_server_error() => {
            CoreError::RedditApi(RedditApiError::ServerError {
                status_code: status.as_u16(),
            })
        }
        status => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("unexpected status {} for r/{}", status, subreddit),
        }),
    }
}

/// Decodes a listing body into validated posts.
pub fn parse_listing(body: &str, subreddit: &str) -> Result<Vec<Post>, CoreError> {
    let listing: RedditListing<RedditPostData> = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse listing for r/{}: {}", subreddit, e);
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Failed to parse posts for r/{}", subreddit),
        })
    })?;

    listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .map(|child| Post::try_from(child.data))
        .collect()
}

/// Fetches hot posts from the public JSON listing of a community.
#[derive(Debug)]
pub struct RedditClient {
    http_client: Client,
    base_url: Url,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    user_agent: String,
}

impl RedditClient {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, CoreError> {
        let user_agent = user_agent.into();
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = Url::parse(REDDIT_PUBLIC_BASE).map_err(|e| CoreError::Internal {
            message: format!("invalid base url: {}", e),
        })?;

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_public())),
            retry: RetryExecutor::new(RetryConfig::reddit()),
            user_agent,
        })
    }

    /// Points the client at another host, e.g. a mirror or a local stub.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, CoreError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| CoreError::invalid_input(format!("invalid base url: {}", e)))?;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = url;
        Ok(self)
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn listing_url(&self, subreddit: &str, limit: u32) -> Result<Url, CoreError> {
        validate_subreddit_name(subreddit)?;
        let mut url = self
            .base_url
            .join(&format!("r/{}/hot.json", subreddit))
            .map_err(|e| CoreError::invalid_input(format!("invalid listing url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.clamp(1, MAX_LISTING_LIMIT).to_string());
        Ok(url)
    }

    async fn fetch_once(&self, url: &Url, subreddit: &str) -> Result<Vec<Post>, CoreError> {
        let permit = self.rate_limiter.acquire_permit().await?;
        debug!(
            "Acquired rate limit permit for r/{} after {:?}",
            subreddit, permit.queue_wait_time
        );

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(
                status,
                response.headers().get(RETRY_AFTER),
                subreddit,
            ));
        }

        let body = response.text().await?;
        parse_listing(&body, subreddit)
    }

    pub async fn get_subreddit_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<Post>, CoreError> {
        let url = self.listing_url(subreddit, limit)?;
        info!("Fetching listing {}", url);

        let url = &url;
        let result = self
            .retry
            .execute("subreddit_listing", move || self.fetch_once(url, subreddit))
            .await;
        self.log_request_health().await;
        let posts = result?;

        info!("Retrieved {} posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    async fn log_request_health(&self) {
        let status: RateLimitStatus = self.rate_limiter.status().await;
        if status.is_near_limit() {
            warn!(
                "Listing rate limit {:.0}% used ({} of {} requests per {:?})",
                status.utilization_percentage(),
                status.max_tokens.saturating_sub(status.available_tokens),
                status.requests_per_window,
                status.window
            );
        }

        let metrics = self.retry.get_metrics();
        debug!(
            "Listing requests: {} retries, {} recovered, {} failed, {} blocked by circuit breaker ({:?})",
            metrics.total_retries,
            metrics.successful_retries,
            metrics.failed_operations,
            metrics.circuit_breaker_trips,
            self.retry.get_circuit_breaker_state()
        );
    }
}

impl PostSource for RedditClient {
    async fn fetch_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        self.get_subreddit_posts(subreddit, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_b2",
            "before": null,
            "dist": 3,
            "children": [
                {"kind": "t3", "data": {
                    "id": "a1", "title": "Any tool for invoices?", "selftext": "Looking for one",
                    "author": "alice", "subreddit": "smallbusiness", "url": "https://example.com",
                    "permalink": "/r/smallbusiness/comments/a1/any_tool/", "created_utc": 1700000000.0,
                    "score": 12, "num_comments": 4, "stickied": false, "over_18": false
                }},
                {"kind": "t1", "data": {"id": "c9", "body": "a comment"}},
                {"kind": "t3", "data": {
                    "id": "b2", "title": "Sick of chargebacks",
                    "author": "bob", "permalink": "/r/smallbusiness/comments/b2/sick/",
                    "created_utc": 1700003600.5, "score": -3, "num_comments": 0
                }}
            ]
        }
    }"#;

    #[test]
    fn test_parse_listing_keeps_posts_only() {
        let posts = parse_listing(LISTING, "smallbusiness").unwrap();
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].id, "a1");
        assert_eq!(posts[0].body, "Looking for one");
        assert_eq!(posts[0].created_utc, 1700000000);
        assert_eq!(
            posts[0].link(),
            "https://reddit.com/r/smallbusiness/comments/a1/any_tool/"
        );

        assert_eq!(posts[1].id, "b2");
        assert_eq!(posts[1].body, "");
        assert_eq!(posts[1].score, -3);
        assert_eq!(posts[1].created_utc, 1700003600);
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        let result = parse_listing("<html>blocked</html>", "rust");
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_post_without_id_is_rejected() {
        let body = r#"{"kind":"Listing","data":{"children":[
            {"kind":"t3","data":{"title":"no id here"}}
        ]}}"#;
        assert!(matches!(
            parse_listing(body, "rust"),
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        let throttled = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(&HeaderValue::from_static("12")),
            "rust",
        );
        match throttled {
            CoreError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        let no_header = status_error(StatusCode::TOO_MANY_REQUESTS, None, "rust");
        assert!(matches!(
            no_header,
            CoreError::RateLimited { retry_after: Some(d), .. } if d == DEFAULT_RETRY_AFTER
        ));

        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, None, "rust"),
            CoreError::RedditApi(RedditApiError::SubredditNotFound { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, "rust"),
            CoreError::RedditApi(RedditApiError::Forbidden { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, None, "rust"),
            CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 })
        ));
    }

    #[test]
    fn test_subreddit_name_validation() {
        assert!(validate_subreddit_name("rust").is_ok());
        assert!(validate_subreddit_name("Small_Business2").is_ok());
        assert!(validate_subreddit_name("").is_err());
        assert!(validate_subreddit_name("r/rust").is_err());
        assert!(validate_subreddit_name("this_name_is_far_too_long").is_err());
    }

    #[tokio::test]
    async fn test_listing_url() {
        let client = RedditClient::new("subpulse-test/1.0").unwrap();
        assert_eq!(client.user_agent(), "subpulse-test/1.0");

        let url = client.listing_url("rust", 25).unwrap();
        assert_eq!(url.as_str(), "https://www.reddit.com/r/rust/hot.json?limit=25");

        let capped = client.listing_url("rust", 500).unwrap();
        assert_eq!(capped.query(), Some("limit=100"));

        let local = RedditClient::new("subpulse-test/1.0")
            .unwrap()
            .with_base_url("http://127.0.0.1:9/")
            .unwrap();
        assert_eq!(
            local.listing_url("rust", 5).unwrap().as_str(),
            "http://127.0.0.1:9/r/rust/hot.json?limit=5"
        );
    }

    #[test]
    fn test_base_url_path_is_kept() {
        let mirror = RedditClient::new("subpulse-test/1.0")
            .unwrap()
            .with_base_url("http://mirror.local/reddit")
            .unwrap();
        assert_eq!(
            mirror.listing_url("rust", 5).unwrap().as_str(),
            "http://mirror.local/reddit/r/rust/hot.json?limit=5"
        );

        let slashed = RedditClient::new("subpulse-test/1.0")
            .unwrap()
            .with_base_url("http://mirror.local/reddit/")
            .unwrap();
        assert_eq!(
            slashed.listing_url("rust", 5).unwrap().as_str(),
            "http://mirror.local/reddit/r/rust/hot.json?limit=5"
        );
    }

    #[tokio::test]
    async fn test_invalid_name_fails_before_network() {
        let client = RedditClient::new("subpulse-test/1.0").unwrap();
        let result = client.fetch_posts("not a name", 10).await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
    }
}
