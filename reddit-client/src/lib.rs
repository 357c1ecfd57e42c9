pub mod api;
pub mod rate_limiter;
pub mod retry;

pub use api::{RedditClient, RedditListing, RedditPostData};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor};
