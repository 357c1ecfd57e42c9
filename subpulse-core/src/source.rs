use crate::{CoreError, Post};
use std::future::Future;

/// Supplies batches of posts for a subreddit. Implementations may return
/// fewer posts than requested and report throttling as
/// [`CoreError::RateLimited`].
pub trait PostSource: Send + Sync {
    fn fetch_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Post>, CoreError>> + Send;
}
