use std::time::Duration;
use subpulse_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, RedditApiError,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "DATABASE");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "user_agent".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    assert_eq!(
        CoreError::taxonomy("no categories defined").error_code(),
        "TAXONOMY_MISCONFIGURED"
    );
    assert_eq!(CoreError::Cancelled.error_code(), "CANCELLED");
}

#[test]
fn test_retryable_errors() {
    let rate_limited = CoreError::RateLimited {
        message: "slow down".to_string(),
        retry_after: Some(Duration::from_secs(60)),
    };
    assert!(rate_limited.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    // Core analysis failures never retry.
    assert!(!CoreError::invalid_input("missing id").is_retryable());
    assert!(!CoreError::taxonomy("empty").is_retryable());
    assert!(!CoreError::Cancelled.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::RateLimited {
        message: "slow down".to_string(),
        retry_after: Some(Duration::from_secs(42)),
    };
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(42)));

    let unspecified = CoreError::RateLimited {
        message: "slow down".to_string(),
        retry_after: None,
    };
    assert_eq!(unspecified.retry_after(), Some(Duration::from_secs(60)));

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    assert_eq!(CoreError::invalid_input("bad").retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "nosuchplace".to_string(),
    });
    assert!(not_found.user_friendly_message().contains("nosuchplace"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "database_url".to_string(),
    });
    assert!(config_error.user_friendly_message().contains("database_url"));

    let taxonomy = CoreError::taxonomy("category 'Money Talk' has no keywords");
    assert!(taxonomy.user_friendly_message().contains("Money Talk"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::RedditApi(RedditApiError::RequestTimeout);

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
