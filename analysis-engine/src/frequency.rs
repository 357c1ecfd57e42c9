use chrono::{DateTime, Timelike};
use subpulse_core::{Post, PostFrequency};

/// Buckets posts by UTC hour of day. The most active hour is the earliest
/// hour holding the highest count.
pub fn analyze_post_frequency(posts: &[Post]) -> PostFrequency {
    let mut by_hour = [0u32; 24];
    for post in posts {
        if let Some(created) = DateTime::from_timestamp(post.created_utc, 0) {
            by_hour[created.hour() as usize] += 1;
        }
    }

    let mut most_active_hour = 0;
    for (hour, count) in by_hour.iter().enumerate() {
        if *count > by_hour[most_active_hour] {
            most_active_hour = hour;
        }
    }

    PostFrequency {
        by_hour,
        most_active_hour: most_active_hour as u8,
    }
}
