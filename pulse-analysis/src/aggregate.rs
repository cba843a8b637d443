//! Fixed-window time bucketing of analyzed posts.
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::analyzer::AnalyzedPost;

/// Scores within this distance of zero are neutral.
pub const NEUTRAL_BAND: f64 = 0.05;
pub const DEFAULT_INTERVAL_COUNT: usize = 12;
pub const DEFAULT_INTERVAL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentClass {
    Positive,
    Negative,
    Neutral,
}

impl SentimentClass {
    /// ```
    /// use pulse_analysis::SentimentClass;
    ///
    /// assert_eq!(SentimentClass::of(0.06), SentimentClass::Positive);
    /// assert_eq!(SentimentClass::of(0.05), SentimentClass::Neutral);
    /// assert_eq!(SentimentClass::of(-0.05), SentimentClass::Neutral);
    /// assert_eq!(SentimentClass::of(-0.051), SentimentClass::Negative);
    /// ```
    pub fn of(score: f64) -> Self {
        if score > NEUTRAL_BAND {
            Self::Positive
        } else if score < -NEUTRAL_BAND {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Counts for one interval. `positive + negative + neutral == total` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    #[serde(with = "time::serde::rfc3339")]
    pub interval_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub interval_end: OffsetDateTime,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total: usize,
}

impl TimeBucket {
    fn empty(interval_start: OffsetDateTime, interval_end: OffsetDateTime) -> Self {
        Self {
            interval_start,
            interval_end,
            positive: 0,
            negative: 0,
            neutral: 0,
            total: 0,
        }
    }

    fn count(&mut self, class: SentimentClass) {
        match class {
            SentimentClass::Positive => self.positive += 1,
            SentimentClass::Negative => self.negative += 1,
            SentimentClass::Neutral => self.neutral += 1,
        }
        self.total += 1;
    }
}

/// What to do with posts that carry no timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestamps {
    /// Leave them out of every bucket.
    #[default]
    Drop,
    /// Give them surrogate times spread evenly over the window, in input order.
    Spread,
}

pub struct TimeSeriesAggregator {
    interval_count: usize,
    interval_width: Duration,
    missing: MissingTimestamps,
}

impl Default for TimeSeriesAggregator {
    fn default() -> Self {
        Self::new(
            DEFAULT_INTERVAL_COUNT,
            Duration::minutes(DEFAULT_INTERVAL_MINUTES),
        )
    }
}

impl TimeSeriesAggregator {
    pub fn new(interval_count: usize, interval_width: Duration) -> Self {
        Self {
            interval_count,
            interval_width,
            missing: MissingTimestamps::Drop,
        }
    }

    pub fn with_missing_timestamps(mut self, policy: MissingTimestamps) -> Self {
        self.missing = policy;
        self
    }

    /// Buckets ending at the current UTC time.
    pub fn aggregate(&self, posts: &[AnalyzedPost]) -> Vec<TimeBucket> {
        self.aggregate_at(posts, OffsetDateTime::now_utc())
    }

    /// Buckets for the window ending at `now`, oldest first.
    ///
    /// Intervals are half-open `[start, end)` except the newest, which also holds `now`.
    /// Posts from the future or older than the window are dropped. A degenerate setup
    /// (no intervals, non-positive width, window past the representable range) yields
    /// no buckets.
    ///
    /// ```
    /// use pulse_analysis::{AnalyzedPost, TimeSeriesAggregator};
    /// use time::{macros::datetime, Duration};
    ///
    /// let now = datetime!(2024-05-01 12:00 UTC);
    /// let post = AnalyzedPost {
    ///     title: "up".into(),
    ///     title_sentiment: 0.6,
    ///     avg_comment_sentiment: 0.0,
    ///     url: "https://example.com".into(),
    ///     created_at: Some(now - Duration::minutes(15)),
    /// };
    /// let buckets = TimeSeriesAggregator::new(3, Duration::minutes(10)).aggregate_at(&[post], now);
    /// assert_eq!(buckets.len(), 3);
    /// assert_eq!(buckets[1].interval_start, datetime!(2024-05-01 11:40 UTC));
    /// assert_eq!(buckets[1].positive, 1);
    /// ```
    pub fn aggregate_at(&self, posts: &[AnalyzedPost], now: OffsetDateTime) -> Vec<TimeBucket> {
        let count = self.interval_count;
        let width = self.interval_width;
        if count == 0 || !width.is_positive() {
            return Vec::new();
        }
        let Some(window) = i32::try_from(count).ok().and_then(|n| width.checked_mul(n)) else {
            return Vec::new();
        };
        let Some(window_start) = now.checked_sub(window) else {
            return Vec::new();
        };

        let mut buckets = Vec::with_capacity(count);
        let mut start = window_start;
        for _ in 0..count {
            let end = start + width;
            buckets.push(TimeBucket::empty(start, end));
            start = end;
        }

        let width_ns = width.whole_nanoseconds();
        let window_ns = window.whole_nanoseconds();
        let undated = posts.iter().filter(|p| p.created_at.is_none()).count() as i128;
        let mut undated_seen = 0i128;

        for post in posts {
            let age_ns = match (post.created_at, self.missing) {
                (Some(at), _) => (now - at).whole_nanoseconds(),
                (None, MissingTimestamps::Drop) => continue,
                (None, MissingTimestamps::Spread) => {
                    let age = window_ns * (2 * undated_seen + 1) / (2 * undated);
                    undated_seen += 1;
                    age
                }
            };
            if age_ns < 0 || age_ns > window_ns {
                continue;
            }
            // Bucket k back from the newest covers ages (k*w, (k+1)*w]; age 0 is the newest.
            let back = if age_ns == 0 { 0 } else { (age_ns - 1) / width_ns };
            let Ok(back) = usize::try_from(back) else {
                continue;
            };
            if back >= count {
                continue;
            }
            buckets[count - 1 - back].count(SentimentClass::of(post.title_sentiment));
        }

        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    fn at(score: f64, created_at: Option<OffsetDateTime>) -> AnalyzedPost {
        AnalyzedPost {
            title: "t".into(),
            title_sentiment: score,
            avg_comment_sentiment: 0.0,
            url: "https://example.com".into(),
            created_at,
        }
    }

    fn default_buckets(posts: &[AnalyzedPost]) -> Vec<TimeBucket> {
        TimeSeriesAggregator::default().aggregate_at(posts, NOW)
    }

    #[test]
    fn three_posts_at_now_fill_the_newest_bucket() {
        let posts = [at(0.9, Some(NOW)), at(-0.9, Some(NOW)), at(0.0, Some(NOW))];
        let buckets = default_buckets(&posts);

        assert_eq!(buckets.len(), 12);
        let newest = &buckets[11];
        assert_eq!(
            (newest.positive, newest.negative, newest.neutral, newest.total),
            (1, 1, 1, 3)
        );
        assert!(buckets[..11].iter().all(|b| b.total == 0));
    }

    #[test]
    fn buckets_partition_the_window() {
        let buckets = default_buckets(&[]);
        assert_eq!(buckets[0].interval_start, NOW - Duration::minutes(120));
        assert_eq!(buckets[11].interval_end, NOW);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].interval_end, pair[1].interval_start);
            assert!(pair[0].interval_start < pair[1].interval_start);
        }
        for b in &buckets {
            assert_eq!(b.interval_end - b.interval_start, Duration::minutes(10));
        }
    }

    #[test]
    fn boundaries_are_half_open() {
        let posts = [
            // Exactly at a boundary: start of the newer bucket.
            at(0.5, Some(NOW - Duration::minutes(10))),
            // Exactly the window start: oldest bucket.
            at(0.5, Some(NOW - Duration::minutes(120))),
            // Just outside.
            at(0.5, Some(NOW - Duration::minutes(120) - Duration::nanoseconds(1))),
            // Future.
            at(0.5, Some(NOW + Duration::seconds(1))),
        ];
        let buckets = default_buckets(&posts);
        assert_eq!(buckets[11].total, 1);
        assert_eq!(buckets[10].total, 0);
        assert_eq!(buckets[0].total, 1);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<usize>(), 2);
    }

    #[test]
    fn totals_match_posts_inside_window() {
        let posts: Vec<_> = (0..40)
            .map(|i| at(i as f64 / 20.0 - 1.0, Some(NOW - Duration::minutes(i * 4))))
            .collect();
        let inside = posts
            .iter()
            .filter(|p| p.created_at.is_some_and(|t| NOW - t <= Duration::minutes(120)))
            .count();
        let buckets = default_buckets(&posts);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<usize>(), inside);
        for b in &buckets {
            assert_eq!(b.positive + b.negative + b.neutral, b.total);
        }
    }

    #[test]
    fn undated_posts_are_dropped_by_default() {
        let buckets = default_buckets(&[at(0.9, None), at(0.9, Some(NOW))]);
        assert_eq!(buckets.iter().map(|b| b.total).sum::<usize>(), 1);
    }

    #[test]
    fn spread_policy_distributes_undated_posts_evenly() {
        let posts: Vec<_> = (0..12).map(|_| at(0.9, None)).collect();
        let buckets = TimeSeriesAggregator::default()
            .with_missing_timestamps(MissingTimestamps::Spread)
            .aggregate_at(&posts, NOW);
        assert!(buckets.iter().all(|b| b.total == 1 && b.positive == 1));

        let again = TimeSeriesAggregator::default()
            .with_missing_timestamps(MissingTimestamps::Spread)
            .aggregate_at(&posts, NOW);
        assert_eq!(buckets, again);
    }

    #[test]
    fn degenerate_windows_yield_nothing() {
        let posts = [at(0.9, Some(NOW))];
        assert!(TimeSeriesAggregator::new(0, Duration::minutes(10))
            .aggregate_at(&posts, NOW)
            .is_empty());
        assert!(TimeSeriesAggregator::new(12, Duration::ZERO)
            .aggregate_at(&posts, NOW)
            .is_empty());
        assert!(TimeSeriesAggregator::new(12, Duration::minutes(-5))
            .aggregate_at(&posts, NOW)
            .is_empty());
        assert!(TimeSeriesAggregator::new(usize::MAX, Duration::weeks(52))
            .aggregate_at(&posts, NOW)
            .is_empty());
    }

    #[test]
    fn serializes_rfc3339_bounds() {
        let buckets = TimeSeriesAggregator::new(1, Duration::minutes(10)).aggregate_at(&[], NOW);
        let v = serde_json::to_value(&buckets[0]).unwrap();
        assert_eq!(v["interval_start"], "2024-05-01T11:50:00Z");
        assert_eq!(v["interval_end"], "2024-05-01T12:00:00Z");
        assert_eq!(v["total"], 0);
    }
}
