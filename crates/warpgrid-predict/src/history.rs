//! Bounded histories kept by predictors.
//!
//! `MetricHistory` is a FIFO: samples are appended at the back and evicted
//! from the front, never reordered. `ReplicaHistory` instead sorts
//! newest-first before truncating, so entries recorded out of order are
//! still evicted oldest-first by timestamp.

use std::collections::VecDeque;

use warpgrid_forecast::{TimestampedMetric, TimestampedReplicas};

#[derive(Debug, Clone, Default)]
pub struct MetricHistory {
    samples: VecDeque<TimestampedMetric>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: TimestampedMetric) {
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Evict the oldest samples until at most `max` remain.
    ///
    /// Returns the number of evicted samples.
    pub fn truncate_to(&mut self, max: usize) -> usize {
        let excess = self.samples.len().saturating_sub(max);
        self.samples.drain(..excess);
        excess
    }

    /// The whole history, oldest first, as one slice.
    pub fn as_slice(&mut self) -> &[TimestampedMetric] {
        self.samples.make_contiguous()
    }

    /// The newest `n` samples (or fewer), oldest first.
    pub fn latest(&mut self, n: usize) -> &[TimestampedMetric] {
        let all = self.samples.make_contiguous();
        &all[all.len().saturating_sub(n)..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampedMetric> {
        self.samples.iter()
    }
}

impl Extend<TimestampedMetric> for MetricHistory {
    fn extend<I: IntoIterator<Item = TimestampedMetric>>(&mut self, iter: I) {
        self.samples.extend(iter);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplicaHistory {
    entries: Vec<TimestampedReplicas>,
}

impl ReplicaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TimestampedReplicas) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep the `max` entries with the latest timestamps, newest first.
    ///
    /// Returns the number of evicted entries.
    pub fn prune(&mut self, max: usize) -> usize {
        // Stable, so entries sharing a timestamp keep their relative order.
        self.entries.sort_by(|a, b| b.time.cmp(&a.time));
        let excess = self.entries.len().saturating_sub(max);
        self.entries.truncate(max);
        excess
    }

    pub fn as_slice(&self) -> &[TimestampedReplicas] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn metric(secs: i64) -> TimestampedMetric {
        TimestampedMetric::new(secs as f64, Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn replicas(secs: i64, replicas: i32) -> TimestampedReplicas {
        TimestampedReplicas::new(replicas, Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn values(history: &MetricHistory) -> Vec<f64> {
        history.iter().map(|m| m.value).collect()
    }

    #[test]
    fn truncate_keeps_newest_in_order() {
        let mut history = MetricHistory::new();
        history.extend((1..=6).map(metric));

        assert_eq!(history.truncate_to(4), 2);
        assert_eq!(values(&history), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn truncate_within_bound_is_noop() {
        let mut history = MetricHistory::new();
        history.extend((1..=2).map(metric));

        assert_eq!(history.truncate_to(5), 0);
        assert_eq!(values(&history), vec![1.0, 2.0]);
    }

    #[test]
    fn truncate_is_idempotent() {
        let mut history = MetricHistory::new();
        history.extend((1..=10).map(metric));

        history.truncate_to(3);
        let once = values(&history);
        history.truncate_to(3);
        assert_eq!(values(&history), once);
    }

    #[test]
    fn latest_returns_tail_after_wraparound() {
        let mut history = MetricHistory::with_capacity(4);
        history.extend((1..=4).map(metric));
        history.truncate_to(2);
        // Pushing after a front eviction wraps the ring buffer.
        history.extend((5..=7).map(metric));

        let tail: Vec<f64> = history.latest(3).iter().map(|m| m.value).collect();
        assert_eq!(tail, vec![5.0, 6.0, 7.0]);
        assert_eq!(history.latest(100).len(), 5);
        assert_eq!(history.as_slice().first().unwrap().value, 3.0);
    }

    #[test]
    fn replica_prune_keeps_latest_newest_first() {
        let mut history = ReplicaHistory::new();
        for (secs, n) in [(30, 3), (10, 1), (50, 5), (20, 2), (40, 4)] {
            history.push(replicas(secs, n));
        }

        assert_eq!(history.prune(3), 2);
        let kept: Vec<i32> = history.as_slice().iter().map(|r| r.replicas).collect();
        assert_eq!(kept, vec![5, 4, 3]);
    }

    #[test]
    fn replica_prune_under_bound_still_orders() {
        let mut history = ReplicaHistory::new();
        history.push(replicas(10, 1));
        history.push(replicas(20, 2));

        assert_eq!(history.prune(5), 0);
        let kept: Vec<i32> = history.as_slice().iter().map(|r| r.replicas).collect();
        assert_eq!(kept, vec![2, 1]);
    }
}
