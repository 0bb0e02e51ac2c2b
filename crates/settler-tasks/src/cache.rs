//! Selection cache — a weighted set of jobs for one roulette-wheel draw.
//!
//! A cache is built for one worker at one instant and then reused for the
//! rest of that tick. Entries keep insertion order, so a draw at a fixed
//! `r` is deterministic for a given snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::MarsTime;
use crate::job::{clamp_score, TaskJob};

/// Weighted jobs plus the running total of their scores.
#[derive(Debug, Clone)]
pub struct TaskCache {
    context: String,
    entries: Vec<(Arc<dyn TaskJob>, f64)>,
    keys: HashSet<String>,
    total: f64,
    created_on: Option<MarsTime>,
}

impl TaskCache {
    /// `context` is free text saying why this set was built, e.g. "duty".
    pub fn new(context: &str, created_on: Option<MarsTime>) -> Self {
        Self {
            context: context.to_string(),
            entries: Vec::new(),
            keys: HashSet::new(),
            total: 0.0,
            created_on,
        }
    }

    /// Add a job at its own score.
    pub fn put(&mut self, job: Arc<dyn TaskJob>) -> bool {
        let score = job.score();
        self.put_with_score(job, score)
    }

    /// Add a job at an explicit score. The score is clamped first; jobs
    /// that end up at zero, and jobs whose key is already present, are
    /// not added.
    pub fn put_with_score(&mut self, job: Arc<dyn TaskJob>, score: f64) -> bool {
        let score = clamp_score(score);
        if score <= 0.0 {
            return false;
        }
        if !self.keys.insert(job.key()) {
            log::debug!("{} cache already holds '{}'", self.context, job.description());
            return false;
        }
        self.entries.push((job, score));
        self.total += score;
        true
    }

    /// Remove the entry with `key`, returning its job.
    pub fn remove(&mut self, key: &str) -> Option<Arc<dyn TaskJob>> {
        let index = self.entries.iter().position(|(job, _)| job.key() == key)?;
        let (job, _) = self.entries.remove(index);
        self.keys.remove(key);
        self.total = self.entries.iter().map(|(_, w)| w).sum();
        Some(job)
    }

    /// The entry whose cumulative weight range `[start, start + w)`
    /// contains `r`. Values past the end (rounding) land on the last entry.
    pub fn draw_at(&self, r: f64) -> Option<&Arc<dyn TaskJob>> {
        let mut r = r.max(0.0);
        for (job, weight) in &self.entries {
            if r < *weight {
                return Some(job);
            }
            r -= weight;
        }
        self.entries.last().map(|(job, _)| job)
    }

    /// Weighted-random pick; `None` when the cache holds no weight.
    pub fn random_draw(&self, rng: &mut impl rand::Rng) -> Option<Arc<dyn TaskJob>> {
        if self.entries.is_empty() || self.total <= 0.0 {
            return None;
        }
        let r = rng.gen_range(0.0..self.total);
        self.draw_at(r).cloned()
    }

    /// Reusable at `now`: built at exactly this instant and not empty.
    pub fn is_valid_for(&self, now: MarsTime) -> bool {
        self.created_on == Some(now) && !self.is_empty()
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn created_on(&self) -> Option<MarsTime> {
        self.created_on
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in draw order with their stored weights.
    pub fn entries(&self) -> impl Iterator<Item = (&Arc<dyn TaskJob>, f64)> {
        self.entries.iter().map(|(job, w)| (job, *w))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Debug)]
    struct Fixed {
        key: String,
        score: f64,
    }

    impl TaskJob for Fixed {
        fn score(&self) -> f64 {
            self.score
        }

        fn description(&self) -> &str {
            &self.key
        }

        fn key(&self) -> String {
            self.key.clone()
        }
    }

    fn job(key: &str, score: f64) -> Arc<dyn TaskJob> {
        Arc::new(Fixed {
            key: key.to_string(),
            score,
        })
    }

    #[test]
    fn test_put_rejects_bad_scores_and_duplicates() {
        let mut cache = TaskCache::new("test", None);
        assert!(cache.put(job("a", 10.0)));
        assert!(!cache.put(job("b", f64::NAN)));
        assert!(!cache.put(job("c", -4.0)));
        assert!(!cache.put(job("a", 99.0)));
        assert!(cache.put(job("d", f64::INFINITY)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total(), 10.0 + crate::job::MAX_SCORE);
    }

    #[test]
    fn test_single_entry_always_drawn() {
        let mut cache = TaskCache::new("test", None);
        cache.put(job("only", 3.0));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(cache.random_draw(&mut rng).map(|j| j.key()), Some("only".to_string()));
        }
    }

    #[test]
    fn test_empty_cache_draws_nothing() {
        let cache = TaskCache::new("test", None);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(cache.random_draw(&mut rng).is_none());
        assert!(!cache.is_valid_for(MarsTime::new(1, 0.0)));
    }

    #[test]
    fn test_draw_at_boundaries() {
        let mut cache = TaskCache::new("test", None);
        cache.put(job("a", 1.0));
        cache.put(job("b", 2.0));
        cache.put(job("c", 3.0));
        let key = |r: f64| cache.draw_at(r).map(|j| j.key());
        assert_eq!(key(0.0).as_deref(), Some("a"));
        assert_eq!(key(0.999).as_deref(), Some("a"));
        assert_eq!(key(1.0).as_deref(), Some("b"));
        assert_eq!(key(2.999).as_deref(), Some("b"));
        assert_eq!(key(3.0).as_deref(), Some("c"));
        assert_eq!(key(5.999).as_deref(), Some("c"));
    }

    #[test]
    fn test_remove_updates_total() {
        let mut cache = TaskCache::new("test", None);
        cache.put(job("a", 1.0));
        cache.put(job("b", 2.0));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert_eq!(cache.total(), 2.0);
        assert!(!cache.contains("a"));
        assert!(cache.put(job("a", 4.0)));
    }

    #[test]
    fn test_validity_tracks_timestamp() {
        let now = MarsTime::new(3, 120.0);
        let mut cache = TaskCache::new("duty", Some(now));
        assert!(!cache.is_valid_for(now));
        cache.put(job("a", 1.0));
        assert!(cache.is_valid_for(now));
        assert!(!cache.is_valid_for(now.add_time(1.0)));
    }

    #[test]
    fn test_draw_distribution_roughly_weighted() {
        let mut cache = TaskCache::new("test", None);
        cache.put(job("light", 1.0));
        cache.put(job("heavy", 9.0));
        let mut rng = StdRng::seed_from_u64(42);
        let heavy = (0..10_000)
            .filter_map(|_| cache.random_draw(&mut rng))
            .filter(|j| j.key() == "heavy")
            .count();
        assert!((8_500..9_500).contains(&heavy), "heavy drawn {heavy} times");
    }

    proptest! {
        #[test]
        fn total_matches_entries(scores in prop::collection::vec(-10.0f64..100.0, 0..40)) {
            let mut cache = TaskCache::new("prop", None);
            for (i, s) in scores.iter().enumerate() {
                cache.put(job(&format!("j{i}"), *s));
            }
            let sum: f64 = cache.entries().map(|(_, w)| w).sum();
            prop_assert_eq!(sum, cache.total());
            prop_assert!(cache.entries().all(|(_, w)| w > 0.0 && w.is_finite()));
        }

        #[test]
        fn draw_hits_cumulative_range(
            weights in prop::collection::vec(1u32..50, 1..20),
            pick in 0u32..10_000,
        ) {
            let mut cache = TaskCache::new("prop", None);
            for (i, w) in weights.iter().enumerate() {
                cache.put(job(&format!("j{i}"), f64::from(*w)));
            }
            let total: u32 = weights.iter().sum();
            let unit = pick % total;
            let r = f64::from(unit) + 0.5;

            let mut start = 0;
            let mut expected = 0;
            for (i, w) in weights.iter().enumerate() {
                if unit < start + w {
                    expected = i;
                    break;
                }
                start += w;
            }
            let drawn = cache.draw_at(r).map(|j| j.key());
            prop_assert_eq!(drawn, Some(format!("j{expected}")));
        }
    }
}
