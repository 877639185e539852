//! Kill-desirability scoring and candidate ranking.
//!
//! The score is a weighted sum of five normalized components; higher means
//! more desirable to terminate. Protection is decided first and separately
//! (see `classifier`): a protected process gets the fixed sentinel score
//! and never appears in killable lists.

use std::collections::HashSet;

use serde::Serialize;

use super::classifier::{is_protected, Classifier, ProcessCategory};
use super::config::{ReclaimConfig, ScoreWeights};
use crate::metrics::ProcessSample;

/// Fixed per-category score modifier. Large negatives for the protected
/// trio keep them at the bottom even if protection were somehow bypassed;
/// small positives nudge disposable helpers upward.
pub fn category_modifier(category: ProcessCategory) -> f64 {
    match category {
        ProcessCategory::SystemCritical => -1000.0,
        ProcessCategory::Development => -500.0,
        ProcessCategory::Terminal => -500.0,
        ProcessCategory::Browser => 20.0,
        ProcessCategory::Communication => 15.0,
        ProcessCategory::CloudSync => 25.0,
        ProcessCategory::Media => 10.0,
        ProcessCategory::Background => 30.0,
        ProcessCategory::Unknown => 0.0,
    }
}

/// A process with derived classification, protection and score. Built
/// fresh each sampling cycle and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
    pub username: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub thread_count: u32,
    pub fd_count: u32,
    pub start_time: u64,
    pub children_count: u32,
    pub has_open_files_in_home: bool,
    pub category: ProcessCategory,
    pub protected: bool,
    pub kill_score: f64,
}

/// Scoring engine. Pure reads: every query derives records from the given
/// snapshot without touching the system.
pub struct ProcessScorer {
    classifier: Classifier,
    weights: ScoreWeights,
    memory_scale: f64,
    age_decay_divisor: f64,
    protected_score: f64,
    shielded_pids: HashSet<u32>,
}

impl ProcessScorer {
    pub fn new(config: &ReclaimConfig, shielded_pids: HashSet<u32>) -> Self {
        Self {
            classifier: Classifier::new(),
            weights: config.weights,
            memory_scale: config.memory_scale,
            age_decay_divisor: config.age_decay_divisor,
            protected_score: config.protected_score,
            shielded_pids,
        }
    }

    /// Derive the full record for one sample, as of now.
    pub fn record(&self, sample: &ProcessSample) -> ProcessRecord {
        self.record_at(sample, chrono::Utc::now().timestamp())
    }

    /// Derive the full record with an explicit "now" (unix seconds) for
    /// deterministic age computation.
    pub fn record_at(&self, sample: &ProcessSample, now_secs: i64) -> ProcessRecord {
        let category = self.classifier.classify(&sample.name, &sample.cmdline);
        let protected = is_protected(
            sample.pid,
            category,
            sample.children_count,
            sample.has_open_files_in_home,
            &self.shielded_pids,
        );
        let age_secs = (now_secs - sample.start_time as i64).max(0) as f64;
        let kill_score = self.score(
            sample.cpu_percent,
            sample.memory_percent,
            sample.fd_count,
            age_secs,
            category,
            protected,
        );

        ProcessRecord {
            pid: sample.pid,
            name: sample.name.clone(),
            cmdline: sample.cmdline.clone(),
            username: sample.username.clone(),
            cpu_percent: sample.cpu_percent,
            memory_percent: sample.memory_percent,
            thread_count: sample.thread_count,
            fd_count: sample.fd_count,
            start_time: sample.start_time,
            children_count: sample.children_count,
            has_open_files_in_home: sample.has_open_files_in_home,
            category,
            protected,
            kill_score,
        }
    }

    /// Weighted kill score, rounded to two decimal places.
    pub fn score(
        &self,
        cpu_percent: f64,
        memory_percent: f64,
        fd_count: u32,
        age_secs: f64,
        category: ProcessCategory,
        protected: bool,
    ) -> f64 {
        if protected {
            return self.protected_score;
        }

        let cpu_score = cpu_percent.clamp(0.0, 100.0);
        let memory_score = (memory_percent * self.memory_scale).clamp(0.0, 100.0);
        let fd_score = (f64::from(fd_count) / 10.0).min(50.0);
        // Newer processes score higher; contribution reaches zero at about
        // one hour of age.
        let age_score = (50.0 - age_secs / self.age_decay_divisor).max(0.0);
        let modifier = category_modifier(category);

        let score = cpu_score * self.weights.cpu
            + memory_score * self.weights.memory
            + fd_score * self.weights.fds
            + age_score * self.weights.age
            + modifier * self.weights.category;

        (score * 100.0).round() / 100.0
    }

    /// All processes at or above the CPU floor, score-descending. The sort
    /// is stable: ties keep snapshot enumeration order.
    pub fn ranked(&self, samples: &[ProcessSample], min_cpu: f64) -> Vec<ProcessRecord> {
        let now = chrono::Utc::now().timestamp();
        self.ranked_at(samples, min_cpu, now)
    }

    pub fn ranked_at(
        &self,
        samples: &[ProcessSample],
        min_cpu: f64,
        now_secs: i64,
    ) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = samples
            .iter()
            .filter(|s| s.cpu_percent >= min_cpu)
            .map(|s| self.record_at(s, now_secs))
            .collect();
        records.sort_by(|a, b| {
            b.kill_score
                .partial_cmp(&a.kill_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records
    }

    /// Processes safe to kill: unprotected, score at or above `min_score`,
    /// CPU at or above `min_cpu`.
    pub fn killable(
        &self,
        samples: &[ProcessSample],
        min_score: f64,
        min_cpu: f64,
    ) -> Vec<ProcessRecord> {
        self.ranked(samples, min_cpu)
            .into_iter()
            .filter(|r| !r.protected && r.kill_score >= min_score)
            .collect()
    }

    /// Top resource consumers for status displays.
    pub fn top_hogs(&self, samples: &[ProcessSample], limit: usize) -> Vec<ProcessRecord> {
        let mut records = self.ranked(samples, 1.0);
        records.truncate(limit);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scorer() -> ProcessScorer {
        ProcessScorer::new(&ReclaimConfig::default(), HashSet::new())
    }

    fn scorer_shielding(pids: &[u32]) -> ProcessScorer {
        ProcessScorer::new(&ReclaimConfig::default(), pids.iter().copied().collect())
    }

    fn sample(pid: u32, name: &str, cpu: f64, mem: f64) -> ProcessSample {
        ProcessSample {
            pid,
            name: name.to_string(),
            cmdline: String::new(),
            username: "user".to_string(),
            cpu_percent: cpu,
            memory_percent: mem,
            thread_count: 1,
            fd_count: 0,
            start_time: 0,
            children_count: 0,
            has_open_files_in_home: false,
        }
    }

    const NOW: i64 = 1_000_000;

    #[test]
    fn protected_score_is_sentinel_regardless_of_load() {
        let s = scorer();
        // Terminal category: always protected, even at full burn.
        let rec = s.record_at(&sample(10, "zsh", 100.0, 10.0), NOW);
        assert!(rec.protected);
        assert_eq!(rec.kill_score, -1000.0);

        // Same for a shielded pid with an otherwise killable profile.
        let s = scorer_shielding(&[11]);
        let rec = s.record_at(&sample(11, "Google Chrome Helper", 99.0, 9.0), NOW);
        assert!(rec.protected);
        assert_eq!(rec.kill_score, -1000.0);
    }

    #[test]
    fn score_is_rounded_to_two_decimals() {
        let s = scorer();
        let rec = s.record_at(&sample(1, "whatever", 33.333, 1.111), NOW);
        let scaled = rec.kill_score * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn age_component_decays_to_zero_after_an_hour() {
        let s = scorer();
        let mut old = sample(1, "whatever", 10.0, 0.0);
        old.start_time = 0;
        let mut fresh = old.clone();
        fresh.start_time = NOW as u64; // just started

        let old_rec = s.record_at(&old, NOW);
        let fresh_rec = s.record_at(&fresh, NOW);
        // 50 * 0.10 = 5.0 points of age contribution at age zero.
        assert_eq!(fresh_rec.kill_score - old_rec.kill_score, 5.0);

        // Past one hour the contribution is pinned at zero.
        let mut hour_old = old.clone();
        hour_old.start_time = (NOW - 3600) as u64;
        let mut day_old = old.clone();
        day_old.start_time = (NOW - 86_400) as u64;
        assert_eq!(
            s.record_at(&hour_old, NOW).kill_score,
            s.record_at(&day_old, NOW).kill_score
        );
    }

    #[test]
    fn ranked_is_sorted_descending_with_stable_ties() {
        let s = scorer();
        let samples = vec![
            sample(1, "alpha", 10.0, 1.0),
            sample(2, "beta", 90.0, 1.0),
            sample(3, "gamma", 10.0, 1.0), // tie with pid 1
        ];
        let ranked = s.ranked_at(&samples, 0.0, NOW);
        assert_eq!(ranked[0].pid, 2);
        // Stable sort keeps snapshot order for the tied pair.
        assert_eq!(ranked[1].pid, 1);
        assert_eq!(ranked[2].pid, 3);
    }

    #[test]
    fn killable_never_returns_protected() {
        let s = scorer();
        let samples = vec![
            sample(1, "zsh", 100.0, 10.0),                  // protected category
            sample(2, "Google Chrome Helper", 80.0, 5.0),   // killable
            {
                let mut p = sample(3, "mystery", 70.0, 5.0);
                p.children_count = 2; // protected by children
                p
            },
        ];
        for min_score in [-2000.0, 0.0, 10.0] {
            for min_cpu in [0.0, 50.0] {
                let killable = s.killable(&samples, min_score, min_cpu);
                assert!(killable.iter().all(|r| !r.protected));
                assert!(killable.iter().all(|r| r.pid == 2));
            }
        }
    }

    #[test]
    fn killable_applies_both_floors() {
        let s = scorer();
        let samples = vec![
            sample(1, "Google Chrome Helper", 80.0, 5.0),
            sample(2, "Google Chrome Helper", 10.0, 5.0), // below cpu floor
        ];
        let killable = s.killable(&samples, 0.0, 20.0);
        assert_eq!(killable.len(), 1);
        assert_eq!(killable[0].pid, 1);

        // A high score floor filters everything out.
        assert!(s.killable(&samples, 500.0, 0.0).is_empty());
    }

    proptest! {
        #[test]
        fn score_monotone_in_cpu(cpu1 in 0.0f64..100.0, cpu2 in 0.0f64..100.0, mem in 0.0f64..10.0) {
            let s = scorer();
            let (lo, hi) = if cpu1 <= cpu2 { (cpu1, cpu2) } else { (cpu2, cpu1) };
            let score_lo = s.score(lo, mem, 5, 100.0, ProcessCategory::Unknown, false);
            let score_hi = s.score(hi, mem, 5, 100.0, ProcessCategory::Unknown, false);
            prop_assert!(score_lo <= score_hi);
        }

        #[test]
        fn score_monotone_in_memory(mem1 in 0.0f64..20.0, mem2 in 0.0f64..20.0, cpu in 0.0f64..100.0) {
            let s = scorer();
            let (lo, hi) = if mem1 <= mem2 { (mem1, mem2) } else { (mem2, mem1) };
            let score_lo = s.score(cpu, lo, 5, 100.0, ProcessCategory::Unknown, false);
            let score_hi = s.score(cpu, hi, 5, 100.0, ProcessCategory::Unknown, false);
            prop_assert!(score_lo <= score_hi);
        }

        #[test]
        fn protected_sentinel_holds_for_any_inputs(cpu in 0.0f64..200.0, mem in 0.0f64..100.0, fds in 0u32..5000) {
            let s = scorer();
            let score = s.score(cpu, mem, fds, 0.0, ProcessCategory::Browser, true);
            prop_assert_eq!(score, -1000.0);
        }
    }
}
