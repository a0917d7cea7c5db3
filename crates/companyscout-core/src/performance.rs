//! Rolling per-provider run statistics.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub provider_name: String,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub avg_run_time_seconds: f64,
    pub completion_rate_pct: f64,
    pub api_success_rate_pct: f64,
}

impl PerformanceRecord {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            avg_run_time_seconds: 0.0,
            completion_rate_pct: 0.0,
            api_success_rate_pct: 0.0,
        }
    }

    fn apply(&mut self, sample: &RunSample) {
        let previous = self.total_runs as f64;
        self.avg_run_time_seconds =
            (self.avg_run_time_seconds * previous + sample.run_time_seconds) / (previous + 1.0);
        let api_sample = if sample.api_success { 100.0 } else { 0.0 };
        self.api_success_rate_pct =
            (self.api_success_rate_pct * previous + api_sample) / (previous + 1.0);

        self.total_runs += 1;
        if sample.success {
            self.successful_runs += 1;
        } else {
            self.failed_runs += 1;
        }
        self.completion_rate_pct = self.successful_runs as f64 / self.total_runs as f64 * 100.0;
    }
}

/// Outcome of one provider invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSample {
    pub run_time_seconds: f64,
    pub success: bool,
    /// False only when the remote API call itself failed.
    pub api_success: bool,
}

impl RunSample {
    pub fn success(run_time_seconds: f64) -> Self {
        Self {
            run_time_seconds,
            success: true,
            api_success: true,
        }
    }

    pub fn failure(run_time_seconds: f64, api_success: bool) -> Self {
        Self {
            run_time_seconds,
            success: false,
            api_success,
        }
    }
}

/// In-memory tracker keyed by provider name.
///
/// Updates to one key are serialized by the shard lock held across the
/// read-modify-write; distinct keys usually land on distinct shards.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    records: DashMap<String, PerformanceRecord>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, provider_name: &str, sample: RunSample) -> PerformanceRecord {
        let mut entry = self
            .records
            .entry(provider_name.to_string())
            .or_insert_with(|| PerformanceRecord::new(provider_name));
        entry.apply(&sample);
        tracing::debug!(
            provider = provider_name,
            total_runs = entry.total_runs,
            completion_rate_pct = entry.completion_rate_pct,
            "performance updated"
        );
        entry.clone()
    }

    pub fn get(&self, provider_name: &str) -> Option<PerformanceRecord> {
        self.records.get(provider_name).map(|entry| entry.clone())
    }

    /// Replace a record wholesale, e.g. to reset counters.
    pub fn update(&self, record: PerformanceRecord) {
        self.records.insert(record.provider_name.clone(), record);
    }

    pub fn all(&self) -> Vec<PerformanceRecord> {
        let mut records: Vec<PerformanceRecord> =
            self.records.iter().map(|entry| entry.clone()).collect();
        records.sort_by(|a, b| a.provider_name.cmp(&b.provider_name));
        records
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn success_then_failure_halves_completion_rate() {
        let tracker = PerformanceTracker::new();
        tracker.record("crew", RunSample::success(2.0));
        let record = tracker.record("crew", RunSample::failure(4.0, true));

        assert_eq!(record.total_runs, 2);
        assert_eq!(record.successful_runs, 1);
        assert_eq!(record.failed_runs, 1);
        assert_eq!(record.completion_rate_pct, 50.0);
        assert_eq!(record.avg_run_time_seconds, 3.0);
        assert_eq!(record.api_success_rate_pct, 100.0);
    }

    #[test]
    fn unknown_provider_has_no_record() {
        let tracker = PerformanceTracker::new();
        assert!(tracker.get("missing").is_none());
        tracker.record("roundtable", RunSample::failure(1.0, false));
        let record = tracker.get("roundtable").unwrap();
        assert_eq!(record.api_success_rate_pct, 0.0);
        assert_eq!(record.completion_rate_pct, 0.0);
    }

    #[test]
    fn explicit_update_replaces_counters() {
        let tracker = PerformanceTracker::new();
        tracker.record("crew", RunSample::success(1.0));
        tracker.update(PerformanceRecord::new("crew"));
        assert_eq!(tracker.get("crew").unwrap().total_runs, 0);

        tracker.record("anthology", RunSample::success(1.0));
        let names: Vec<String> = tracker
            .all()
            .into_iter()
            .map(|record| record.provider_name)
            .collect();
        assert_eq!(names, vec!["anthology", "crew"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_to_same_key_are_not_lost() {
        let tracker = Arc::new(PerformanceTracker::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                let sample = if i % 2 == 0 {
                    RunSample::success(1.0)
                } else {
                    RunSample::failure(1.0, true)
                };
                tracker.record("stategraph", sample);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = tracker.get("stategraph").unwrap();
        assert_eq!(record.total_runs, 64);
        assert_eq!(record.successful_runs, 32);
        assert_eq!(record.completion_rate_pct, 50.0);
        assert!((record.avg_run_time_seconds - 1.0).abs() < 1e-9);
    }
}
