use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Local;

use crate::checks::{CheckResult, CheckSpec};
use crate::models::response::Outcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

/// Aggregated outcome of one run across all virtual users.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub target_url: String,
    pub virtual_users: usize,
    pub duration_secs: f64,
    pub elapsed_secs: f64,
    pub timestamp: String,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,

    /// Declaration order of the run's checks.
    pub checks: Vec<CheckTally>,

    pub status_counts: BTreeMap<String, u64>,
    pub iterations_per_vu: Vec<u64>,
}

impl RunSummary {
    pub fn new(checks: &[CheckSpec], virtual_users: usize) -> Self {
        Self {
            virtual_users,
            checks: checks
                .iter()
                .map(|c| CheckTally {
                    name: c.name.clone(),
                    ..CheckTally::default()
                })
                .collect(),
            iterations_per_vu: vec![0; virtual_users],
            ..Default::default()
        }
    }

    /// Folds one completed iteration into the summary.
    pub fn record(&mut self, vu: usize, outcome: &Outcome, results: &[CheckResult<'_>]) {
        self.total_requests += 1;
        if let Some(count) = self.iterations_per_vu.get_mut(vu) {
            *count += 1;
        }

        let status_key = match outcome {
            Ok(response) => {
                self.successful_requests += 1;
                response.status.to_string()
            }
            Err(e) => {
                self.failed_requests += 1;
                e.status_key().to_string()
            }
        };
        *self.status_counts.entry(status_key).or_insert(0) += 1;

        for result in results {
            match self.checks.iter_mut().find(|t| t.name == result.name) {
                Some(tally) if result.passed => tally.passes += 1,
                Some(tally) => tally.fails += 1,
                None => self.checks.push(CheckTally {
                    name: result.name.to_string(),
                    passes: u64::from(result.passed),
                    fails: u64::from(!result.passed),
                }),
            }
        }
    }

    pub fn finish(&mut self, duration: Duration, elapsed: Duration) {
        self.duration_secs = duration.as_secs_f64();
        self.elapsed_secs = elapsed.as_secs_f64();
        self.timestamp = Local::now().format("%Y/%m/%d %H:%M:%S").to_string();
    }

    pub fn pass_count(&self, name: &str) -> Option<u64> {
        self.tally(name).map(|t| t.passes)
    }

    pub fn fail_count(&self, name: &str) -> Option<u64> {
        self.tally(name).map(|t| t.fails)
    }

    pub fn check_pass_counts(&self) -> BTreeMap<&str, u64> {
        self.checks.iter().map(|t| (t.name.as_str(), t.passes)).collect()
    }

    pub fn check_fail_counts(&self) -> BTreeMap<&str, u64> {
        self.checks.iter().map(|t| (t.name.as_str(), t.fails)).collect()
    }

    pub fn passed_checks(&self) -> u64 {
        self.checks.iter().map(|t| t.passes).sum()
    }

    pub fn total_checks(&self) -> u64 {
        self.checks.iter().map(|t| t.passes + t.fails).sum()
    }

    /// Fraction of passing check evaluations, `None` before any were recorded.
    pub fn pass_ratio(&self) -> Option<f64> {
        match self.total_checks() {
            0 => None,
            total => Some(self.passed_checks() as f64 / total as f64),
        }
    }

    pub fn all_checks_passed(&self) -> bool {
        self.checks.iter().all(|t| t.fails == 0)
    }

    /// Whether the run satisfies the exit threshold. Without a threshold the
    /// run always succeeds; with one, a run that evaluated nothing fails.
    pub fn meets_threshold(&self, threshold: Option<f64>) -> bool {
        match (threshold, self.pass_ratio()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(min), Some(ratio)) => ratio >= min,
        }
    }

    fn tally(&self, name: &str) -> Option<&CheckTally> {
        self.checks.iter().find(|t| t.name == name)
    }
}
