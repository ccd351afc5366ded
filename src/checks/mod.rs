//! Named response checks.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::response::Outcome;

pub const STATUS_WAS_200: &str = "status was 200";
pub const RESPONSE_TIME_UNDER_500MS: &str = "response time < 500ms";

/// A predicate over a fixed response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Status code equals the given value.
    Status(u16),
    /// Latency strictly below the given span.
    LatencyBelow(#[serde(with = "humantime_serde")] Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(flatten)]
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult<'a> {
    pub name: &'a str,
    pub passed: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckEvaluationError {
    #[error("no response to evaluate: {0}")]
    NoResponse(String),
}

impl CheckSpec {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl Predicate {
    pub fn evaluate(&self, outcome: &Outcome) -> Result<bool, CheckEvaluationError> {
        let response = outcome
            .as_ref()
            .map_err(|e| CheckEvaluationError::NoResponse(e.to_string()))?;
        Ok(match *self {
            Predicate::Status(expected) => response.status == expected,
            Predicate::LatencyBelow(limit) => response.latency < limit,
        })
    }
}

/// The two checks every run carries unless the config replaces them.
pub fn default_checks() -> Vec<CheckSpec> {
    vec![
        CheckSpec::new(STATUS_WAS_200, Predicate::Status(200)),
        CheckSpec::new(
            RESPONSE_TIME_UNDER_500MS,
            Predicate::LatencyBelow(Duration::from_millis(500)),
        ),
    ]
}

/// Runs every check in declaration order. A check that cannot be evaluated
/// counts as failed.
pub fn evaluate<'a>(checks: &'a [CheckSpec], outcome: &Outcome) -> Vec<CheckResult<'a>> {
    checks
        .iter()
        .map(|check| CheckResult {
            name: &check.name,
            passed: check.predicate.evaluate(outcome).unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::models::response::Response;

    fn response(status: u16, latency_ms: u64) -> Outcome {
        Ok(Response {
            status,
            latency: Duration::from_millis(latency_ms),
        })
    }

    fn passed(results: &[CheckResult<'_>], name: &str) -> bool {
        results.iter().find(|r| r.name == name).map(|r| r.passed).unwrap()
    }

    #[test]
    fn status_check_passes_only_on_200() {
        let checks = default_checks();
        assert!(passed(&evaluate(&checks, &response(200, 10)), STATUS_WAS_200));
        for status in [100u16, 201, 204, 301, 404, 500, 503] {
            assert!(!passed(&evaluate(&checks, &response(status, 10)), STATUS_WAS_200));
        }
    }

    #[test]
    fn latency_check_boundary_is_exclusive() {
        let checks = default_checks();
        assert!(passed(&evaluate(&checks, &response(200, 0)), RESPONSE_TIME_UNDER_500MS));
        assert!(passed(&evaluate(&checks, &response(200, 499)), RESPONSE_TIME_UNDER_500MS));
        assert!(!passed(&evaluate(&checks, &response(200, 500)), RESPONSE_TIME_UNDER_500MS));
        assert!(!passed(&evaluate(&checks, &response(200, 2500)), RESPONSE_TIME_UNDER_500MS));
    }

    #[test]
    fn all_checks_run_without_short_circuit() {
        let checks = default_checks();
        let results = evaluate(&checks, &response(503, 900));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], CheckResult { name: STATUS_WAS_200, passed: false });
        assert_eq!(
            results[1],
            CheckResult { name: RESPONSE_TIME_UNDER_500MS, passed: false }
        );
    }

    #[test]
    fn results_follow_declaration_order() {
        let checks = vec![
            CheckSpec::new("fast", Predicate::LatencyBelow(Duration::from_millis(100))),
            CheckSpec::new("created", Predicate::Status(201)),
            CheckSpec::new("ok", Predicate::Status(200)),
        ];
        let names: Vec<_> = evaluate(&checks, &response(201, 50)).iter().map(|r| r.name).collect();
        assert_eq!(names, ["fast", "created", "ok"]);
    }

    #[test]
    fn network_error_fails_every_check() {
        let checks = default_checks();
        let results = evaluate(&checks, &Err(NetworkError::Connect));
        assert!(results.iter().all(|r| !r.passed));

        let err = Predicate::Status(200).evaluate(&Err(NetworkError::Timeout)).unwrap_err();
        assert_eq!(err, CheckEvaluationError::NoResponse("timeout".into()));
    }

    #[test]
    fn check_spec_json_shape() {
        let spec: CheckSpec =
            serde_json::from_str(r#"{"name": "quick", "latency_below": "1s"}"#).unwrap();
        assert_eq!(spec.predicate, Predicate::LatencyBelow(Duration::from_secs(1)));

        let json = serde_json::to_value(CheckSpec::new("ok", Predicate::Status(200))).unwrap();
        assert_eq!(json, serde_json::json!({"name": "ok", "status": 200}));
    }
}
