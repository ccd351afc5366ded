//! loadforge: drive concurrent virtual users against an HTTP endpoint and
//! tally named response checks.
//!
//! A run is described by a [`models::dsl_model::DslConfig`], validated into
//! an immutable [`models::dsl_model::RunConfig`] and executed by
//! [`executor::run_load_test`], which returns a [`models::metrics::RunSummary`].

pub mod checks;
pub mod client;
pub mod error;
pub mod executor;
pub mod models;
pub mod report;
pub mod telemetry;

pub use error::{ConfigError, HarnessError, NetworkError, Result};
