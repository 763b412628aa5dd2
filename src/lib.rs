//! covbase - covariate-aware baseline selection for non-deterministic tests
//!
//! This library decides which stored baseline a fresh pass/fail test run of
//! an LLM-backed (or otherwise non-deterministic) service should be compared
//! against, and what pass rate the run must reach:
//!
//! - [`covariate`]: declare contextual factors, resolve them for the current
//!   run, and match them against a baseline's stored values
//! - [`baseline`]: validate stored records, scan a directory for candidates,
//!   select the best one, classify its expiry
//! - [`confidence`]: Wilson intervals, baseline-derived thresholds and
//!   compliance sample-size gating
//! - [`execution_spec`]: approved, human-reviewed thresholds by `useCaseId:vN`
//! - [`evaluation`]: the whole pipeline as one call

pub mod baseline;
pub mod cli;
pub mod confidence;
pub mod covariate;
pub mod error;
pub mod evaluation;
pub mod execution_spec;

pub use error::{CovbaseError, Result};
