// Stored baselines: record schema, candidate repository, selection, expiry
//
// A baseline is an earlier run's pass/fail counts recorded together with the
// covariate profile it was captured under. Before a new run can be judged,
// the stored baselines for its use case are narrowed to those sharing the
// declaration footprint, then scored key by key against the run's own
// profile.
//
// Flow:
// - record: schema validation with itemised violations, content fingerprint
// - repository: directory scan → BaselineCandidate, footprint filter
// - selector: conformance scoring, (score, recency) ranking, ambiguity flag
// - expiration: validity window relative to end of collection
//
// Nothing here mutates a candidate once the repository has produced it.

mod expiration;
mod record;
mod repository;
mod selector;

pub use expiration::{ExpirationPolicy, ExpirationStatus, IMMINENT_FRACTION, SOON_FRACTION};
pub use record::{
    compute_content_fingerprint, parse_document, stamp_fingerprint, validate_record,
    BaselineRecord, BaselineStatistics, CostSummary, DocumentFormat, ExecutionSummary,
    TerminationReason, CONTENT_FINGERPRINT_FIELD, SUPPORTED_SCHEMA_VERSIONS,
};
pub use repository::{
    footprint_from_filename, BaselineCandidate, BaselineRepository, LoadFailure, ScanReport,
};
pub use selector::{BaselineSelector, ConformanceDetail, SelectionResult};

#[cfg(test)]
pub(crate) use record::fixtures;
