// Stored baseline records: schema validation and content fingerprints
//
// A record is YAML or JSON. Validation walks the whole document and collects
// every violation before failing, so a broken baseline is reported in one
// pass instead of one field at a time.

use crate::error::{CovbaseError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Schema versions this crate reads
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0", "1.1"];

pub const CONTENT_FINGERPRINT_FIELD: &str = "contentFingerprint";

/// Serialized document flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Infer from a file extension; `None` for anything that is not a record
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "YAML",
            DocumentFormat::Json => "JSON",
        }
    }
}

/// Why an experiment stopped collecting samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    Completed,
    TokenBudgetExhausted,
    TimeBudgetExhausted,
    EarlyTermination,
    Error,
}

impl TerminationReason {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "COMPLETED" => Some(TerminationReason::Completed),
            "TOKEN_BUDGET_EXHAUSTED" => Some(TerminationReason::TokenBudgetExhausted),
            "TIME_BUDGET_EXHAUSTED" => Some(TerminationReason::TimeBudgetExhausted),
            "EARLY_TERMINATION" => Some(TerminationReason::EarlyTermination),
            "ERROR" => Some(TerminationReason::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub samples_planned: u64,
    pub samples_executed: u64,
    pub termination_reason: TerminationReason,
    /// End of sample collection, when recorded separately from `generatedAt`
    pub completed_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineStatistics {
    pub observed_rate: f64,
    pub standard_error: f64,
    pub confidence_interval: (f64, f64),
    pub successes: u64,
    pub failures: u64,
}

impl BaselineStatistics {
    pub fn samples(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    pub total_time_ms: u64,
    pub total_tokens: u64,
}

/// A validated baseline record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineRecord {
    pub schema_version: String,
    pub use_case_id: String,
    pub generated_at: DateTime<FixedOffset>,
    /// Declaration footprint the baseline was recorded under, if stored
    pub footprint: Option<String>,
    /// Stored covariate values in document order
    pub covariates: Vec<(String, String)>,
    pub execution: ExecutionSummary,
    pub statistics: BaselineStatistics,
    pub cost: CostSummary,
    /// Validity window in days; 0 never expires
    pub expires_in_days: u32,
    pub content_fingerprint: String,
}

impl BaselineRecord {
    /// When sample collection ended; anchors the expiration window
    pub fn end_of_collection(&self) -> DateTime<FixedOffset> {
        self.execution.completed_at.unwrap_or(self.generated_at)
    }
}

fn is_fingerprint_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("contentFingerprint:") || trimmed.starts_with("\"contentFingerprint\"")
}

/// Text the fingerprint covers: every line except the fingerprint line itself
fn fingerprint_payload(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().filter(|l| !is_fingerprint_line(l)).collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// SHA-256 (lowercase hex) of a document, excluding its fingerprint line
pub fn compute_content_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint_payload(text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Return the document with a correct `contentFingerprint` added (or replaced)
///
/// JSON documents are re-rendered pretty-printed with the fingerprint first.
pub fn stamp_fingerprint(text: &str, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Yaml => {
            let payload = fingerprint_payload(text);
            let fingerprint = compute_content_fingerprint(&payload);
            Ok(format!(
                "{}\n{}: {}\n",
                payload, CONTENT_FINGERPRINT_FIELD, fingerprint
            ))
        }
        DocumentFormat::Json => {
            let value: Value = serde_json::from_str(text).map_err(|e| CovbaseError::Parse {
                format: format.name().to_string(),
                origin: "document to stamp".to_string(),
                message: e.to_string(),
            })?;
            let Value::Object(mut fields) = value else {
                return Err(CovbaseError::validation(
                    "Only JSON objects can carry a content fingerprint",
                ));
            };
            fields.remove(CONTENT_FINGERPRINT_FIELD);
            let unstamped = to_pretty(&Value::Object(fields.clone()))?;
            let fingerprint = compute_content_fingerprint(&unstamped);

            let mut stamped = Map::new();
            stamped.insert(
                CONTENT_FINGERPRINT_FIELD.to_string(),
                Value::String(fingerprint),
            );
            stamped.extend(fields);
            Ok(format!("{}\n", to_pretty(&Value::Object(stamped))?))
        }
    }
}

fn to_pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CovbaseError::Parse {
        format: "JSON".to_string(),
        origin: "document to stamp".to_string(),
        message: e.to_string(),
    })
}

/// Parse a document into a generic tree without checking the schema
pub fn parse_document(text: &str, format: DocumentFormat) -> std::result::Result<Value, String> {
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        DocumentFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
    }
}

/// Collects violations while reading typed fields out of a document
struct FieldReader<'a> {
    root: &'a Value,
    violations: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            violations: Vec::new(),
        }
    }

    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let pointer = format!("/{}", path.replace('.', "/"));
        self.root.pointer(&pointer).filter(|v| !v.is_null())
    }

    fn string(&mut self, path: &str) -> Option<String> {
        match self.lookup(path) {
            None => {
                self.violation(format!("missing required field '{}'", path));
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.violation(format!("'{}' must not be empty", path));
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.violation(format!("'{}' must be a string, got {}", path, other));
                None
            }
        }
    }

    fn optional_string(&mut self, path: &str) -> Option<String> {
        match self.lookup(path) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.violation(format!("'{}' must be a string, got {}", path, other));
                None
            }
        }
    }

    fn timestamp(&mut self, path: &str, required: bool) -> Option<DateTime<FixedOffset>> {
        let raw = if required {
            self.string(path)?
        } else {
            self.optional_string(path)?
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(ts) => Some(ts),
            Err(_) => {
                self.violation(format!(
                    "'{}' must be an ISO-8601 timestamp (e.g. 2026-01-15T10:30:00Z), got '{}'",
                    path, raw
                ));
                None
            }
        }
    }

    fn count(&mut self, path: &str, min: u64) -> Option<u64> {
        match self.lookup(path) {
            None => {
                self.violation(format!("missing required field '{}'", path));
                None
            }
            Some(value) => match value.as_u64() {
                Some(n) if n >= min => Some(n),
                Some(n) => {
                    self.violation(format!("'{}' must be >= {}, got {}", path, min, n));
                    None
                }
                None => {
                    self.violation(format!(
                        "'{}' must be a non-negative integer, got {}",
                        path, value
                    ));
                    None
                }
            },
        }
    }

    fn number(&mut self, path: &str, min: f64, max: f64) -> Option<f64> {
        match self.lookup(path) {
            None => {
                self.violation(format!("missing required field '{}'", path));
                None
            }
            Some(value) => match value.as_f64() {
                Some(x) if x >= min && x <= max => Some(x),
                Some(x) => {
                    let upper = if max.is_finite() {
                        format!("{}", max)
                    } else {
                        "inf".to_string()
                    };
                    self.violation(format!(
                        "'{}' must be in [{}, {}], got {}",
                        path, min, upper, x
                    ));
                    None
                }
                None => {
                    self.violation(format!("'{}' must be a number, got {}", path, value));
                    None
                }
            },
        }
    }
}

/// Validate a baseline document and build the typed record
///
/// Every problem found is returned together in a `Schema` error.
pub fn validate_record(text: &str, format: DocumentFormat, origin: &str) -> Result<BaselineRecord> {
    let schema_error = |violations: Vec<String>| CovbaseError::Schema {
        origin: origin.to_string(),
        violations,
    };

    let root = parse_document(text, format).map_err(|e| {
        schema_error(vec![format!("document is not valid {}: {}", format.name(), e)])
    })?;
    if !root.is_object() {
        return Err(schema_error(vec![
            "document root must be a mapping".to_string()
        ]));
    }

    let mut r = FieldReader::new(&root);

    let schema_version = r.string("schemaVersion");
    if let Some(version) = &schema_version {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&version.as_str()) {
            r.violation(format!(
                "unsupported schemaVersion '{}' (supported: {})",
                version,
                SUPPORTED_SCHEMA_VERSIONS.join(", ")
            ));
        }
    }
    let use_case_id = r.string("useCaseId");
    let generated_at = r.timestamp("generatedAt", true);

    let footprint = r.optional_string("footprint");
    if let Some(fp) = &footprint {
        if fp.len() != 8 || !fp.chars().all(|c| c.is_ascii_hexdigit()) {
            r.violation(format!(
                "'footprint' must be 8 hexadecimal characters, got '{}'",
                fp
            ));
        }
    }

    let covariates = match r.lookup("covariates") {
        None => {
            r.violation("missing required field 'covariates'".to_string());
            None
        }
        Some(Value::Object(map)) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                match value {
                    Value::String(s) => pairs.push((key.clone(), s.clone())),
                    other => r.violation(format!(
                        "'covariates.{}' must be a string, got {}",
                        key, other
                    )),
                }
            }
            Some(pairs)
        }
        Some(other) => {
            r.violation(format!("'covariates' must be a mapping, got {}", other));
            None
        }
    };

    let samples_planned = r.count("execution.samplesPlanned", 1);
    let samples_executed = r.count("execution.samplesExecuted", 0);
    let termination_reason = match r.string("execution.terminationReason") {
        Some(raw) => {
            let parsed = TerminationReason::parse(&raw);
            if parsed.is_none() {
                r.violation(format!(
                    "'execution.terminationReason' must be one of COMPLETED, TOKEN_BUDGET_EXHAUSTED, TIME_BUDGET_EXHAUSTED, EARLY_TERMINATION, ERROR, got '{}'",
                    raw
                ));
            }
            parsed
        }
        None => None,
    };
    let completed_at = r.timestamp("execution.completedAt", false);

    let observed_rate = r.number("statistics.successRate.observed", 0.0, 1.0);
    let standard_error = r.number("statistics.successRate.standardError", 0.0, f64::INFINITY);
    let confidence_interval = match r.lookup("statistics.successRate.confidenceInterval95") {
        None => {
            r.violation(
                "missing required field 'statistics.successRate.confidenceInterval95'".to_string(),
            );
            None
        }
        Some(Value::Array(items)) if items.len() == 2 => {
            match (items[0].as_f64(), items[1].as_f64()) {
                (Some(lo), Some(hi)) if (0.0..=1.0).contains(&lo) && lo <= hi && hi <= 1.0 => {
                    Some((lo, hi))
                }
                _ => {
                    r.violation(format!(
                        "'statistics.successRate.confidenceInterval95' must be [lower, upper] with 0 <= lower <= upper <= 1, got {}",
                        Value::Array(items.clone())
                    ));
                    None
                }
            }
        }
        Some(other) => {
            r.violation(format!(
                "'statistics.successRate.confidenceInterval95' must be a two-element range, got {}",
                other
            ));
            None
        }
    };
    let successes = r.count("statistics.successes", 0);
    let failures = r.count("statistics.failures", 0);
    if let (Some(s), Some(f), Some(executed)) = (successes, failures, samples_executed) {
        match s.checked_add(f) {
            None => r.violation(
                "statistics.successes + statistics.failures overflows a 64-bit count".to_string(),
            ),
            Some(total) if total != executed => r.violation(format!(
                "statistics.successes + statistics.failures ({}) must equal execution.samplesExecuted ({})",
                total, executed
            )),
            Some(_) => {}
        }
    }

    let total_time_ms = r.count("cost.totalTimeMs", 0);
    let total_tokens = r.count("cost.totalTokens", 0);

    let expires_in_days = match r.lookup("expiresInDays") {
        None => Some(0),
        Some(value) => match value.as_u64().and_then(|d| u32::try_from(d).ok()) {
            Some(days) => Some(days),
            None => {
                r.violation(format!(
                    "'expiresInDays' must be a non-negative integer, got {}",
                    value
                ));
                None
            }
        },
    };

    let content_fingerprint = r.string(CONTENT_FINGERPRINT_FIELD);
    if let Some(fp) = &content_fingerprint {
        let well_formed =
            fp.len() == 64 && fp.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            r.violation(format!(
                "'{}' must be a 64-character lowercase hexadecimal SHA-256 digest",
                CONTENT_FINGERPRINT_FIELD
            ));
        } else if !text.lines().any(is_fingerprint_line) {
            r.violation(format!(
                "'{}' must sit on its own line; store JSON records pretty-printed",
                CONTENT_FINGERPRINT_FIELD
            ));
        } else {
            let actual = compute_content_fingerprint(text);
            if *fp != actual {
                r.violation(format!(
                    "content fingerprint mismatch: stored {}, computed {}",
                    fp, actual
                ));
            }
        }
    }

    let violations = std::mem::take(&mut r.violations);
    if !violations.is_empty() {
        return Err(schema_error(violations));
    }

    match (
        schema_version,
        use_case_id,
        generated_at,
        covariates,
        samples_planned,
        samples_executed,
        termination_reason,
        observed_rate,
        standard_error,
        confidence_interval,
        successes,
        failures,
        total_time_ms,
        total_tokens,
        expires_in_days,
        content_fingerprint,
    ) {
        (
            Some(schema_version),
            Some(use_case_id),
            Some(generated_at),
            Some(covariates),
            Some(samples_planned),
            Some(samples_executed),
            Some(termination_reason),
            Some(observed_rate),
            Some(standard_error),
            Some(confidence_interval),
            Some(successes),
            Some(failures),
            Some(total_time_ms),
            Some(total_tokens),
            Some(expires_in_days),
            Some(content_fingerprint),
        ) => Ok(BaselineRecord {
            schema_version,
            use_case_id,
            generated_at,
            footprint: footprint.map(|f| f.to_ascii_lowercase()),
            covariates,
            execution: ExecutionSummary {
                samples_planned,
                samples_executed,
                termination_reason,
                completed_at,
            },
            statistics: BaselineStatistics {
                observed_rate,
                standard_error,
                confidence_interval,
                successes,
                failures,
            },
            cost: CostSummary {
                total_time_ms,
                total_tokens,
            },
            expires_in_days,
            content_fingerprint,
        }),
        _ => Err(schema_error(vec![
            "document is incomplete".to_string()
        ])),
    }
}
