//! Approved execution specifications and their on-disk registry
//!
//! A specification pins a human-reviewed minimum pass rate for one version of
//! a use case. Lookup is by `useCaseId:vN`; a malformed id is rejected before
//! any file is touched.

use crate::baseline::DocumentFormat;
use crate::error::{CovbaseError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SPEC_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// `useCaseId:vN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId {
    use_case_id: String,
    version: u32,
}

impl SpecId {
    pub fn new(use_case_id: impl Into<String>, version: u32) -> Self {
        Self {
            use_case_id: use_case_id.into(),
            version,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || CovbaseError::MalformedSpecId(raw.to_string());
        let (use_case_id, version) = raw.rsplit_once(':').ok_or_else(malformed)?;
        let use_case_id = use_case_id.trim();
        if use_case_id.is_empty() {
            return Err(malformed());
        }
        let digits = version.strip_prefix('v').ok_or_else(malformed)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let version = digits.parse::<u32>().map_err(|_| malformed())?;
        Ok(Self::new(use_case_id, version))
    }

    pub fn use_case_id(&self) -> &str {
        &self.use_case_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl FromStr for SpecId {
    type Err = CovbaseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.use_case_id, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub min_pass_rate: f64,
    #[serde(default)]
    pub success_criteria: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEnvelope {
    #[serde(default)]
    pub max_time_per_sample_ms: Option<u64>,
    #[serde(default)]
    pub max_tokens_per_sample: Option<u64>,
    #[serde(default)]
    pub total_budget_ms: Option<u64>,
    #[serde(default)]
    pub total_token_budget: Option<u64>,
}

/// A human-approved threshold for one use-case version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpecification {
    pub spec_id: String,
    pub use_case_id: String,
    pub version: u32,
    pub approved_at: DateTime<FixedOffset>,
    pub approved_by: String,
    #[serde(default)]
    pub approval_notes: Option<String>,
    pub requirements: Requirements,
    #[serde(default)]
    pub cost_envelope: CostEnvelope,
}

impl ExecutionSpecification {
    pub fn id(&self) -> Result<SpecId> {
        SpecId::parse(&self.spec_id)
    }

    /// Collect every inconsistency in the document
    pub fn validate(&self, origin: &str) -> Result<()> {
        let mut violations = Vec::new();

        match SpecId::parse(&self.spec_id) {
            Ok(id) => {
                if id.use_case_id() != self.use_case_id || id.version() != self.version {
                    violations.push(format!(
                        "specId '{}' disagrees with useCaseId '{}' / version {}",
                        self.spec_id, self.use_case_id, self.version
                    ));
                }
            }
            Err(_) => violations.push(format!(
                "specId '{}' is not of the form useCaseId:vN",
                self.spec_id
            )),
        }
        if self.approved_by.trim().is_empty() {
            violations.push("approvedBy must not be empty".to_string());
        }
        let rate = self.requirements.min_pass_rate;
        if !(0.0..=1.0).contains(&rate) {
            violations.push(format!(
                "requirements.minPassRate must be in [0, 1], got {}",
                rate
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CovbaseError::Schema {
                origin: origin.to_string(),
                violations,
            })
        }
    }

    pub fn from_str_with_format(text: &str, format: DocumentFormat, origin: &str) -> Result<Self> {
        let parse_error = |message: String| CovbaseError::Parse {
            format: format.name().to_string(),
            origin: origin.to_string(),
            message,
        };
        let spec: ExecutionSpecification = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?
            }
            DocumentFormat::Json => {
                serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?
            }
        };
        spec.validate(origin)?;
        Ok(spec)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            CovbaseError::validation(format!(
                "{} is not a .yaml, .yml or .json document",
                origin
            ))
        })?;
        let text = fs::read_to_string(path)?;
        Self::from_str_with_format(&text, format, &origin)
    }
}

/// Directory of approved specifications
///
/// Layout: `<root>/<useCaseId>/v<N>.yaml` (also `.yml`, `.json`), or flat
/// `<root>/<useCaseId>-v<N>.<ext>`. The nested layout wins when both exist.
#[derive(Debug, Clone)]
pub struct SpecRegistry {
    root: PathBuf,
}

impl SpecRegistry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn candidate_paths(&self, id: &SpecId) -> Vec<PathBuf> {
        let nested = self.root.join(id.use_case_id());
        let mut paths: Vec<PathBuf> = SPEC_EXTENSIONS
            .iter()
            .map(|ext| nested.join(format!("v{}.{}", id.version(), ext)))
            .collect();
        paths.extend(SPEC_EXTENSIONS.iter().map(|ext| {
            self.root
                .join(format!("{}-v{}.{}", id.use_case_id(), id.version(), ext))
        }));
        paths
    }

    /// Load the specification for `raw_id`
    ///
    /// Errors: `MalformedSpecId` for a bad id, `NotFound` listing the
    /// versions that do exist for the use case.
    pub fn resolve(&self, raw_id: &str) -> Result<ExecutionSpecification> {
        let id = SpecId::parse(raw_id)?;
        for path in self.candidate_paths(&id) {
            if path.is_file() {
                tracing::debug!("Resolved {} to {}", id, path.display());
                return ExecutionSpecification::load(&path);
            }
        }
        Err(CovbaseError::NotFound {
            searched: id.to_string(),
            available: self
                .list_versions(id.use_case_id())?
                .iter()
                .map(|v| format!("{}:v{}", id.use_case_id(), v))
                .collect(),
        })
    }

    /// Versions stored for a use case in either layout, ascending
    pub fn list_versions(&self, use_case_id: &str) -> Result<Vec<u32>> {
        let mut versions = Vec::new();

        let nested = self.root.join(use_case_id);
        if nested.is_dir() {
            for entry in fs::read_dir(&nested)? {
                let path = entry?.path();
                if let Some(v) = versioned_stem(&path, "") {
                    versions.push(v);
                }
            }
        }
        if self.root.is_dir() {
            let prefix = format!("{}-", use_case_id);
            for entry in fs::read_dir(&self.root)? {
                let path = entry?.path();
                if let Some(v) = versioned_stem(&path, &prefix) {
                    versions.push(v);
                }
            }
        }

        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }
}

/// Version from a `<prefix>v<N>.<ext>` file name
fn versioned_stem(path: &Path, prefix: &str) -> Option<u32> {
    let ext = path.extension()?.to_str()?;
    if !SPEC_EXTENSIONS.contains(&ext) || !path.is_file() {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(prefix)?.strip_prefix('v')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_yaml(use_case_id: &str, version: u32, min_pass_rate: f64) -> String {
        format!(
            "specId: \"{use_case_id}:v{version}\"\n\
             useCaseId: {use_case_id}\n\
             version: {version}\n\
             approvedAt: \"2026-09-30T10:00:00Z\"\n\
             approvedBy: qa-lead\n\
             approvalNotes: Reviewed against September baseline\n\
             requirements:\n  minPassRate: {min_pass_rate}\n  successCriteria: \"answer cites a product\"\n\
             costEnvelope:\n  maxTimePerSampleMs: 2000\n  maxTokensPerSample: 800\n"
        )
    }

    #[test]
    fn test_spec_id_parse() {
        let id = SpecId::parse("shopping.search:v3").unwrap();
        assert_eq!(id.use_case_id(), "shopping.search");
        assert_eq!(id.version(), 3);
        assert_eq!(id.to_string(), "shopping.search:v3");
        assert_eq!("a:v1".parse::<SpecId>().unwrap(), SpecId::new("a", 1));
    }

    #[test]
    fn test_malformed_spec_ids() {
        for raw in ["shopping.search", "shopping.search:", ":v1", "x:3", "x:v", "x:v1a"] {
            assert!(
                matches!(SpecId::parse(raw), Err(CovbaseError::MalformedSpecId(_))),
                "{} should be malformed",
                raw
            );
        }
    }

    #[test]
    fn test_resolve_nested_and_flat_layouts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("search"))?;
        fs::write(dir.path().join("search/v1.yaml"), spec_yaml("search", 1, 0.9))?;
        fs::write(dir.path().join("search-v2.yml"), spec_yaml("search", 2, 0.95))?;

        let registry = SpecRegistry::new(dir.path());
        let v1 = registry.resolve("search:v1")?;
        assert_eq!(v1.requirements.min_pass_rate, 0.9);
        assert_eq!(v1.cost_envelope.max_tokens_per_sample, Some(800));
        assert_eq!(v1.id()?, SpecId::new("search", 1));

        let v2 = registry.resolve("search:v2")?;
        assert_eq!(v2.version, 2);
        assert_eq!(registry.list_versions("search")?, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_not_found_lists_available_versions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("search-v1.yaml"), spec_yaml("search", 1, 0.9))?;

        let err = SpecRegistry::new(dir.path())
            .resolve("search:v7")
            .unwrap_err();
        match err {
            CovbaseError::NotFound {
                searched,
                available,
            } => {
                assert_eq!(searched, "search:v7");
                assert_eq!(available, vec!["search:v1".to_string()]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_malformed_id_is_not_not_found() {
        let err = SpecRegistry::new("/nonexistent").resolve("search").unwrap_err();
        assert!(matches!(err, CovbaseError::MalformedSpecId(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_inconsistent_spec_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let text = spec_yaml("search", 1, 1.5).replace("version: 1", "version: 4");
        fs::write(dir.path().join("search-v1.yaml"), text)?;

        let err = SpecRegistry::new(dir.path())
            .resolve("search:v1")
            .unwrap_err();
        match err {
            CovbaseError::Schema { violations, .. } => {
                assert_eq!(violations.len(), 2);
                assert!(violations[0].contains("disagrees"));
                assert!(violations[1].contains("minPassRate"));
            }
            other => panic!("expected Schema, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_json_specification() -> anyhow::Result<()> {
        let json = r#"{
            "specId": "triage:v1",
            "useCaseId": "triage",
            "version": 1,
            "approvedAt": "2026-09-30T10:00:00+02:00",
            "approvedBy": "ops",
            "requirements": { "minPassRate": 0.8 }
        }"#;
        let spec = ExecutionSpecification::from_str_with_format(json, DocumentFormat::Json, "inline")?;
        assert_eq!(spec.requirements.success_criteria, "");
        assert_eq!(spec.cost_envelope, CostEnvelope::default());
        Ok(())
    }
}
