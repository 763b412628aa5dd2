use crate::baseline::record::{parse_document, validate_record, BaselineRecord, DocumentFormat};
use crate::covariate::{CovariateProfile, FOOTPRINT_LEN};
use crate::error::{CovbaseError, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::path::{Path, PathBuf};

/// A stored baseline that shares the test's use case
///
/// Produced by [`BaselineRepository`] and never mutated afterwards; the
/// selector only borrows candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineCandidate {
    filename: String,
    footprint: String,
    profile: CovariateProfile,
    generated_at: DateTime<FixedOffset>,
    record: BaselineRecord,
}

impl BaselineCandidate {
    /// Build from a validated record; the footprint falls back to the filename
    pub fn from_record(filename: impl Into<String>, record: BaselineRecord) -> Self {
        let filename = filename.into();
        let footprint = record
            .footprint
            .clone()
            .or_else(|| footprint_from_filename(&filename, &record.use_case_id))
            .unwrap_or_default();
        let profile = CovariateProfile::from_stored(
            record
                .covariates
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        Self {
            filename,
            footprint,
            profile,
            generated_at: record.generated_at,
            record,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declaration footprint; empty when neither the record nor the filename carries one
    pub fn footprint(&self) -> &str {
        &self.footprint
    }

    pub fn profile(&self) -> &CovariateProfile {
        &self.profile
    }

    pub fn generated_at(&self) -> DateTime<FixedOffset> {
        self.generated_at
    }

    pub fn record(&self) -> &BaselineRecord {
        &self.record
    }

    pub fn samples(&self) -> u64 {
        self.record.statistics.samples()
    }

    pub fn successes(&self) -> u64 {
        self.record.statistics.successes
    }

    pub fn observed_rate(&self) -> f64 {
        self.record.statistics.observed_rate
    }
}

/// Footprint embedded in a `<useCaseId>-<footprint>[-...].<ext>` filename
pub fn footprint_from_filename(filename: &str, use_case_id: &str) -> Option<String> {
    let stem = Path::new(filename).file_stem()?.to_str()?;
    let rest = stem.strip_prefix(use_case_id)?.strip_prefix('-')?;
    let candidate = rest.split('-').next()?;
    if candidate.len() == FOOTPRINT_LEN && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(candidate.to_ascii_lowercase())
    } else {
        None
    }
}

/// A stored record that looked like it belonged to the use case but failed to load
#[derive(Debug)]
pub struct LoadFailure {
    pub filename: String,
    pub error: CovbaseError,
}

/// Outcome of scanning the store for one use case
#[derive(Debug, Default)]
pub struct ScanReport {
    pub candidates: Vec<BaselineCandidate>,
    pub failures: Vec<LoadFailure>,
}

/// Directory of baseline records
///
/// Each scan re-reads the directory, so concurrent callers never share state.
///
/// # Example Usage
/// ```no_run
/// use covbase::baseline::BaselineRepository;
///
/// let repo = BaselineRepository::new("baselines");
/// let candidates = repo.find_candidates("shopping.search", "a1b2c3d4")?;
/// println!("{} comparable baselines", candidates.len());
/// # Ok::<(), covbase::CovbaseError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BaselineRepository {
    root: PathBuf,
}

impl BaselineRepository {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every record for `use_case_id`, collecting per-file failures
    ///
    /// A missing directory yields an empty report. Files belonging to other
    /// use cases are skipped silently.
    pub fn scan(&self, use_case_id: &str) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Baseline directory {} does not exist", self.root.display());
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Some(format) = DocumentFormat::from_path(&path) else {
                continue;
            };
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    if filename.starts_with(use_case_id) {
                        report.failures.push(LoadFailure {
                            filename,
                            error: e.into(),
                        });
                    }
                    continue;
                }
            };

            match validate_record(&text, format, &filename) {
                Ok(record) if record.use_case_id == use_case_id => {
                    report
                        .candidates
                        .push(BaselineCandidate::from_record(filename, record));
                }
                Ok(_) => {}
                Err(error) => {
                    if belongs_to(&text, format, &filename, use_case_id) {
                        tracing::warn!("Skipping baseline {}: {}", filename, error);
                        report.failures.push(LoadFailure { filename, error });
                    }
                }
            }
        }

        tracing::debug!(
            "Scanned {} for '{}': {} candidates, {} failures",
            self.root.display(),
            use_case_id,
            report.candidates.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Every loadable candidate for the use case, regardless of footprint
    pub fn all_candidates(&self, use_case_id: &str) -> Result<Vec<BaselineCandidate>> {
        Ok(self.scan(use_case_id)?.candidates)
    }

    /// Candidates whose footprint equals `footprint` exactly
    pub fn find_candidates(
        &self,
        use_case_id: &str,
        footprint: &str,
    ) -> Result<Vec<BaselineCandidate>> {
        Ok(self
            .all_candidates(use_case_id)?
            .into_iter()
            .filter(|c| c.footprint() == footprint)
            .collect())
    }

    /// Distinct footprints stored for the use case, sorted
    pub fn available_footprints(&self, use_case_id: &str) -> Result<Vec<String>> {
        let mut footprints: Vec<String> = self
            .all_candidates(use_case_id)?
            .into_iter()
            .map(|c| c.footprint)
            .filter(|f| !f.is_empty())
            .collect();
        footprints.sort();
        footprints.dedup();
        Ok(footprints)
    }

    /// Like [`find_candidates`](Self::find_candidates), but an empty result is `NotFound`
    /// naming the footprints that do exist
    pub fn require_candidates(
        &self,
        use_case_id: &str,
        footprint: &str,
    ) -> Result<Vec<BaselineCandidate>> {
        let all = self.all_candidates(use_case_id)?;
        let mut available: Vec<String> = all
            .iter()
            .map(|c| c.footprint().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        available.sort();
        available.dedup();

        let matching: Vec<BaselineCandidate> = all
            .into_iter()
            .filter(|c| c.footprint() == footprint)
            .collect();
        if matching.is_empty() {
            return Err(CovbaseError::NotFound {
                searched: format!("{} with footprint {}", use_case_id, footprint),
                available,
            });
        }
        Ok(matching)
    }
}

/// Whether a document that failed validation was meant for this use case
fn belongs_to(text: &str, format: DocumentFormat, filename: &str, use_case_id: &str) -> bool {
    match parse_document(text, format)
        .ok()
        .as_ref()
        .and_then(|v| v.get("useCaseId"))
        .and_then(|v| v.as_str())
    {
        Some(id) => id == use_case_id,
        None => filename.starts_with(use_case_id),
    }
}
