use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub const UNDEFINED: &str = "UNDEFINED";

/// A resolved covariate value
///
/// Every kind reduces to one canonical string, which is what gets stored,
/// hashed and compared. Equality is canonical-string equality, so a stored
/// `Text("WEEKEND")` equals a freshly resolved `Partition("WEEKEND")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CovariateValue {
    /// Free-form value: timezone ids, custom covariates, values read back from storage
    Text(String),
    /// Label of a declared partition or of a computed remainder
    Partition(String),
    /// The covariate could not be resolved
    Undefined,
}

impl CovariateValue {
    pub fn canonical(&self) -> &str {
        match self {
            CovariateValue::Text(s) | CovariateValue::Partition(s) => s,
            CovariateValue::Undefined => UNDEFINED,
        }
    }

    /// Rebuild a value from its stored canonical form
    pub fn from_canonical(raw: &str) -> Self {
        if raw == UNDEFINED {
            CovariateValue::Undefined
        } else {
            CovariateValue::Text(raw.to_string())
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, CovariateValue::Undefined)
    }
}

impl PartialEq for CovariateValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for CovariateValue {}

impl Hash for CovariateValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for CovariateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Ordered covariate key → value mapping
///
/// Keeps insertion order for iteration and supports lookup by key. Built once
/// through [`CovariateProfile::from_entries`] or [`ProfileBuilder`] and never
/// mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct CovariateProfile {
    entries: IndexMap<String, CovariateValue>,
}

/// Equality includes key order
impl PartialEq for CovariateProfile {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl Eq for CovariateProfile {}

impl CovariateProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from ordered pairs; a repeated key keeps its first position and last value
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CovariateValue)>,
        K: Into<String>,
    {
        let mut builder = ProfileBuilder::default();
        for (key, value) in entries {
            builder = builder.with(key, value);
        }
        builder.build()
    }

    /// Rebuild a profile from stored canonical strings
    pub fn from_stored<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::from_entries(
            pairs
                .into_iter()
                .map(|(k, v)| (k, CovariateValue::from_canonical(v))),
        )
    }

    pub fn get(&self, key: &str) -> Option<&CovariateValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CovariateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical string pairs in order, as written to storage
    pub fn to_stored(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.canonical().to_string()))
            .collect()
    }
}

/// Accumulates profile entries before freezing them into a [`CovariateProfile`]
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    entries: IndexMap<String, CovariateValue>,
}

impl ProfileBuilder {
    /// Add an entry; a repeated key keeps its first position
    pub fn with(mut self, key: impl Into<String>, value: CovariateValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn build(self) -> CovariateProfile {
        CovariateProfile {
            entries: self.entries,
        }
    }
}
