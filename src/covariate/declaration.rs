use crate::covariate::partition::{
    check_day_exclusivity, check_region_exclusivity, extract_day_groups, extract_region_groups,
    extract_time_periods, normalize_time_periods, DayGroup, RawDayGroup, RawRegionGroup,
    RegionGroup, TimePeriod,
};
use crate::error::{CovbaseError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const DAY_OF_WEEK_KEY: &str = "day_of_week";
pub const TIME_OF_DAY_KEY: &str = "time_of_day";
pub const REGION_KEY: &str = "region";
pub const TIMEZONE_KEY: &str = "timezone";

const BUILTIN_KEYS: [&str; 4] = [DAY_OF_WEEK_KEY, TIME_OF_DAY_KEY, REGION_KEY, TIMEZONE_KEY];

/// Length of the declaration footprint in hex characters
pub const FOOTPRINT_LEN: usize = 8;

/// How a covariate mismatch is treated when comparing a baseline to a test run
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CovariateCategory {
    Temporal,
    Configuration,
    ExternalDependency,
    Infrastructure,
    Operational,
    DataState,
}

impl CovariateCategory {
    /// Only configuration mismatches invalidate a baseline outright
    pub fn is_hard_gate(&self) -> bool {
        matches!(self, CovariateCategory::Configuration)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CovariateCategory::Temporal => "TEMPORAL",
            CovariateCategory::Configuration => "CONFIGURATION",
            CovariateCategory::ExternalDependency => "EXTERNAL_DEPENDENCY",
            CovariateCategory::Infrastructure => "INFRASTRUCTURE",
            CovariateCategory::Operational => "OPERATIONAL",
            CovariateCategory::DataState => "DATA_STATE",
        }
    }
}

/// A caller-defined covariate resolved outside this crate
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CustomCovariate {
    pub key: String,
    pub category: CovariateCategory,
}

/// Declaration file layout
///
/// # Example TOML
/// ```toml
/// timezone = true
/// time_periods = ["08:00/2h", "14:00/30m"]
///
/// [[day_groups]]
/// days = ["SATURDAY", "SUNDAY"]
///
/// [[region_groups]]
/// regions = ["FR", "DE"]
/// label = "EU_CORE"
///
/// [[custom]]
/// key = "llm_model"
/// category = "CONFIGURATION"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDeclaration {
    #[serde(default)]
    pub day_groups: Vec<RawDayGroup>,
    #[serde(default)]
    pub time_periods: Vec<String>,
    #[serde(default)]
    pub region_groups: Vec<RawRegionGroup>,
    #[serde(default)]
    pub timezone: bool,
    #[serde(default)]
    pub custom: Vec<CustomCovariate>,
}

/// Validated set of covariates a use case declares
///
/// Active keys always appear in the order day-of-week, time-of-day, region,
/// timezone, then custom keys as declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CovariateDeclaration {
    day_groups: Vec<DayGroup>,
    time_periods: Vec<TimePeriod>,
    region_groups: Vec<RegionGroup>,
    timezone: bool,
    custom: Vec<CustomCovariate>,
}

impl CovariateDeclaration {
    /// Declaration with no covariates; every baseline ties under it
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        day_groups: Vec<DayGroup>,
        time_periods: Vec<TimePeriod>,
        region_groups: Vec<RegionGroup>,
        timezone: bool,
        custom: Vec<CustomCovariate>,
    ) -> Result<Self> {
        check_day_exclusivity(&day_groups)?;
        check_region_exclusivity(&region_groups)?;
        let time_periods = normalize_time_periods(time_periods)?;
        let custom = normalize_custom_keys(custom)?;
        Ok(Self {
            day_groups,
            time_periods,
            region_groups,
            timezone,
            custom,
        })
    }

    pub fn from_raw(raw: &RawDeclaration) -> Result<Self> {
        let day_groups = extract_day_groups(&raw.day_groups)?;
        let time_periods = extract_time_periods(&raw.time_periods)?;
        let region_groups = extract_region_groups(&raw.region_groups)?;
        let custom = normalize_custom_keys(raw.custom.clone())?;
        Ok(Self {
            day_groups,
            time_periods,
            region_groups,
            timezone: raw.timezone,
            custom,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawDeclaration = toml::from_str(content).map_err(|e| CovbaseError::Parse {
            format: "TOML".to_string(),
            origin: "covariate declaration".to_string(),
            message: e.to_string(),
        })?;
        Self::from_raw(&raw)
    }

    /// Load and validate a declaration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content).map_err(|e| match e {
            CovbaseError::Parse {
                format, message, ..
            } => CovbaseError::Parse {
                format,
                origin: path.as_ref().display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn day_groups(&self) -> &[DayGroup] {
        &self.day_groups
    }

    pub fn time_periods(&self) -> &[TimePeriod] {
        &self.time_periods
    }

    pub fn region_groups(&self) -> &[RegionGroup] {
        &self.region_groups
    }

    pub fn timezone_enabled(&self) -> bool {
        self.timezone
    }

    pub fn custom(&self) -> &[CustomCovariate] {
        &self.custom
    }

    /// Keys of every active covariate, in declaration order
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if !self.day_groups.is_empty() {
            keys.push(DAY_OF_WEEK_KEY.to_string());
        }
        if !self.time_periods.is_empty() {
            keys.push(TIME_OF_DAY_KEY.to_string());
        }
        if !self.region_groups.is_empty() {
            keys.push(REGION_KEY.to_string());
        }
        if self.timezone {
            keys.push(TIMEZONE_KEY.to_string());
        }
        keys.extend(self.custom.iter().map(|c| c.key.clone()));
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.active_keys().is_empty()
    }

    /// Category of an active key; `None` when the key is not declared
    pub fn category(&self, key: &str) -> Option<CovariateCategory> {
        match key {
            DAY_OF_WEEK_KEY if !self.day_groups.is_empty() => Some(CovariateCategory::Temporal),
            TIME_OF_DAY_KEY if !self.time_periods.is_empty() => Some(CovariateCategory::Temporal),
            REGION_KEY if !self.region_groups.is_empty() => Some(CovariateCategory::Operational),
            TIMEZONE_KEY if self.timezone => Some(CovariateCategory::Temporal),
            _ => self
                .custom
                .iter()
                .find(|c| c.key == key)
                .map(|c| c.category),
        }
    }

    /// Short stable digest over the active keys only, never their values
    pub fn footprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in self.active_keys() {
            hasher.update(key.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hex::encode(hasher.finalize());
        digest[..FOOTPRINT_LEN].to_string()
    }
}

/// Trim custom keys and reject empty, built-in or repeated ones
fn normalize_custom_keys(mut custom: Vec<CustomCovariate>) -> Result<Vec<CustomCovariate>> {
    for covariate in &mut custom {
        covariate.key = covariate.key.trim().to_string();
    }
    let mut seen: Vec<&str> = Vec::with_capacity(custom.len());
    for covariate in &custom {
        let key = covariate.key.as_str();
        if key.is_empty() {
            return Err(CovbaseError::validation("Custom covariate key must not be empty"));
        }
        if BUILTIN_KEYS.contains(&key) {
            return Err(CovbaseError::validation(format!(
                "Custom covariate key '{}' clashes with a built-in covariate",
                key
            )));
        }
        if seen.contains(&key) {
            return Err(CovbaseError::validation(format!(
                "Custom covariate key '{}' is declared twice",
                key
            )));
        }
        seen.push(key);
    }
    Ok(custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
timezone = true
time_periods = ["14:00/30m", "08:00/2h"]

[[day_groups]]
days = ["SATURDAY", "SUNDAY"]

[[region_groups]]
regions = ["FR", "DE"]
label = "EU_CORE"

[[custom]]
key = "llm_model"
category = "CONFIGURATION"

[[custom]]
key = "vector_store"
category = "EXTERNAL_DEPENDENCY"
"#;

    #[test]
    fn test_from_toml_str_full() {
        let decl = CovariateDeclaration::from_toml_str(FULL).unwrap();
        assert_eq!(
            decl.active_keys(),
            vec![
                "day_of_week",
                "time_of_day",
                "region",
                "timezone",
                "llm_model",
                "vector_store"
            ]
        );
        assert_eq!(decl.time_periods()[0].label(), "08:00/2h");
        assert_eq!(decl.region_groups()[0].label(), "EU_CORE");
    }

    #[test]
    fn test_categories() {
        let decl = CovariateDeclaration::from_toml_str(FULL).unwrap();
        assert_eq!(decl.category("region"), Some(CovariateCategory::Operational));
        assert_eq!(decl.category("timezone"), Some(CovariateCategory::Temporal));
        assert_eq!(
            decl.category("llm_model"),
            Some(CovariateCategory::Configuration)
        );
        assert_eq!(decl.category("unknown"), None);
        assert!(CovariateCategory::Configuration.is_hard_gate());
        assert!(!CovariateCategory::DataState.is_hard_gate());
    }

    #[test]
    fn test_inactive_builtin_has_no_category() {
        let decl = CovariateDeclaration::from_toml_str("timezone = true").unwrap();
        assert_eq!(decl.category("region"), None);
        assert_eq!(decl.active_keys(), vec!["timezone"]);
    }

    #[test]
    fn test_empty_declaration() {
        let decl = CovariateDeclaration::from_toml_str("").unwrap();
        assert!(decl.is_empty());
        assert_eq!(decl, CovariateDeclaration::empty());
    }

    #[test]
    fn test_footprint_is_stable_and_short() {
        let decl = CovariateDeclaration::from_toml_str(FULL).unwrap();
        let fp = decl.footprint();
        assert_eq!(fp.len(), FOOTPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp, decl.footprint());
    }

    #[test]
    fn test_footprint_ignores_group_membership() {
        let a = CovariateDeclaration::from_toml_str(
            "[[region_groups]]\nregions = [\"FR\", \"DE\"]\n",
        )
        .unwrap();
        let b = CovariateDeclaration::from_toml_str(
            "[[region_groups]]\nregions = [\"GB\"]\n[[region_groups]]\nregions = [\"US\"]\n",
        )
        .unwrap();
        assert_eq!(a.footprint(), b.footprint());
    }

    #[test]
    fn test_footprint_depends_on_key_order_and_set() {
        let ab = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"a\"\ncategory = \"OPERATIONAL\"\n[[custom]]\nkey = \"b\"\ncategory = \"OPERATIONAL\"\n",
        )
        .unwrap();
        let ba = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"b\"\ncategory = \"OPERATIONAL\"\n[[custom]]\nkey = \"a\"\ncategory = \"OPERATIONAL\"\n",
        )
        .unwrap();
        let a = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"a\"\ncategory = \"OPERATIONAL\"\n",
        )
        .unwrap();
        assert_ne!(ab.footprint(), ba.footprint());
        assert_ne!(ab.footprint(), a.footprint());
    }

    #[test]
    fn test_custom_key_clash_rejected() {
        let err = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"region\"\ncategory = \"OPERATIONAL\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("built-in"));

        let err = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"a\"\ncategory = \"OPERATIONAL\"\n[[custom]]\nkey = \"a\"\ncategory = \"TEMPORAL\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_custom_keys_are_trimmed() {
        let decl = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \" llm_model \"\ncategory = \"CONFIGURATION\"\n",
        )
        .unwrap();
        let plain = CovariateDeclaration::from_toml_str(
            "[[custom]]\nkey = \"llm_model\"\ncategory = \"CONFIGURATION\"\n",
        )
        .unwrap();
        assert_eq!(decl.custom()[0].key, "llm_model");
        assert!(decl.active_keys().contains(&"llm_model".to_string()));
        assert_eq!(decl.category("llm_model"), Some(CovariateCategory::Configuration));
        assert_eq!(decl.footprint(), plain.footprint());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = CovariateDeclaration::from_toml_str("timezone = ").unwrap_err();
        assert!(matches!(err, CovbaseError::Parse { .. }));
    }

    #[test]
    fn test_new_revalidates_overlap() {
        let periods = vec![
            TimePeriod::parse("08:00/2h").unwrap(),
            TimePeriod::parse("09:00/1h").unwrap(),
        ];
        assert!(CovariateDeclaration::new(vec![], periods, vec![], false, vec![]).is_err());
    }

    #[test]
    fn test_from_toml_file() -> anyhow::Result<()> {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "{}", FULL)?;
        file.flush()?;
        let decl = CovariateDeclaration::from_toml(file.path())?;
        assert_eq!(decl.custom().len(), 2);
        Ok(())
    }
}
