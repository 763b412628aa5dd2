//! Resolve the covariates a declaration activates against the current context
//!
//! Clock, timezone and property lookups come from a [`ResolutionContext`];
//! custom covariates come from a caller-supplied [`CustomCovariateSource`].

use crate::covariate::declaration::{
    CovariateDeclaration, DAY_OF_WEEK_KEY, REGION_KEY, TIMEZONE_KEY, TIME_OF_DAY_KEY,
};
use crate::covariate::partition::{
    day_remainder_label, time_remainder_label, DayGroup, RegionGroup, TimePeriod,
};
use crate::covariate::value::{CovariateProfile, CovariateValue, ProfileBuilder};
use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike, Weekday};
use std::collections::HashMap;

/// System property consulted first for the region
pub const REGION_PROPERTY: &str = "covbase.region";
/// Environment variable consulted second for the region
pub const REGION_ENV_VAR: &str = "COVBASE_REGION";
/// Ambient map key consulted last for the region
pub const REGION_AMBIENT_KEY: &str = "region";

/// Region label when the resolved code is in no declared group
pub const OTHER_REGION: &str = "OTHER";

/// Where the resolver reads "now", the timezone and named lookups from
pub trait ResolutionContext {
    /// Current instant in the context's timezone
    fn now(&self) -> DateTime<FixedOffset>;

    /// Timezone identifier reported verbatim (e.g. `Europe/London`)
    fn timezone_id(&self) -> String;

    fn system_property(&self, key: &str) -> Option<String>;

    fn env_var(&self, key: &str) -> Option<String>;

    fn ambient(&self, key: &str) -> Option<String>;
}

/// Supplies values for custom covariates by key
pub trait CustomCovariateSource {
    fn resolve(&self, key: &str) -> Option<String>;
}

impl CustomCovariateSource for HashMap<String, String> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Source with no custom values; every custom key resolves to `UNDEFINED`
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCustomCovariates;

impl CustomCovariateSource for NoCustomCovariates {
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Context backed by the real clock and process environment
///
/// The timezone id comes from `TZ`; without it the local UTC offset is used.
#[derive(Debug, Clone, Default)]
pub struct SystemContext {
    properties: HashMap<String, String>,
    ambient: HashMap<String, String>,
}

impl SystemContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_ambient(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ambient.insert(key.into(), value.into());
        self
    }
}

impl ResolutionContext for SystemContext {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn timezone_id(&self) -> String {
        std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| Local::now().offset().to_string())
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn ambient(&self, key: &str) -> Option<String> {
        self.ambient.get(key).cloned()
    }
}

/// Fully specified context for tests and hosts that own their clock
#[derive(Debug, Clone)]
pub struct FixedContext {
    now: DateTime<FixedOffset>,
    timezone_id: String,
    properties: HashMap<String, String>,
    env: HashMap<String, String>,
    ambient: HashMap<String, String>,
}

impl FixedContext {
    pub fn new(now: DateTime<FixedOffset>, timezone_id: impl Into<String>) -> Self {
        Self {
            now,
            timezone_id: timezone_id.into(),
            properties: HashMap::new(),
            env: HashMap::new(),
            ambient: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_ambient(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ambient.insert(key.into(), value.into());
        self
    }
}

impl ResolutionContext for FixedContext {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn timezone_id(&self) -> String {
        self.timezone_id.clone()
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn ambient(&self, key: &str) -> Option<String> {
        self.ambient.get(key).cloned()
    }
}

/// Resolves one value per active covariate of a declaration
#[derive(Debug, Clone, Copy)]
pub struct CovariateResolver<'a> {
    declaration: &'a CovariateDeclaration,
}

impl<'a> CovariateResolver<'a> {
    pub fn new(declaration: &'a CovariateDeclaration) -> Self {
        Self { declaration }
    }

    /// Build the test run's profile, in declaration order
    pub fn resolve(
        &self,
        context: &dyn ResolutionContext,
        custom: &dyn CustomCovariateSource,
    ) -> CovariateProfile {
        let decl = self.declaration;
        let now = context.now();
        let mut builder = ProfileBuilder::default();

        if !decl.day_groups().is_empty() {
            builder = builder.with(
                DAY_OF_WEEK_KEY,
                resolve_day_of_week(decl.day_groups(), now.weekday()),
            );
        }
        if !decl.time_periods().is_empty() {
            let minute_of_day = now.hour() * 60 + now.minute();
            builder = builder.with(
                TIME_OF_DAY_KEY,
                resolve_time_of_day(decl.time_periods(), minute_of_day),
            );
        }
        if !decl.region_groups().is_empty() {
            let raw = lookup_region(context);
            builder = builder.with(
                REGION_KEY,
                resolve_region(decl.region_groups(), raw.as_deref()),
            );
        }
        if decl.timezone_enabled() {
            builder = builder.with(TIMEZONE_KEY, CovariateValue::Text(context.timezone_id()));
        }
        for covariate in decl.custom() {
            let value = custom
                .resolve(&covariate.key)
                .filter(|v| !v.trim().is_empty())
                .map(CovariateValue::Text)
                .unwrap_or(CovariateValue::Undefined);
            builder = builder.with(covariate.key.clone(), value);
        }

        let profile = builder.build();
        tracing::debug!(
            "Resolved covariate profile: {:?}",
            profile.to_stored()
        );
        profile
    }
}

/// First group containing the day, else the remainder label
pub fn resolve_day_of_week(groups: &[DayGroup], day: Weekday) -> CovariateValue {
    match groups.iter().find(|g| g.contains(day)) {
        Some(group) => CovariateValue::Partition(group.label().to_string()),
        None => CovariateValue::Partition(day_remainder_label(groups)),
    }
}

/// First period containing the minute, else every complement interval
pub fn resolve_time_of_day(periods: &[TimePeriod], minute_of_day: u32) -> CovariateValue {
    match periods.iter().find(|p| p.contains(minute_of_day)) {
        Some(period) => CovariateValue::Partition(period.label()),
        None => CovariateValue::Partition(time_remainder_label(periods)),
    }
}

/// Group label for a raw code, `OTHER` when unmatched, `UNDEFINED` when absent
pub fn resolve_region(groups: &[RegionGroup], raw: Option<&str>) -> CovariateValue {
    let Some(code) = raw.map(str::trim).filter(|c| !c.is_empty()) else {
        return CovariateValue::Undefined;
    };
    match groups.iter().find(|g| g.contains(code)) {
        Some(group) => CovariateValue::Partition(group.label().to_string()),
        None => CovariateValue::Partition(OTHER_REGION.to_string()),
    }
}

fn lookup_region(context: &dyn ResolutionContext) -> Option<String> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    present(context.system_property(REGION_PROPERTY))
        .or_else(|| present(context.env_var(REGION_ENV_VAR)))
        .or_else(|| present(context.ambient(REGION_AMBIENT_KEY)))
}
