// Covariate declaration, resolution and matching
//
// A covariate is a contextual factor (day of week, time of day, region,
// timezone, or a caller-defined key) that may change how a non-deterministic
// service behaves. Baselines are only comparable to test runs captured under
// an equivalent context, so each run resolves a profile of covariate values
// that is matched key by key against stored baselines.
//
// Flow:
// - partition: raw day/time/region declarations → validated partitions
// - declaration: active keys, categories, and the 8-hex footprint
// - resolver: declaration + context → ordered CovariateProfile
// - matcher: per-key equality strategy → CONFORMS / DOES_NOT_CONFORM

mod declaration;
mod matcher;
mod partition;
mod resolver;
mod value;

pub use declaration::{
    CovariateCategory, CovariateDeclaration, CustomCovariate, RawDeclaration, DAY_OF_WEEK_KEY,
    FOOTPRINT_LEN, REGION_KEY, TIMEZONE_KEY, TIME_OF_DAY_KEY,
};
pub use matcher::{CovariateMatcherRegistry, MatchResult, MatchStrategy};
pub use partition::{
    day_complement, day_name, day_remainder_label, extract_day_groups, extract_region_groups,
    extract_time_periods, is_iso_country_code, parse_day, time_complement, time_remainder_label,
    DayGroup, RawDayGroup, RawRegionGroup, RegionGroup, TimePeriod, MINUTES_PER_DAY,
};
pub use resolver::{
    resolve_day_of_week, resolve_region, resolve_time_of_day, CovariateResolver,
    CustomCovariateSource, FixedContext, NoCustomCovariates, ResolutionContext, SystemContext,
    OTHER_REGION, REGION_AMBIENT_KEY, REGION_ENV_VAR, REGION_PROPERTY,
};
pub use value::{CovariateProfile, CovariateValue, ProfileBuilder, UNDEFINED};
