// Partition extraction for the temporal and regional covariates
//
// Raw declarations (day names, "HH:MM/<duration>" strings, country codes) are
// turned into validated, mutually exclusive partitions. All validation happens
// here, at construction time; nothing downstream re-checks or corrects input.

use crate::error::{CovbaseError, Result};
use chrono::Weekday;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Minutes in a day; a time period may end exactly here but never beyond
pub const MINUTES_PER_DAY: u32 = 24 * 60;

pub const WEEKEND_LABEL: &str = "WEEKEND";
pub const WEEKDAY_LABEL: &str = "WEEKDAY";

const WEEKEND: [Weekday; 2] = [Weekday::Sat, Weekday::Sun];
const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];
const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const TIME_PERIOD_FORMATS: &str =
    "expected 'HH:mm/Nh', 'HH:mm/Nm' or 'HH:mm/NhMm' (e.g. '08:00/2h', '08:00/30m', '08:00/2h30m')";

/// Upper-case weekday name used in labels and declarations
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

/// Parse a weekday from its full or three-letter name, case-insensitively
pub fn parse_day(raw: &str) -> Result<Weekday> {
    let upper = raw.trim().to_ascii_uppercase();
    ALL_DAYS
        .iter()
        .copied()
        .find(|d| day_name(*d) == upper || day_name(*d)[..3] == upper)
        .ok_or_else(|| {
            CovbaseError::validation(format!(
                "Unknown day of week '{}': expected one of MONDAY..SUNDAY or MON..SUN",
                raw
            ))
        })
}

fn sort_days(days: &mut Vec<Weekday>) {
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
}

/// Canonical label for a set of days: WEEKEND/WEEKDAY for the well-known sets,
/// otherwise the Monday-first sorted day names joined with `_`
pub fn day_set_label(days: &[Weekday]) -> String {
    let mut sorted = days.to_vec();
    sort_days(&mut sorted);
    if sorted == WEEKEND {
        WEEKEND_LABEL.to_string()
    } else if sorted == WEEKDAYS {
        WEEKDAY_LABEL.to_string()
    } else {
        sorted
            .iter()
            .map(|d| day_name(*d))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A labelled, non-empty set of weekdays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    days: Vec<Weekday>,
    label: String,
}

impl DayGroup {
    pub fn new(days: &[Weekday], label: Option<&str>) -> Result<Self> {
        if days.is_empty() {
            return Err(CovbaseError::validation(
                "Day group must contain at least one day",
            ));
        }
        let mut sorted = days.to_vec();
        sort_days(&mut sorted);
        let label = match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(l) => l.to_string(),
            None => day_set_label(&sorted),
        };
        Ok(Self {
            days: sorted,
            label,
        })
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }
}

/// Raw day group as written in a declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDayGroup {
    pub days: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Validate day groups and enforce that no day appears in two groups
pub fn extract_day_groups(raw: &[RawDayGroup]) -> Result<Vec<DayGroup>> {
    let mut groups = Vec::with_capacity(raw.len());
    for group in raw {
        let days = group
            .days
            .iter()
            .map(|d| parse_day(d))
            .collect::<Result<Vec<_>>>()?;
        groups.push(DayGroup::new(&days, group.label.as_deref())?);
    }
    check_day_exclusivity(&groups)?;
    Ok(groups)
}

pub(crate) fn check_day_exclusivity(groups: &[DayGroup]) -> Result<()> {
    let mut owner: HashMap<Weekday, &str> = HashMap::new();
    for group in groups {
        for day in group.days() {
            if let Some(existing) = owner.insert(*day, group.label()) {
                return Err(CovbaseError::validation(format!(
                    "Mutual exclusivity violated: {} appears in day groups '{}' and '{}'",
                    day_name(*day),
                    existing,
                    group.label()
                )));
            }
        }
    }
    Ok(())
}

/// Days not covered by any declared group, Monday first
pub fn day_complement(groups: &[DayGroup]) -> Vec<Weekday> {
    ALL_DAYS
        .iter()
        .copied()
        .filter(|d| !groups.iter().any(|g| g.contains(*d)))
        .collect()
}

/// Label for days outside every declared group; empty when the groups cover the week
pub fn day_remainder_label(groups: &[DayGroup]) -> String {
    let complement = day_complement(groups);
    if complement.is_empty() {
        return String::new();
    }
    day_set_label(&complement)
}

/// Half-open time-of-day interval `[start, start + duration)` within one day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    start_minute: u32,
    duration_minutes: u32,
}

impl TimePeriod {
    /// Build a period from minute offsets; rejects empty and midnight-crossing periods
    pub fn new(start_minute: u32, duration_minutes: u32) -> Result<Self> {
        if start_minute >= MINUTES_PER_DAY {
            return Err(CovbaseError::validation(format!(
                "Time period start {} minutes is outside the day",
                start_minute
            )));
        }
        if duration_minutes == 0 {
            return Err(CovbaseError::validation(format!(
                "Time period duration must be positive; {}",
                TIME_PERIOD_FORMATS
            )));
        }
        if start_minute.saturating_add(duration_minutes) > MINUTES_PER_DAY {
            return Err(CovbaseError::validation(format!(
                "Time period {} must not cross midnight",
                format_period(start_minute, duration_minutes)
            )));
        }
        Ok(Self {
            start_minute,
            duration_minutes,
        })
    }

    /// Parse `HH:mm/Nh`, `HH:mm/Nm` or `HH:mm/NhMm`
    pub fn parse(raw: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^([0-9]{2}):([0-9]{2})/(?:([0-9]+)h(?:([0-9]+)m)?|([0-9]+)m)$")
                .expect("time period pattern is valid")
        });

        let trimmed = raw.trim();
        let caps = pattern.captures(trimmed).ok_or_else(|| {
            CovbaseError::validation(format!(
                "Invalid time period '{}': {}",
                raw, TIME_PERIOD_FORMATS
            ))
        })?;

        let number = |idx: usize| -> Result<Option<u32>> {
            caps.get(idx)
                .map(|m| {
                    m.as_str().parse::<u32>().map_err(|_| {
                        CovbaseError::validation(format!(
                            "Invalid time period '{}': number out of range; {}",
                            raw, TIME_PERIOD_FORMATS
                        ))
                    })
                })
                .transpose()
        };

        let hour = number(1)?.unwrap_or(0);
        let minute = number(2)?.unwrap_or(0);
        if hour >= 24 {
            return Err(CovbaseError::validation(format!(
                "Invalid hour {} in time period '{}': must be 00-23; {}",
                hour, raw, TIME_PERIOD_FORMATS
            )));
        }
        if minute >= 60 {
            return Err(CovbaseError::validation(format!(
                "Invalid minute {} in time period '{}': must be 00-59; {}",
                minute, raw, TIME_PERIOD_FORMATS
            )));
        }

        let duration = match (number(3)?, number(4)?, number(5)?) {
            (Some(h), Some(m), _) => {
                if m >= 60 {
                    return Err(CovbaseError::validation(format!(
                        "Invalid minutes component {} in time period '{}': must be < 60 when combined with hours; {}",
                        m, raw, TIME_PERIOD_FORMATS
                    )));
                }
                h.checked_mul(60).and_then(|v| v.checked_add(m))
            }
            (Some(h), None, _) => h.checked_mul(60),
            (None, _, Some(m)) => Some(m),
            (None, _, None) => None,
        }
        .ok_or_else(|| {
            CovbaseError::validation(format!(
                "Invalid duration in time period '{}'; {}",
                raw, TIME_PERIOD_FORMATS
            ))
        })?;

        let start = hour * 60 + minute;
        if duration == 0 {
            return Err(CovbaseError::validation(format!(
                "Time period '{}' has a non-positive duration; {}",
                raw, TIME_PERIOD_FORMATS
            )));
        }
        if start.saturating_add(duration) > MINUTES_PER_DAY {
            return Err(CovbaseError::validation(format!(
                "Time period '{}' crosses midnight (ends after 24:00); {}",
                raw, TIME_PERIOD_FORMATS
            )));
        }
        Self::new(start, duration)
    }

    pub fn start_minute(&self) -> u32 {
        self.start_minute
    }

    /// Exclusive end, at most 1440
    pub fn end_minute(&self) -> u32 {
        self.start_minute + self.duration_minutes
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_minute && minute_of_day < self.end_minute()
    }

    pub fn label(&self) -> String {
        format_period(self.start_minute, self.duration_minutes)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn format_period(start_minute: u32, duration_minutes: u32) -> String {
    let hours = duration_minutes / 60;
    let minutes = duration_minutes % 60;
    let duration = match (hours, minutes) {
        (h, 0) => format!("{}h", h),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h{}m", h, m),
    };
    format!(
        "{:02}:{:02}/{}",
        start_minute / 60,
        start_minute % 60,
        duration
    )
}

/// Parse, sort by start, and reject overlapping periods
pub fn extract_time_periods(raw: &[String]) -> Result<Vec<TimePeriod>> {
    let periods = raw
        .iter()
        .map(|r| TimePeriod::parse(r))
        .collect::<Result<Vec<_>>>()?;
    normalize_time_periods(periods)
}

pub(crate) fn normalize_time_periods(mut periods: Vec<TimePeriod>) -> Result<Vec<TimePeriod>> {
    periods.sort_by_key(|p| p.start_minute());
    for pair in periods.windows(2) {
        if pair[0].end_minute() > pair[1].start_minute() {
            return Err(CovbaseError::validation(format!(
                "Time periods overlap: '{}' and '{}'",
                pair[0], pair[1]
            )));
        }
    }
    Ok(periods)
}

/// Gaps left by sorted, non-overlapping periods over the 24-hour day
///
/// With no periods the single gap is `00:00/24h`.
pub fn time_complement(periods: &[TimePeriod]) -> Vec<TimePeriod> {
    let mut sorted = periods.to_vec();
    sorted.sort_by_key(|p| p.start_minute());

    let mut gaps = Vec::new();
    let mut cursor = 0;
    for period in &sorted {
        if period.start_minute() > cursor {
            gaps.push(TimePeriod {
                start_minute: cursor,
                duration_minutes: period.start_minute() - cursor,
            });
        }
        cursor = cursor.max(period.end_minute());
    }
    if cursor < MINUTES_PER_DAY {
        gaps.push(TimePeriod {
            start_minute: cursor,
            duration_minutes: MINUTES_PER_DAY - cursor,
        });
    }
    gaps
}

/// All complement intervals joined with ", " in ascending start order
pub fn time_remainder_label(periods: &[TimePeriod]) -> String {
    time_complement(periods)
        .iter()
        .map(TimePeriod::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A labelled, non-empty set of ISO-3166-1 alpha-2 country codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGroup {
    regions: Vec<String>,
    label: String,
}

impl RegionGroup {
    pub fn new(codes: &[&str], label: Option<&str>) -> Result<Self> {
        if codes.is_empty() {
            return Err(CovbaseError::validation(
                "Region group must contain at least one country code",
            ));
        }
        let mut regions = Vec::with_capacity(codes.len());
        for code in codes {
            let upper = code.trim().to_ascii_uppercase();
            if !is_iso_country_code(&upper) {
                return Err(CovbaseError::validation(format!(
                    "Invalid region code '{}': expected an ISO 3166-1 alpha-2 country code (e.g. 'FR', 'DE', 'US')",
                    code
                )));
            }
            regions.push(upper);
        }
        regions.sort();
        regions.dedup();
        let label = match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(l) => l.to_string(),
            None => regions.join("_"),
        };
        Ok(Self { regions, label })
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, code: &str) -> bool {
        self.regions.iter().any(|r| r.eq_ignore_ascii_case(code.trim()))
    }
}

/// Raw region group as written in a declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRegionGroup {
    pub regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Validate region groups and enforce that no code appears in two groups
pub fn extract_region_groups(raw: &[RawRegionGroup]) -> Result<Vec<RegionGroup>> {
    let mut groups = Vec::with_capacity(raw.len());
    for group in raw {
        let codes: Vec<&str> = group.regions.iter().map(String::as_str).collect();
        groups.push(RegionGroup::new(&codes, group.label.as_deref())?);
    }
    check_region_exclusivity(&groups)?;
    Ok(groups)
}

pub(crate) fn check_region_exclusivity(groups: &[RegionGroup]) -> Result<()> {
    let mut owner: HashMap<&str, &str> = HashMap::new();
    for group in groups {
        for region in group.regions() {
            if let Some(existing) = owner.insert(region.as_str(), group.label()) {
                return Err(CovbaseError::validation(format!(
                    "Mutual exclusivity violated: region {} appears in groups '{}' and '{}'",
                    region,
                    existing,
                    group.label()
                )));
            }
        }
    }
    Ok(())
}

/// ISO 3166-1 alpha-2 officially assigned codes
const ISO_COUNTRY_CODES: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX",
    "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
    "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK",
    "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
    "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR",
    "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS",
    "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN",
    "IO", "IQ", "IR", "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
    "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV",
    "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ",
    "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI",
    "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
    "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC",
    "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR",
    "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];

pub fn is_iso_country_code(code: &str) -> bool {
    ISO_COUNTRY_CODES.binary_search(&code).is_ok()
}
