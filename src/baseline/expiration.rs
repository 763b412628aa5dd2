use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining share of the window at or below which expiry is imminent
pub const IMMINENT_FRACTION: f64 = 0.10;
/// Remaining share of the window at or below which expiry is near
pub const SOON_FRACTION: f64 = 0.25;

/// Validity window of a baseline, anchored to its end of collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpirationPolicy {
    /// 0 never expires
    pub expires_in_days: u32,
}

/// Where a baseline sits in its validity window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationStatus {
    NoExpiration,
    Valid { remaining: Duration },
    ExpiringSoon { remaining: Duration },
    ExpiringImminently { remaining: Duration },
    Expired { elapsed: Duration },
}

impl ExpirationPolicy {
    pub fn new(expires_in_days: u32) -> Self {
        Self { expires_in_days }
    }

    pub fn never() -> Self {
        Self::default()
    }

    pub fn has_expiration(&self) -> bool {
        self.expires_in_days > 0
    }

    fn window(&self) -> Duration {
        Duration::days(i64::from(self.expires_in_days))
    }

    /// Instant the baseline stops being valid; `None` when it never expires
    pub fn expiration_time(&self, end: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        if !self.has_expiration() {
            return None;
        }
        end.checked_add_signed(self.window())
    }

    pub fn evaluate(
        &self,
        end: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
    ) -> ExpirationStatus {
        let Some(expiration) = self.expiration_time(end) else {
            return ExpirationStatus::NoExpiration;
        };

        let remaining = expiration.signed_duration_since(now);
        if remaining < Duration::zero() {
            return ExpirationStatus::Expired {
                elapsed: -remaining,
            };
        }

        let fraction =
            remaining.num_milliseconds() as f64 / self.window().num_milliseconds() as f64;
        if fraction <= IMMINENT_FRACTION {
            ExpirationStatus::ExpiringImminently { remaining }
        } else if fraction <= SOON_FRACTION {
            ExpirationStatus::ExpiringSoon { remaining }
        } else {
            ExpirationStatus::Valid { remaining }
        }
    }
}

fn describe(duration: Duration) -> String {
    let days = duration.num_days();
    if days >= 1 {
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    } else {
        let hours = duration.num_hours();
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    }
}

impl ExpirationStatus {
    pub fn requires_warning(&self) -> bool {
        !matches!(
            self,
            ExpirationStatus::NoExpiration | ExpirationStatus::Valid { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpirationStatus::Expired { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExpirationStatus::NoExpiration => "NO_EXPIRATION",
            ExpirationStatus::Valid { .. } => "VALID",
            ExpirationStatus::ExpiringSoon { .. } => "EXPIRING_SOON",
            ExpirationStatus::ExpiringImminently { .. } => "EXPIRING_IMMINENTLY",
            ExpirationStatus::Expired { .. } => "EXPIRED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ExpirationStatus::NoExpiration => "Baseline has no expiration".to_string(),
            ExpirationStatus::Valid { remaining } => {
                format!("Baseline valid for {}", describe(*remaining))
            }
            ExpirationStatus::ExpiringSoon { remaining } => {
                format!("Baseline expires in {}", describe(*remaining))
            }
            ExpirationStatus::ExpiringImminently { remaining } => format!(
                "Baseline expires in {}; re-establish it soon",
                describe(*remaining)
            ),
            ExpirationStatus::Expired { elapsed } => format!(
                "Baseline expired {} ago; results may not reflect current behavior",
                describe(*elapsed)
            ),
        }
    }
}

impl fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl Serialize for ExpirationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExpirationStatus", 3)?;
        state.serialize_field("status", self.name())?;
        state.serialize_field("message", &self.message())?;
        state.serialize_field("requiresWarning", &self.requires_warning())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-16T12:00:00Z").unwrap()
    }

    fn status(days_ago: i64, expires_in_days: u32) -> ExpirationStatus {
        let end = now() - Duration::days(days_ago);
        ExpirationPolicy::new(expires_in_days).evaluate(end, now())
    }

    #[test]
    fn test_zero_days_never_expires() {
        assert_eq!(status(10_000, 0), ExpirationStatus::NoExpiration);
        assert_eq!(ExpirationPolicy::never().expiration_time(now()), None);
    }

    #[test]
    fn test_window_fractions() {
        assert!(matches!(status(1, 30), ExpirationStatus::Valid { .. }));
        // 6 of 30 days left: 20%
        assert!(matches!(status(24, 30), ExpirationStatus::ExpiringSoon { .. }));
        // 2 of 30 days left: 6.7%
        assert!(matches!(
            status(28, 30),
            ExpirationStatus::ExpiringImminently { .. }
        ));
        assert!(matches!(status(31, 30), ExpirationStatus::Expired { .. }));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        // exactly 3 of 30 days: 10%
        assert!(matches!(
            status(27, 30),
            ExpirationStatus::ExpiringImminently { .. }
        ));
        // exactly 25%
        assert!(matches!(status(75, 100), ExpirationStatus::ExpiringSoon { .. }));
        // expiring this instant is not yet expired
        assert!(matches!(
            status(30, 30),
            ExpirationStatus::ExpiringImminently { .. }
        ));
    }

    #[test]
    fn test_expired_reports_elapsed() {
        match status(35, 30) {
            ExpirationStatus::Expired { elapsed } => assert_eq!(elapsed.num_days(), 5),
            other => panic!("expected Expired, got {:?}", other),
        }
    }

    #[test]
    fn test_warning_and_terminal_flags() {
        assert!(!status(0, 0).requires_warning());
        assert!(!status(1, 30).requires_warning());
        assert!(status(24, 30).requires_warning());
        assert!(status(28, 30).requires_warning());
        assert!(status(31, 30).requires_warning());

        assert!(status(31, 30).is_terminal());
        assert!(!status(28, 30).is_terminal());
    }

    #[test]
    fn test_messages() {
        assert!(status(35, 30).message().contains("5 days ago"));
        assert!(status(29, 30).message().contains("1 day"));
        assert_eq!(status(1, 0).to_string(), "NO_EXPIRATION: Baseline has no expiration");
    }
}
