//! Analytics windows.
//!
//! A window is an inclusive range `[start, end]` of creation timestamps.
//! `start = None` means unbounded, which is how the `all` range avoids
//! applying any date predicate.

use chrono::{DateTime, Days, Duration, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Named time ranges accepted by `/analytics?time_range=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedRange {
    /// Last 7 days
    #[serde(rename = "7d")]
    Week,
    /// Last 30 days
    #[default]
    #[serde(rename = "30d")]
    Month,
    /// Last 90 days
    #[serde(rename = "90d")]
    Quarter,
    /// No temporal restriction
    #[serde(rename = "all")]
    All,
}

impl NamedRange {
    /// Parse a range label. Unknown labels fall back to `All`.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim() {
            "7d" => Self::Week,
            "30d" => Self::Month,
            "90d" => Self::Quarter,
            "all" => Self::All,
            other => {
                debug!(time_range = other, "Unknown time range, using all");
                Self::All
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::All => "all",
        }
    }

    /// Length in days, `None` for `All`.
    pub fn days(&self) -> Option<i64> {
        match self {
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::Quarter => Some(90),
            Self::All => None,
        }
    }

    /// Concrete window ending at `now`.
    pub fn window_at(&self, now: DateTime<Utc>) -> AnalyticsWindow {
        match self.days() {
            Some(days) => AnalyticsWindow {
                start: Some(now - Duration::days(days)),
                end: Some(now),
            },
            None => AnalyticsWindow::unbounded(),
        }
    }
}

/// Inclusive timestamp bounds for analytics queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AnalyticsWindow {
    /// A window with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Explicit bounds, either optional. Rejects `start > end`.
    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::InvalidInput(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(Self { start, end })
    }

    /// The last `days` days ending at `now`.
    ///
    /// `days` must be >= 1 and small enough that the start is a
    /// representable timestamp.
    pub fn last_days_at(days: i64, now: DateTime<Utc>) -> Result<Self> {
        if days < 1 {
            return Err(Error::InvalidInput("days must be >= 1".to_string()));
        }
        let start = TimeDelta::try_days(days)
            .and_then(|delta| now.checked_sub_signed(delta))
            .ok_or_else(|| Error::InvalidInput(format!("days out of range: {}", days)))?;
        Ok(Self {
            start: Some(start),
            end: Some(now),
        })
    }

    pub fn last_days(days: i64) -> Result<Self> {
        Self::last_days_at(days, Utc::now())
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Calendar days from the start day to the end day, inclusive of both.
    ///
    /// Falls back to `fallback_start` when the window has no start, and to
    /// `today` when it has no end. Spans longer than `max_days` keep only
    /// the most recent `max_days` dates.
    pub fn span_dates(
        &self,
        fallback_start: Option<NaiveDate>,
        today: NaiveDate,
        max_days: u64,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start.map(|s| s.date_naive()).or(fallback_start)?;
        let end = self.end.map(|e| e.date_naive()).unwrap_or(today);
        if start > end || max_days == 0 {
            return None;
        }
        let earliest = end.checked_sub_days(Days::new(max_days - 1)).unwrap_or(NaiveDate::MIN);
        Some((start.max(earliest), end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_lenient_known_labels() {
        assert_eq!(NamedRange::parse_lenient("7d"), NamedRange::Week);
        assert_eq!(NamedRange::parse_lenient("30d"), NamedRange::Month);
        assert_eq!(NamedRange::parse_lenient("90d"), NamedRange::Quarter);
        assert_eq!(NamedRange::parse_lenient("all"), NamedRange::All);
    }

    #[test]
    fn test_parse_lenient_unknown_is_all() {
        assert_eq!(NamedRange::parse_lenient("1y"), NamedRange::All);
        assert_eq!(NamedRange::parse_lenient(""), NamedRange::All);
    }

    #[test]
    fn test_default_range_is_30d() {
        assert_eq!(NamedRange::default().as_str(), "30d");
    }

    #[test]
    fn test_all_window_is_unbounded() {
        let w = NamedRange::All.window_at(fixed_now());
        assert!(w.is_unbounded());
    }

    #[test]
    fn test_week_window_bounds() {
        let now = fixed_now();
        let w = NamedRange::Week.window_at(now);
        assert_eq!(w.start, Some(now - Duration::days(7)));
        assert_eq!(w.end, Some(now));
    }

    #[test]
    fn test_between_rejects_inverted() {
        let now = fixed_now();
        assert!(AnalyticsWindow::between(Some(now), Some(now - Duration::days(1))).is_err());
        assert!(AnalyticsWindow::between(Some(now), Some(now)).is_ok());
        assert!(AnalyticsWindow::between(None, Some(now)).is_ok());
    }

    #[test]
    fn test_last_days_requires_positive() {
        assert!(AnalyticsWindow::last_days_at(0, fixed_now()).is_err());
        assert!(AnalyticsWindow::last_days_at(1, fixed_now()).is_ok());
    }

    #[test]
    fn test_last_days_out_of_range_is_invalid_input() {
        for days in [100_000_000, 99_999_999_999, i64::MAX] {
            assert!(matches!(
                AnalyticsWindow::last_days_at(days, fixed_now()),
                Err(Error::InvalidInput(_))
            ));
        }
        let w = AnalyticsWindow::last_days_at(36_500, fixed_now()).unwrap();
        assert_eq!(w.start, Some(fixed_now() - Duration::days(36_500)));
    }

    #[test]
    fn test_span_dates_uses_fallback_for_unbounded_start() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let first = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let span = AnalyticsWindow::unbounded().span_dates(Some(first), today, 366);
        assert_eq!(span, Some((first, today)));
        assert_eq!(AnalyticsWindow::unbounded().span_dates(None, today, 366), None);
    }

    #[test]
    fn test_span_dates_week() {
        let now = fixed_now();
        let (start, end) = NamedRange::Week
            .window_at(now)
            .span_dates(None, now.date_naive(), 366)
            .unwrap();
        assert_eq!((end - start).num_days(), 7);
    }

    #[test]
    fn test_span_dates_keeps_most_recent_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let ancient = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        let (start, end) = AnalyticsWindow::unbounded()
            .span_dates(Some(ancient), today, 10)
            .unwrap();
        assert_eq!(end, today);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 6).unwrap());
        assert_eq!((end - start).num_days() + 1, 10);

        let (start, _) = AnalyticsWindow::unbounded()
            .span_dates(Some(NaiveDate::MIN), today, u64::MAX)
            .unwrap();
        assert_eq!(start, NaiveDate::MIN);
    }
}
