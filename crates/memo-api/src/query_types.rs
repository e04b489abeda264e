//! Query parameter types with user-friendly parse errors.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::ops::Deref;

use memo_core::{AnalyticsWindow, Page};

use crate::ApiError;

/// A DateTime that parses from several common shapes.
///
/// Accepts:
/// - RFC 3339 with timezone or offset: `2024-01-15T10:30:00Z`
/// - ISO 8601 without timezone (assumes UTC): `2024-01-15T10:30:00`
/// - Date only (assumes midnight UTC): `2024-01-15`
/// - Keywords: `now`, `today`, `yesterday`
/// - Relative shorthand: `7d`, `2w`, `12h`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexibleDateTime(pub DateTime<Utc>);

impl FlexibleDateTime {
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Deref for FlexibleDateTime {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FlexibleDateTime> for DateTime<Utc> {
    fn from(dt: FlexibleDateTime) -> Self {
        dt.0
    }
}

impl fmt::Display for FlexibleDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for FlexibleDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_flexible_datetime(&s).map_err(de::Error::custom)
    }
}

fn start_of(date: NaiveDate) -> Result<DateTime<Utc>, String> {
    date.and_hms_opt(0, 0, 0)
        .map(|n| n.and_utc())
        .ok_or_else(|| format!("Failed to build midnight for {}", date))
}

/// Parse a datetime string, relative to `now` for keywords and shorthand.
pub fn parse_flexible_datetime_at(s: &str, now: DateTime<Utc>) -> Result<FlexibleDateTime, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(
            "Date value cannot be empty. Expected ISO 8601 format (e.g., '2024-01-15T10:30:00Z')"
                .to_string(),
        );
    }

    match s.to_lowercase().as_str() {
        "now" => return Ok(FlexibleDateTime(now)),
        "today" => return start_of(now.date_naive()).map(FlexibleDateTime),
        "yesterday" => {
            let date = now
                .date_naive()
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| "Date out of range".to_string())?;
            return start_of(date).map(FlexibleDateTime);
        }
        _ => {}
    }

    if let Some(dt) = parse_relative_shorthand(&s.to_lowercase(), now) {
        return Ok(FlexibleDateTime(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(FlexibleDateTime(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(FlexibleDateTime(naive.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return start_of(date).map(FlexibleDateTime);
    }

    Err(format!(
        "Invalid date '{}'. Expected ISO 8601 (e.g., '2024-01-15T10:30:00Z' or '2024-01-15'), \
         a keyword ('now', 'today', 'yesterday') or a relative value ('7d', '2w', '12h')",
        s
    ))
}

pub fn parse_flexible_datetime(s: &str) -> Result<FlexibleDateTime, String> {
    parse_flexible_datetime_at(s, Utc::now())
}

/// `7d`, `2w`, `12h` counted back from `now`.
///
/// Counts that fall outside the representable range yield `None`.
fn parse_relative_shorthand(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (num, unit) = s.split_at(split);
    let n: i64 = num.parse().ok()?;
    let duration = match unit {
        "h" => TimeDelta::try_hours(n)?,
        "d" => TimeDelta::try_days(n)?,
        "w" => TimeDelta::try_weeks(n)?,
        _ => return None,
    };
    now.checked_sub_signed(duration)
}

// =============================================================================
// SHARED QUERY SHAPES
// =============================================================================

/// `?skip=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Result<Page, ApiError> {
        Ok(Page::new(self.skip, self.limit)?)
    }
}

/// `?start_date=&end_date=`
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<FlexibleDateTime>,
    pub end_date: Option<FlexibleDateTime>,
}

impl DateRangeQuery {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }

    pub fn window(&self) -> Result<AnalyticsWindow, ApiError> {
        Ok(AnalyticsWindow::between(
            self.start_date.map(Into::into),
            self.end_date.map(Into::into),
        )?)
    }
}
