//! Domain models for memo.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

/// Deserialize a field that distinguishes "absent" from "explicit null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`, value →
/// `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::InvalidInput(format!(
            "{} must be {} characters or less",
            field, max
        )));
    }
    Ok(())
}

fn check_required(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", field)));
    }
    check_len(field, value, max)
}

// =============================================================================
// USERS
// =============================================================================

/// Account status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

/// A registered user. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<()> {
        check_required("email", &self.email, defaults::EMAIL_MAX_LEN)?;
        let email = self.email.trim();
        let valid_shape = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid_shape {
            return Err(Error::InvalidInput(format!("Invalid email address: {}", email)));
        }
        check_required("username", &self.username, defaults::USERNAME_MAX_LEN)?;
        if self.password.chars().count() < defaults::PASSWORD_MIN_LEN {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                defaults::PASSWORD_MIN_LEN
            )));
        }
        Ok(())
    }
}

/// An issued bearer token. The plaintext is only available at issue time.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// PAGINATION
// =============================================================================

/// Offset pagination shared by list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: defaults::PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Build a page from optional query values, rejecting out-of-range input.
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Result<Self> {
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(defaults::PAGE_LIMIT);
        if skip < 0 {
            return Err(Error::InvalidInput("skip must be >= 0".to_string()));
        }
        if !(1..=defaults::PAGE_LIMIT_MAX).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                defaults::PAGE_LIMIT_MAX
            )));
        }
        Ok(Self { skip, limit })
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// A user-owned, optionally hierarchical label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_category_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_category_id: Option<Uuid>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<()> {
        check_required("name", &self.name, defaults::CATEGORY_NAME_MAX_LEN)
    }
}

/// Partial category update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_category_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            check_required("name", name, defaults::CATEGORY_NAME_MAX_LEN)?;
        }
        Ok(())
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// A globally shared label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagNameRequest {
    pub name: String,
}

// =============================================================================
// ENTRIES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid entry status: {}", s)),
        }
    }
}

/// A note with its category label, tags and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    /// Name of `category_id`, when set.
    pub category: Option<String>,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub metrics: Vec<Metric>,
}

/// One metric as supplied on an entry write.
///
/// `category` is a free-text label resolved to a category of the caller.
/// Specs without a name or value are ignored by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateEntryRequest {
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub priority: Priority,
    pub status: EntryStatus,
    /// Backdated creation time; `None` means now.
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metrics: Vec<MetricSpec>,
}

impl CreateEntryRequest {
    pub fn validate(&self) -> Result<()> {
        check_required("title", &self.title, defaults::ENTRY_TITLE_MAX_LEN)
    }
}

/// Partial entry update.
///
/// `tags` and `metrics` are replace-all: `Some(vec![])` clears, `None`
/// leaves the current set untouched. `category_id: Some(None)` detaches.
/// `created_at` moves the entry in time; metrics keep their own timestamps
/// unless `metrics` is replaced in the same update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEntryRequest {
    /// Set by the caller after lenient parsing, never read from JSON.
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metrics: Option<Vec<MetricSpec>>,
}

impl UpdateEntryRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_required("title", title, defaults::ENTRY_TITLE_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListEntriesRequest {
    pub category_id: Option<Uuid>,
    pub status: Option<EntryStatus>,
    pub priority: Option<Priority>,
    pub page: Page,
}

// =============================================================================
// METRICS
// =============================================================================

/// A numeric measurement attached to an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub category_id: Option<Uuid>,
    /// Name of `category_id`, when set.
    pub category: Option<String>,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMetricRequest {
    pub entry_id: Uuid,
    #[serde(default)]
    pub category: Option<String>,
    pub metric_name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

impl CreateMetricRequest {
    pub fn validate(&self) -> Result<()> {
        check_required("metric_name", &self.metric_name, defaults::METRIC_NAME_MAX_LEN)?;
        if let Some(unit) = &self.unit {
            check_len("unit", unit, defaults::METRIC_UNIT_MAX_LEN)?;
        }
        validate_metric_value(self.value)
    }
}

/// Partial metric update. `category: Some(None)` uncategorizes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMetricRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub unit: Option<Option<String>>,
}

impl UpdateMetricRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.metric_name {
            check_required("metric_name", name, defaults::METRIC_NAME_MAX_LEN)?;
        }
        if let Some(Some(unit)) = &self.unit {
            check_len("unit", unit, defaults::METRIC_UNIT_MAX_LEN)?;
        }
        if let Some(value) = self.value {
            validate_metric_value(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListMetricsRequest {
    pub entry_id: Option<Uuid>,
    /// Exact category label.
    pub category: Option<String>,
    pub page: Page,
}

/// Reject values that cannot be stored as NUMERIC(10,2).
pub fn validate_metric_value(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidInput(format!(
            "metric value must be a finite number, got {}",
            value
        )));
    }
    if value.abs() >= defaults::METRIC_VALUE_LIMIT {
        return Err(Error::InvalidInput(format!(
            "metric value {} is out of range (|value| < {})",
            value,
            defaults::METRIC_VALUE_LIMIT
        )));
    }
    Ok(())
}

// =============================================================================
// AUDIT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

/// Append-only record of an entry write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Uuid,
    pub changes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ANALYTICS
// =============================================================================

/// Aggregate for one (category label, metric name) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub category: Option<String>,
    pub metric_name: String,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub total_records: i64,
}

/// Average metric value on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub avg_value: f64,
    pub count: i64,
}

/// Entry count for one category id (null when uncategorized).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntryCount {
    pub category_id: Option<Uuid>,
    pub category: Option<String>,
    pub count: i64,
}

/// Entry count for a named category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_entries: i64,
    pub total_categories: i64,
    pub total_tags: i64,
    pub recent_entries: Vec<RecentEntry>,
    pub entries_by_category: Vec<LabelCount>,
    pub entries_by_date: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// Comprehensive analytics for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub time_range: String,
    pub total_entries: i64,
    pub total_categories: i64,
    pub total_tags: i64,
    pub average_entries_per_day: f64,
    pub most_active_day: String,
    pub most_used_category: String,
    pub most_used_tag: String,
    pub entries_by_category: Vec<CategoryShare>,
    pub entries_by_date: Vec<DailyCount>,
    pub entries_by_tag: Vec<TagCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCategoryShare {
    pub category: Option<String>,
    pub count: i64,
    pub average: f64,
    pub total: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsByCategory {
    pub total_metrics: i64,
    pub categories: Vec<MetricCategoryShare>,
}

/// A metric ranked by value, with its entry title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMetric {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub entry_title: String,
    pub category: Option<String>,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_entry_status_roundtrip_str() {
        for status in [EntryStatus::Draft, EntryStatus::Published, EntryStatus::Archived] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert_eq!(EntryStatus::default(), EntryStatus::Published);
    }

    #[test]
    fn test_user_status_serializes_lowercase() {
        let json = serde_json::to_string(&UserStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }

    #[test]
    fn test_page_defaults() {
        let page = Page::new(None, None).unwrap();
        assert_eq!(page, Page { skip: 0, limit: 100 });
    }

    #[test]
    fn test_page_rejects_bad_values() {
        assert!(Page::new(Some(-1), None).is_err());
        assert!(Page::new(None, Some(0)).is_err());
        assert!(Page::new(None, Some(1001)).is_err());
        assert!(Page::new(Some(5), Some(1000)).is_ok());
    }

    #[test]
    fn test_update_entry_tags_absent_vs_empty() {
        let absent: UpdateEntryRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(absent.tags.is_none());
        assert!(absent.metrics.is_none());

        let empty: UpdateEntryRequest = serde_json::from_str(r#"{"tags":[],"metrics":[]}"#).unwrap();
        assert_eq!(empty.tags, Some(vec![]));
        assert_eq!(empty.metrics, Some(vec![]));
    }

    #[test]
    fn test_update_entry_category_double_option() {
        let absent: UpdateEntryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.category_id, None);

        let cleared: UpdateEntryRequest = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let id = Uuid::nil();
        let set: UpdateEntryRequest =
            serde_json::from_str(&format!(r#"{{"category_id":"{}"}}"#, id)).unwrap();
        assert_eq!(set.category_id, Some(Some(id)));
    }

    #[test]
    fn test_metric_spec_tolerates_missing_fields() {
        let spec: MetricSpec = serde_json::from_str(r#"{"category":"health"}"#).unwrap();
        assert_eq!(spec.category.as_deref(), Some("health"));
        assert!(spec.metric_name.is_none());
        assert!(spec.value.is_none());
    }

    #[test]
    fn test_validate_metric_value() {
        assert!(validate_metric_value(5.0).is_ok());
        assert!(validate_metric_value(-99_999_999.99).is_ok());
        assert!(validate_metric_value(f64::NAN).is_err());
        assert!(validate_metric_value(f64::INFINITY).is_err());
        assert!(validate_metric_value(100_000_000.0).is_err());
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterUserRequest {
            email: "runner@example.com".into(),
            username: "runner".into(),
            password: "correct horse".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterUserRequest {
            email: "runner".into(),
            ..ok.clone()
        };
        assert!(matches!(bad_email.validate(), Err(Error::InvalidInput(_))));

        let short_pw = RegisterUserRequest {
            password: "short".into(),
            ..ok
        };
        assert!(short_pw.validate().is_err());
    }

    #[test]
    fn test_entry_title_required() {
        let req = CreateEntryRequest {
            title: "   ".into(),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let long = CreateEntryRequest {
            title: "x".repeat(256),
            ..Default::default()
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_dashboard_serializes_camel_case() {
        let dash = Dashboard {
            total_entries: 1,
            total_categories: 0,
            total_tags: 0,
            recent_entries: vec![],
            entries_by_category: vec![],
            entries_by_date: vec![],
        };
        let json = serde_json::to_value(&dash).unwrap();
        assert!(json.get("totalEntries").is_some());
        assert!(json.get("recentEntries").is_some());
    }
}
