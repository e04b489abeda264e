//! Entry reconciliation.
//!
//! Turns the tag names and metric specs supplied on an entry write into
//! rows: tags and category labels are found or created, and the entry's
//! associations are replaced wholesale. All helpers run inside the
//! caller's transaction so the entry row and its associations commit
//! together.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Row, Transaction};
use tracing::trace;
use uuid::Uuid;

use memo_core::defaults::{CATEGORY_NAME_MAX_LEN, METRIC_NAME_MAX_LEN, METRIC_UNIT_MAX_LEN};
use memo_core::{
    new_v7, normalize_tag_names, validate_metric_value, validate_tag_name, Error, MetricSpec,
    Result, Tag, UserScope,
};

/// A metric spec that survived filtering and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMetric {
    pub category: Option<String>,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// Round to the two fraction digits stored at rest.
pub fn round_metric_value(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
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

/// Filter and validate metric specs before any row is written.
///
/// Specs with a blank name or no value are skipped. A value that cannot be
/// stored fails the whole request.
pub fn plan_metrics(specs: &[MetricSpec]) -> Result<Vec<PlannedMetric>> {
    let mut planned = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some(metric_name) = trimmed(spec.metric_name.as_deref()) else {
            trace!(subsystem = "db", component = "reconciler", "Skipping metric without name");
            continue;
        };
        let Some(raw_value) = spec.value else {
            trace!(
                subsystem = "db",
                component = "reconciler",
                metric_name = %metric_name,
                "Skipping metric without value"
            );
            continue;
        };

        validate_metric_value(raw_value)?;
        let value = round_metric_value(raw_value);
        validate_metric_value(value)?;
        check_len("metric_name", &metric_name, METRIC_NAME_MAX_LEN)?;

        let unit = trimmed(spec.unit.as_deref());
        if let Some(u) = &unit {
            check_len("unit", u, METRIC_UNIT_MAX_LEN)?;
        }
        let category = trimmed(spec.category.as_deref());
        if let Some(c) = &category {
            check_len("category", c, CATEGORY_NAME_MAX_LEN)?;
        }

        planned.push(PlannedMetric {
            category,
            metric_name,
            value,
            unit,
        });
    }
    Ok(planned)
}

/// Normalize and validate tag names before any row is written.
pub fn plan_tags(names: &[String]) -> Result<Vec<String>> {
    let names = normalize_tag_names(names);
    for name in &names {
        validate_tag_name(name)?;
    }
    Ok(names)
}

// =============================================================================
// OWNERSHIP CHECKS
// =============================================================================

/// Fail with NotFound unless the entry belongs to the caller. Returns the
/// entry's `created_at`.
pub(crate) async fn ensure_entry_owned_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: UserScope,
    entry_id: Uuid,
) -> Result<DateTime<Utc>> {
    let row = sqlx::query("SELECT created_at FROM entry WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(scope.user_id())
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
    row.map(|r| r.get("created_at"))
        .ok_or_else(|| Error::NotFound(format!("Entry {}", entry_id)))
}

/// Fail with NotFound unless the category belongs to the caller.
pub(crate) async fn ensure_category_owned_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: UserScope,
    category_id: Uuid,
) -> Result<()> {
    let exists: Option<bool> =
        sqlx::query_scalar("SELECT true FROM category WHERE id = $1 AND user_id = $2")
            .bind(category_id)
            .bind(scope.user_id())
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
    match exists {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("Category {}", category_id))),
    }
}

// =============================================================================
// FIND-OR-CREATE
// =============================================================================

/// Find a tag by exact name, creating it if absent.
pub(crate) async fn find_or_create_tag_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<Tag> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO tag (id, name, created_at, updated_at) VALUES ($1, $2, $3, $3)
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(new_v7())
    .bind(name)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    let row = sqlx::query("SELECT id, name, created_at, updated_at FROM tag WHERE name = $1")
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Find the caller's category by exact label, creating it if absent.
pub(crate) async fn find_or_create_category_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: UserScope,
    label: &str,
) -> Result<Uuid> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO category (id, user_id, name, is_active, created_at, updated_at)
         VALUES ($1, $2, $3, true, $4, $4)
         ON CONFLICT (user_id, name) DO NOTHING",
    )
    .bind(new_v7())
    .bind(scope.user_id())
    .bind(label)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    sqlx::query_scalar("SELECT id FROM category WHERE user_id = $1 AND name = $2")
        .bind(scope.user_id())
        .bind(label)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)
}

// =============================================================================
// REPLACE-ALL
// =============================================================================

/// Replace the entry's tag set with exactly `names` (already planned).
pub(crate) async fn replace_entry_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: Uuid,
    names: &[String],
) -> Result<Vec<Tag>> {
    sqlx::query("DELETE FROM entry_tag WHERE entry_id = $1")
        .bind(entry_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = find_or_create_tag_tx(tx, name).await?;
        sqlx::query(
            "INSERT INTO entry_tag (entry_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(entry_id)
        .bind(tag.id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        trace!(
            subsystem = "db",
            component = "reconciler",
            op = "attach_tag",
            entry_id = %entry_id,
            tag_id = %tag.id,
            "Tag attached"
        );
        tags.push(tag);
    }
    Ok(tags)
}

/// Insert one metric row; the value is rounded to NUMERIC(10,2).
pub(crate) async fn insert_metric_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: Uuid,
    category_id: Option<Uuid>,
    metric_name: &str,
    value: f64,
    unit: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<Uuid> {
    let id = new_v7();
    sqlx::query(
        "INSERT INTO metric (id, entry_id, category_id, metric_name, value, unit, created_at, updated_at)
         VALUES ($1, $2, $3, $4, ROUND($5::numeric, 2), $6, $7, $8)",
    )
    .bind(id)
    .bind(entry_id)
    .bind(category_id)
    .bind(metric_name)
    .bind(value)
    .bind(unit)
    .bind(created_at)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(id)
}

/// Replace the entry's metrics with `planned`, stamped with the entry's
/// creation time so backdated entries chart on the right day.
pub(crate) async fn replace_entry_metrics_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: UserScope,
    entry_id: Uuid,
    entry_created_at: DateTime<Utc>,
    planned: &[PlannedMetric],
) -> Result<usize> {
    sqlx::query("DELETE FROM metric WHERE entry_id = $1")
        .bind(entry_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

    for metric in planned {
        let category_id = match &metric.category {
            Some(label) => Some(find_or_create_category_tx(tx, scope, label).await?),
            None => None,
        };
        insert_metric_tx(
            tx,
            entry_id,
            category_id,
            &metric.metric_name,
            metric.value,
            metric.unit.as_deref(),
            entry_created_at,
        )
        .await?;
    }
    Ok(planned.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(category: Option<&str>, name: Option<&str>, value: Option<f64>) -> MetricSpec {
        MetricSpec {
            category: category.map(String::from),
            metric_name: name.map(String::from),
            value,
            unit: None,
        }
    }

    #[test]
    fn test_plan_skips_missing_name_or_value() {
        let planned = plan_metrics(&[
            spec(Some("health"), None, Some(1.0)),
            spec(Some("health"), Some("  "), Some(1.0)),
            spec(Some("health"), Some("steps"), None),
            spec(Some("health"), Some("distance_km"), Some(5.0)),
        ])
        .unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].metric_name, "distance_km");
        assert_eq!(planned[0].category.as_deref(), Some("health"));
    }

    #[test]
    fn test_plan_blank_category_is_uncategorized() {
        let planned = plan_metrics(&[spec(Some("   "), Some("weight"), Some(70.0))]).unwrap();
        assert_eq!(planned[0].category, None);
    }

    #[test]
    fn test_plan_rounds_to_two_places() {
        let planned = plan_metrics(&[spec(None, Some("pace"), Some(5.456))]).unwrap();
        assert_eq!(planned[0].value, 5.46);
    }

    #[test]
    fn test_plan_rejects_unstorable_values() {
        assert!(plan_metrics(&[spec(None, Some("x"), Some(f64::NAN))]).is_err());
        assert!(plan_metrics(&[spec(None, Some("x"), Some(1e9))]).is_err());
        assert!(plan_metrics(&[spec(None, Some("x"), Some(99_999_999.999))]).is_err());
    }

    #[test]
    fn test_plan_rejects_long_unit() {
        let mut s = spec(None, Some("x"), Some(1.0));
        s.unit = Some("u".repeat(51));
        assert!(matches!(plan_metrics(&[s]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_plan_empty_is_empty() {
        assert!(plan_metrics(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_plan_tags_normalizes() {
        let names = plan_tags(&["fitness".into(), " cardio ".into(), "".into(), "fitness".into()]).unwrap();
        assert_eq!(names, vec!["fitness", "cardio"]);
    }

    #[test]
    fn test_plan_tags_rejects_long_name() {
        assert!(plan_tags(&["t".repeat(51)]).is_err());
    }

    #[test]
    fn test_round_metric_value() {
        assert_eq!(round_metric_value(5.0), 5.0);
        assert_eq!(round_metric_value(-1.005_1), -1.01);
        assert_eq!(round_metric_value(2.344), 2.34);
    }
}
