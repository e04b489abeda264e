//! Metric repository implementation.
//!
//! Metrics are scoped through their entry's owner. The category is set by
//! free-text label and resolved to one of the caller's categories, created
//! on first use.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use crate::filter::{bind_params, FilterBuilder};
use crate::reconcile::{
    ensure_entry_owned_tx, find_or_create_category_tx, insert_metric_tx, round_metric_value,
};
use memo_core::defaults::CATEGORY_NAME_MAX_LEN;
use memo_core::{
    validate_metric_value, CreateMetricRequest, Error, ListMetricsRequest, Metric,
    MetricRepository, Result, UpdateMetricRequest, UserScope,
};

/// Metric columns; expects `metric m LEFT JOIN category c`.
pub(crate) const METRIC_COLUMNS: &str = "m.id, m.entry_id, m.category_id, c.name AS category_name, \
     m.metric_name, m.value::float8 AS value, m.unit, m.created_at, m.updated_at";

pub(crate) fn metric_from_row(row: &PgRow) -> Metric {
    Metric {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        category_id: row.get("category_id"),
        category: row.get("category_name"),
        metric_name: row.get("metric_name"),
        value: row.get("value"),
        unit: row.get("unit"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Trim a category label; blank means uncategorized.
fn category_label(label: Option<&str>) -> Result<Option<&str>> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) if l.chars().count() > CATEGORY_NAME_MAX_LEN => Err(Error::InvalidInput(format!(
            "category must be {} characters or less",
            CATEGORY_NAME_MAX_LEN
        ))),
        other => Ok(other),
    }
}

/// PostgreSQL implementation of MetricRepository.
#[derive(Clone)]
pub struct PgMetricRepository {
    pool: Pool<Postgres>,
}

impl PgMetricRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricRepository for PgMetricRepository {
    async fn create(&self, scope: UserScope, req: CreateMetricRequest) -> Result<Metric> {
        req.validate()?;
        let label = category_label(req.category.as_deref())?;
        let value = round_metric_value(req.value);
        validate_metric_value(value)?;
        let unit = req.unit.as_deref().map(str::trim).filter(|u| !u.is_empty());

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        ensure_entry_owned_tx(&mut tx, scope, req.entry_id).await?;
        let category_id = match label {
            Some(l) => Some(find_or_create_category_tx(&mut tx, scope, l).await?),
            None => None,
        };
        let id = insert_metric_tx(
            &mut tx,
            req.entry_id,
            category_id,
            req.metric_name.trim(),
            value,
            unit,
            Utc::now(),
        )
        .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "metrics",
            op = "create",
            user_id = %scope,
            entry_id = %req.entry_id,
            metric_id = %id,
            "Metric created"
        );
        self.get(scope, id).await
    }

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Metric> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE m.id = $1 AND e.user_id = $2",
            METRIC_COLUMNS
        ))
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(|r| metric_from_row(&r))
            .ok_or_else(|| Error::NotFound(format!("Metric {}", id)))
    }

    async fn list(&self, scope: UserScope, req: ListMetricsRequest) -> Result<Vec<Metric>> {
        let label = req.category.as_deref().map(str::trim).filter(|l| !l.is_empty());
        let mut filter = FilterBuilder::owned_by("e.user_id", scope)
            .eq_uuid("m.entry_id", req.entry_id)
            .eq_text("c.name", label);
        let tail = filter.limit_offset(req.page.limit, req.page.skip);
        let sql = format!(
            "SELECT {} FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE {}
             ORDER BY m.created_at DESC, m.id DESC {}",
            METRIC_COLUMNS,
            filter.where_clause(),
            tail
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(metric_from_row).collect())
    }

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateMetricRequest) -> Result<Metric> {
        req.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "SELECT m.category_id, m.metric_name, m.value::float8 AS value, m.unit
             FROM metric m
             JOIN entry e ON e.id = m.entry_id
             WHERE m.id = $1 AND e.user_id = $2
             FOR UPDATE OF m",
        )
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Metric {}", id)))?;

        let category_id: Option<Uuid> = match &req.category {
            None => row.get("category_id"),
            Some(label) => match category_label(label.as_deref())? {
                Some(l) => Some(find_or_create_category_tx(&mut tx, scope, l).await?),
                None => None,
            },
        };
        let metric_name: String = match &req.metric_name {
            Some(name) => name.trim().to_string(),
            None => row.get("metric_name"),
        };
        let value = match req.value {
            Some(v) => {
                let rounded = round_metric_value(v);
                validate_metric_value(rounded)?;
                rounded
            }
            None => row.get("value"),
        };
        let unit: Option<String> = match req.unit {
            Some(u) => u.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            None => row.get("unit"),
        };

        sqlx::query(
            "UPDATE metric
             SET category_id = $1, metric_name = $2, value = ROUND($3::numeric, 2), unit = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(category_id)
        .bind(&metric_name)
        .bind(value)
        .bind(&unit)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        self.get(scope, id).await
    }

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM metric m USING entry e
             WHERE m.id = $1 AND e.id = m.entry_id AND e.user_id = $2",
        )
        .bind(id)
        .bind(scope.user_id())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Metric {}", id)));
        }
        Ok(())
    }
}
